use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use itertools::Itertools;
use shared::{
    ActivityId, Category, ChallengeId, ImpactDelta, LeaderboardOrdering, LeaderboardScope, UserId,
};
use tokio::sync::Mutex;

use super::types::{
    AccrualOutcome, ActivityRecord, ActivityStats, ChallengeDefinition, ChallengeSummary,
    LeaderboardEntry, NewActivity, NewChallenge, ParticipantRow, ParticipationRecord,
    ProgressOutcome, ReversalOutcome, UserAccount,
};
use super::{Store, StoreResult};
use crate::error::LedgerError;

/// In-memory store for tests and local runs. One mutex guards the whole
/// state; each operation takes the lock once and mutates without awaiting,
/// which makes every operation atomic and leaves nothing partial behind if
/// the caller is cancelled while waiting for the lock.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

#[derive(Default)]
struct MemState {
    accounts: BTreeMap<UserId, UserAccount>,
    activities: BTreeMap<ActivityId, ActivityRecord>,
    idempotency: HashMap<(UserId, String), ActivityId>,
    challenges: BTreeMap<ChallengeId, ChallengeDefinition>,
    participations: BTreeMap<(UserId, ChallengeId), ParticipationRecord>,
    next_activity_id: ActivityId,
    next_challenge_id: ChallengeId,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

fn sub_points(value: i32, amount: u32, clamped: &mut bool) -> i32 {
    let amount = amount as i32;
    if value < amount {
        *clamped = true;
        0
    } else {
        value - amount
    }
}

fn sub_kg(value: f64, amount: f64, clamped: &mut bool) -> f64 {
    if value - amount < -1e-9 {
        *clamped = true;
        0.0
    } else {
        (value - amount).max(0.0)
    }
}

fn summary(
    state: &MemState,
    challenge: &ChallengeDefinition,
    viewer: Option<UserId>,
) -> ChallengeSummary {
    let participants = state
        .participations
        .keys()
        .filter(|(_, challenge_id)| *challenge_id == challenge.id)
        .count() as i64;
    let participation =
        viewer.and_then(|viewer| state.participations.get(&(viewer, challenge.id)));
    ChallengeSummary {
        challenge: challenge.clone(),
        participants,
        joined: participation.is_some(),
        progress: participation.map_or(0.0, |p| p.progress),
    }
}

#[async_trait]
impl Store for MemStore {
    async fn upsert_account(
        &self,
        user_id: UserId,
        region: Option<&str>,
    ) -> StoreResult<UserAccount> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .entry(user_id)
            .or_insert_with(|| UserAccount {
                id: user_id,
                region: None,
                total_points: 0,
                weekly_points: 0,
                trash_collected_kg: 0.0,
                trees_planted: 0,
                co2_saved_kg: 0.0,
            });
        account.region = region.map(str::to_owned);
        Ok(account.clone())
    }

    async fn get_account(&self, user_id: UserId) -> StoreResult<Option<UserAccount>> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&user_id).cloned())
    }

    async fn apply_accrual(
        &self,
        user_id: UserId,
        new: &NewActivity,
        awarded_points: u32,
        delta: &ImpactDelta,
        idempotency_key: Option<&str>,
    ) -> StoreResult<AccrualOutcome> {
        let mut state = self.state.lock().await;

        if let Some(key) = idempotency_key {
            if let Some(activity_id) = state.idempotency.get(&(user_id, key.to_owned())) {
                let record = state
                    .activities
                    .get(activity_id)
                    .cloned()
                    .ok_or(LedgerError::NotFound("activity"))?;
                let total = state
                    .accounts
                    .get(&user_id)
                    .map_or(0, |account| account.total_points);
                return Ok(AccrualOutcome {
                    record,
                    total_before: total,
                    total_after: total,
                    deduplicated: true,
                });
            }
        }

        let account = state
            .accounts
            .get_mut(&user_id)
            .ok_or(LedgerError::NotFound("user"))?;
        let total_before = account.total_points;
        account.total_points = account.total_points.saturating_add(awarded_points as i32);
        account.weekly_points = account.weekly_points.saturating_add(awarded_points as i32);
        account.trash_collected_kg += delta.trash_kg;
        account.trees_planted = account.trees_planted.saturating_add(delta.trees as i32);
        account.co2_saved_kg += delta.co2_kg;
        let total_after = account.total_points;

        state.next_activity_id += 1;
        let record = ActivityRecord {
            id: state.next_activity_id,
            user_id,
            category: new.metrics.category(),
            title: new.title.clone(),
            description: new.description.clone(),
            metrics: new.metrics.clone(),
            photos: new.photos.clone(),
            location: new.location.clone(),
            awarded_points,
            applied_impact_delta: *delta,
            verified: false,
            created_at: now(),
        };
        state.activities.insert(record.id, record.clone());
        if let Some(key) = idempotency_key {
            state
                .idempotency
                .insert((user_id, key.to_owned()), record.id);
        }

        Ok(AccrualOutcome {
            record,
            total_before,
            total_after,
            deduplicated: false,
        })
    }

    async fn reverse_accrual(
        &self,
        activity_id: ActivityId,
        user_id: UserId,
    ) -> StoreResult<ReversalOutcome> {
        let mut state = self.state.lock().await;

        let owned = state
            .activities
            .get(&activity_id)
            .is_some_and(|record| record.user_id == user_id);
        if !owned {
            return Err(LedgerError::NotFound("activity"));
        }
        let record = state
            .activities
            .remove(&activity_id)
            .ok_or(LedgerError::NotFound("activity"))?;

        let account = state
            .accounts
            .get_mut(&user_id)
            .ok_or(LedgerError::NotFound("user"))?;
        let mut clamped = false;
        let points = record.awarded_points;
        let delta = record.applied_impact_delta;
        account.total_points = sub_points(account.total_points, points, &mut clamped);
        account.weekly_points = sub_points(account.weekly_points, points, &mut clamped);
        account.trash_collected_kg =
            sub_kg(account.trash_collected_kg, delta.trash_kg, &mut clamped);
        account.trees_planted = sub_points(account.trees_planted.max(0), delta.trees, &mut clamped);
        account.co2_saved_kg = sub_kg(account.co2_saved_kg, delta.co2_kg, &mut clamped);

        state
            .idempotency
            .retain(|_, mapped| *mapped != activity_id);

        Ok(ReversalOutcome { record, clamped })
    }

    async fn get_activity(&self, activity_id: ActivityId) -> StoreResult<Option<ActivityRecord>> {
        let state = self.state.lock().await;
        Ok(state.activities.get(&activity_id).cloned())
    }

    async fn list_activities(
        &self,
        user_id: UserId,
        category: Option<Category>,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ActivityRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .activities
            .values()
            .filter(|record| record.user_id == user_id)
            .filter(|record| category.map_or(true, |category| record.category == category))
            .sorted_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            .skip((page * limit) as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn set_verified(&self, activity_id: ActivityId, verified: bool) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let record = state
            .activities
            .get_mut(&activity_id)
            .ok_or(LedgerError::NotFound("activity"))?;
        record.verified = verified;
        Ok(())
    }

    async fn activity_stats(&self) -> StoreResult<ActivityStats> {
        let state = self.state.lock().await;
        let activities_by_category: HashMap<Category, i64> = state
            .activities
            .values()
            .counts_by(|record| record.category)
            .into_iter()
            .map(|(category, count)| (category, count as i64))
            .collect();
        Ok(ActivityStats {
            total_activities: state.activities.len() as i64,
            total_points: state
                .activities
                .values()
                .map(|record| record.awarded_points as i64)
                .sum(),
            active_users: state
                .activities
                .values()
                .map(|record| record.user_id)
                .unique()
                .count() as i64,
            activities_by_category,
            total_trash_collected_kg: state
                .accounts
                .values()
                .map(|account| account.trash_collected_kg)
                .sum(),
            total_trees_planted: state
                .accounts
                .values()
                .map(|account| account.trees_planted as i64)
                .sum(),
            total_co2_saved_kg: state
                .accounts
                .values()
                .map(|account| account.co2_saved_kg)
                .sum(),
        })
    }

    async fn insert_challenge(&self, new: &NewChallenge) -> StoreResult<ChallengeDefinition> {
        let mut state = self.state.lock().await;
        state.next_challenge_id += 1;
        let challenge = ChallengeDefinition {
            id: state.next_challenge_id,
            title: new.title.clone(),
            description: new.description.clone(),
            category: new.category,
            reward_points: new.reward_points,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            is_active: true,
            created_at: now(),
        };
        state.challenges.insert(challenge.id, challenge.clone());
        Ok(challenge)
    }

    async fn get_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> StoreResult<Option<ChallengeDefinition>> {
        let state = self.state.lock().await;
        Ok(state.challenges.get(&challenge_id).cloned())
    }

    async fn list_challenges(
        &self,
        active_only: bool,
        category: Option<Category>,
        viewer: Option<UserId>,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ChallengeSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .challenges
            .values()
            .filter(|challenge| !active_only || challenge.is_active)
            .filter(|challenge| {
                category.map_or(true, |category| challenge.category == category)
            })
            .sorted_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            .skip((page * limit) as usize)
            .take(limit as usize)
            .map(|challenge| summary(&state, challenge, viewer))
            .collect())
    }

    async fn joined_challenges(
        &self,
        user_id: UserId,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ChallengeSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .participations
            .values()
            .filter(|participation| participation.user_id == user_id)
            .sorted_by(|a, b| {
                (b.joined_at, b.challenge_id).cmp(&(a.joined_at, a.challenge_id))
            })
            .skip((page * limit) as usize)
            .take(limit as usize)
            .filter_map(|participation| state.challenges.get(&participation.challenge_id))
            .map(|challenge| summary(&state, challenge, Some(user_id)))
            .collect())
    }

    async fn insert_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<ParticipationRecord> {
        let mut state = self.state.lock().await;
        if !state.challenges.contains_key(&challenge_id) {
            return Err(LedgerError::NotFound("challenge"));
        }
        if state.participations.contains_key(&(user_id, challenge_id)) {
            return Err(LedgerError::Conflict(challenge_id));
        }
        let record = ParticipationRecord {
            user_id,
            challenge_id,
            joined_at: now(),
            progress: 0.0,
            completed: false,
            bonus_credited: false,
            completed_at: None,
        };
        state
            .participations
            .insert((user_id, challenge_id), record.clone());
        Ok(record)
    }

    async fn get_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<Option<ParticipationRecord>> {
        let state = self.state.lock().await;
        Ok(state.participations.get(&(user_id, challenge_id)).cloned())
    }

    async fn record_progress(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
        progress: f64,
        reward_points: u32,
    ) -> StoreResult<ProgressOutcome> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let participation = state
            .participations
            .get_mut(&(user_id, challenge_id))
            .ok_or(LedgerError::NotFound("participation"))?;
        participation.progress = progress;

        let mut credited = false;
        let mut total_before = 0;
        let mut total_after = 0;
        if progress >= 100.0 && !participation.bonus_credited {
            participation.completed = true;
            participation.bonus_credited = true;
            participation.completed_at = Some(now());
            let account = state
                .accounts
                .get_mut(&user_id)
                .ok_or(LedgerError::NotFound("user"))?;
            total_before = account.total_points;
            account.total_points = account.total_points.saturating_add(reward_points as i32);
            account.weekly_points = account.weekly_points.saturating_add(reward_points as i32);
            total_after = account.total_points;
            credited = true;
        }

        let record = state
            .participations
            .get(&(user_id, challenge_id))
            .cloned()
            .ok_or(LedgerError::NotFound("participation"))?;
        Ok(ProgressOutcome {
            record,
            credited,
            total_before,
            total_after,
        })
    }

    async fn delete_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state
            .participations
            .remove(&(user_id, challenge_id))
            .ok_or(LedgerError::NotFound("participation"))?;
        Ok(())
    }

    async fn list_participants(
        &self,
        challenge_id: ChallengeId,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ParticipantRow>> {
        let state = self.state.lock().await;
        Ok(state
            .participations
            .values()
            .filter(|participation| participation.challenge_id == challenge_id)
            .sorted_by(|a, b| {
                b.progress
                    .partial_cmp(&a.progress)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.user_id.cmp(&b.user_id))
            })
            .skip((page * limit) as usize)
            .take(limit as usize)
            .map(|participation| {
                let account = state.accounts.get(&participation.user_id);
                ParticipantRow {
                    user_id: participation.user_id,
                    region: account.and_then(|account| account.region.clone()),
                    progress: participation.progress,
                    joined_at: participation.joined_at,
                    total_points: account.map_or(0, |account| account.total_points),
                }
            })
            .collect())
    }

    async fn count_participants(&self, challenge_id: ChallengeId) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .participations
            .keys()
            .filter(|(_, id)| *id == challenge_id)
            .count() as i64)
    }

    async fn leaderboard(
        &self,
        scope: &LeaderboardScope,
        ordering: LeaderboardOrdering,
        limit: i64,
    ) -> StoreResult<Vec<LeaderboardEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .filter(|account| match scope {
                LeaderboardScope::Global => true,
                LeaderboardScope::Region(region) => {
                    account.region.as_deref() == Some(region.as_str())
                }
            })
            .sorted_by(|a, b| {
                let key = |account: &UserAccount| match ordering {
                    LeaderboardOrdering::AllTime => account.total_points,
                    LeaderboardOrdering::Weekly => account.weekly_points,
                };
                key(b).cmp(&key(a)).then(a.id.cmp(&b.id))
            })
            .take(limit as usize)
            .map(|account| LeaderboardEntry {
                user_id: account.id,
                region: account.region.clone(),
                total_points: account.total_points,
                weekly_points: account.weekly_points,
                trash_collected_kg: account.trash_collected_kg,
                trees_planted: account.trees_planted,
                co2_saved_kg: account.co2_saved_kg,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use shared::{impact, points, ActivityMetrics};

    use super::*;

    fn cleanup(bags: u32) -> NewActivity {
        NewActivity {
            title: "Gutter cleanup".into(),
            description: "Cleared the storm drain".into(),
            metrics: ActivityMetrics::Trash {
                bags_collected: Some(bags),
            },
            photos: vec![],
            location: None,
        }
    }

    async fn accrue(store: &MemStore, user_id: UserId, key: Option<&str>) -> AccrualOutcome {
        let new = cleanup(2);
        let awarded = points(&new.metrics, false, false);
        let delta = impact(&new.metrics);
        store
            .apply_accrual(user_id, &new, awarded, &delta, key)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn tampered_aggregates_clamp_at_zero_on_reversal() {
        let store = MemStore::new();
        store.upsert_account(1, None).await.unwrap();
        let outcome = accrue(&store, 1, None).await;

        // Simulate external tampering with the aggregate row.
        {
            let mut state = store.state.lock().await;
            let account = state.accounts.get_mut(&1).unwrap();
            account.total_points = 10;
            account.trash_collected_kg = 0.5;
        }

        let reversal = store.reverse_accrual(outcome.record.id, 1).await.unwrap();
        assert!(reversal.clamped);

        let account = store.get_account(1).await.unwrap().unwrap();
        assert_eq!(account.total_points, 0);
        assert_eq!(account.trash_collected_kg, 0.0);
    }

    #[tokio::test]
    async fn deleting_an_activity_releases_its_idempotency_key() {
        let store = MemStore::new();
        store.upsert_account(2, None).await.unwrap();

        let first = accrue(&store, 2, Some("submit-1")).await;
        assert!(!first.deduplicated);

        let replay = accrue(&store, 2, Some("submit-1")).await;
        assert!(replay.deduplicated);
        assert_eq!(replay.record.id, first.record.id);

        store
            .reverse_accrual(first.record.id, 2)
            .await
            .unwrap();

        // The key no longer maps to a deleted record.
        let fresh = accrue(&store, 2, Some("submit-1")).await;
        assert!(!fresh.deduplicated);
        assert_ne!(fresh.record.id, first.record.id);
    }

    #[tokio::test]
    async fn idempotency_keys_are_scoped_per_user() {
        let store = MemStore::new();
        store.upsert_account(1, None).await.unwrap();
        store.upsert_account(2, None).await.unwrap();

        let first = accrue(&store, 1, Some("shared-key")).await;
        let second = accrue(&store, 2, Some("shared-key")).await;
        assert!(!second.deduplicated);
        assert_ne!(first.record.id, second.record.id);
    }
}
