use std::sync::Arc;
use std::time::Duration;

use shared::{milestones_crossed, ChallengeId, Event, UserId};
use tracing::instrument;

use crate::error::LedgerError;
use crate::events::Dispatcher;
use crate::storage::types::{
    ChallengeDefinition, ChallengeSummary, NewChallenge, ParticipantRow, ParticipationRecord,
};
use crate::storage::{with_deadline, Store};

/// Per-(user, challenge) participation state machine:
/// not joined -> active -> completed. Completion credits the challenge's
/// fixed reward exactly once, no matter how many concurrent or repeated
/// progress updates reach the threshold.
#[derive(Clone)]
pub struct Challenges {
    store: Arc<dyn Store>,
    events: Dispatcher,
    deadline: Duration,
}

impl Challenges {
    pub fn new(store: Arc<dyn Store>, events: Dispatcher, deadline: Duration) -> Self {
        Self {
            store,
            events,
            deadline,
        }
    }

    pub async fn create_challenge(
        &self,
        new: NewChallenge,
    ) -> Result<ChallengeDefinition, LedgerError> {
        if new.title.trim().is_empty() {
            return Err(LedgerError::Validation("title must not be empty".into()));
        }
        if let (Some(starts), Some(ends)) = (new.starts_at, new.ends_at) {
            if ends < starts {
                return Err(LedgerError::Validation(
                    "challenge window ends before it starts".into(),
                ));
            }
        }
        with_deadline(self.deadline, self.store.insert_challenge(&new)).await
    }

    pub async fn get_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<ChallengeDefinition, LedgerError> {
        with_deadline(self.deadline, self.store.get_challenge(challenge_id))
            .await?
            .ok_or(LedgerError::NotFound("challenge"))
    }

    pub async fn list_challenges(
        &self,
        active_only: bool,
        category: Option<shared::Category>,
        viewer: Option<UserId>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<ChallengeSummary>, LedgerError> {
        with_deadline(
            self.deadline,
            self.store
                .list_challenges(active_only, category, viewer, page, limit),
        )
        .await
    }

    pub async fn joined_challenges(
        &self,
        user_id: UserId,
        page: i64,
        limit: i64,
    ) -> Result<Vec<ChallengeSummary>, LedgerError> {
        with_deadline(
            self.deadline,
            self.store.joined_challenges(user_id, page, limit),
        )
        .await
    }

    /// Joining an already-joined challenge conflicts instead of creating a
    /// second row; an inactive or out-of-window challenge rejects the join.
    #[instrument(skip(self))]
    pub async fn join(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<ParticipationRecord, LedgerError> {
        let challenge = self.get_challenge(challenge_id).await?;
        let now = chrono::Utc::now().naive_utc();
        if !challenge.is_open_at(now) {
            return Err(LedgerError::InactiveChallenge(challenge_id));
        }
        with_deadline(
            self.deadline,
            self.store.insert_participation(user_id, challenge_id),
        )
        .await
    }

    /// Clamps the submitted progress into [0, 100] and stores it. The first
    /// time the stored value reaches 100 the participation flips to
    /// completed and the reward is credited in the same conditional step;
    /// later updates may still move the value but never credit again.
    #[instrument(skip(self))]
    pub async fn update_progress(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
        new_progress: f64,
    ) -> Result<ParticipationRecord, LedgerError> {
        if new_progress.is_nan() {
            return Err(LedgerError::Validation("progress must be a number".into()));
        }
        let progress = new_progress.clamp(0.0, 100.0);

        let challenge = self.get_challenge(challenge_id).await?;
        let outcome = with_deadline(
            self.deadline,
            self.store
                .record_progress(user_id, challenge_id, progress, challenge.reward_points),
        )
        .await?;

        if outcome.credited {
            self.events.dispatch(Event::ChallengeCompleted {
                user_id,
                challenge_id,
                bonus: challenge.reward_points,
            });
            for total in milestones_crossed(
                outcome.total_before.max(0) as u32,
                outcome.total_after.max(0) as u32,
            ) {
                self.events
                    .dispatch(Event::PointsMilestoneCrossed { user_id, total });
            }
        }
        Ok(outcome.record)
    }

    /// Removes the participation in any state. A bonus that was already
    /// credited stays credited.
    #[instrument(skip(self))]
    pub async fn leave(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<(), LedgerError> {
        with_deadline(
            self.deadline,
            self.store.delete_participation(user_id, challenge_id),
        )
        .await
    }

    pub async fn get_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> Result<ParticipationRecord, LedgerError> {
        with_deadline(
            self.deadline,
            self.store.get_participation(user_id, challenge_id),
        )
        .await?
        .ok_or(LedgerError::NotFound("participation"))
    }

    pub async fn list_participants(
        &self,
        challenge_id: ChallengeId,
        page: i64,
        limit: i64,
    ) -> Result<Vec<ParticipantRow>, LedgerError> {
        self.get_challenge(challenge_id).await?;
        with_deadline(
            self.deadline,
            self.store.list_participants(challenge_id, page, limit),
        )
        .await
    }

    pub async fn participant_count(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<i64, LedgerError> {
        with_deadline(self.deadline, self.store.count_participants(challenge_id)).await
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use shared::Category;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::ledger::DEFAULT_DEADLINE;
    use crate::storage::MemStore;

    struct Fixture {
        challenges: Challenges,
        store: Arc<MemStore>,
        events: UnboundedReceiver<Event>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemStore::new());
        let (dispatcher, events) = Dispatcher::paired();
        let challenges = Challenges::new(store.clone(), dispatcher, DEFAULT_DEADLINE);
        Fixture {
            challenges,
            store,
            events,
        }
    }

    fn recycling_week() -> NewChallenge {
        NewChallenge {
            title: "Recycling week".into(),
            description: "Sort and recycle your household waste for a week".into(),
            category: Category::Trash,
            reward_points: 150,
            starts_at: None,
            ends_at: None,
        }
    }

    async fn account(fixture: &Fixture, user_id: UserId) {
        fixture.store.upsert_account(user_id, None).await.unwrap();
    }

    #[tokio::test]
    async fn joining_twice_conflicts_and_keeps_one_row() {
        let fx = fixture().await;
        account(&fx, 7).await;
        let challenge = fx
            .challenges
            .create_challenge(recycling_week())
            .await
            .unwrap();

        fx.challenges.join(7, challenge.id).await.unwrap();
        assert!(matches!(
            fx.challenges.join(7, challenge.id).await,
            Err(LedgerError::Conflict(id)) if id == challenge.id
        ));

        let participation = fx.challenges.get_participation(7, challenge.id).await.unwrap();
        assert_eq!(participation.progress, 0.0);
        assert!(!participation.completed);
    }

    #[tokio::test]
    async fn joining_outside_the_window_is_rejected() {
        let fx = fixture().await;
        account(&fx, 1).await;
        let ended = NewChallenge {
            ends_at: Some(chrono::Utc::now().naive_utc() - chrono::Duration::days(1)),
            ..recycling_week()
        };
        let challenge = fx.challenges.create_challenge(ended).await.unwrap();
        assert!(matches!(
            fx.challenges.join(1, challenge.id).await,
            Err(LedgerError::InactiveChallenge(id)) if id == challenge.id
        ));
    }

    #[tokio::test]
    async fn joining_an_unknown_challenge_is_not_found() {
        let fx = fixture().await;
        account(&fx, 1).await;
        assert!(matches!(
            fx.challenges.join(1, 999).await,
            Err(LedgerError::NotFound("challenge"))
        ));
    }

    #[tokio::test]
    async fn reaching_the_threshold_credits_the_bonus_once() {
        let mut fx = fixture().await;
        account(&fx, 5).await;
        let challenge = fx
            .challenges
            .create_challenge(recycling_week())
            .await
            .unwrap();
        fx.challenges.join(5, challenge.id).await.unwrap();

        let first = fx
            .challenges
            .update_progress(5, challenge.id, 100.0)
            .await
            .unwrap();
        assert!(first.completed);
        assert!(first.bonus_credited);
        assert!(first.completed_at.is_some());

        let second = fx
            .challenges
            .update_progress(5, challenge.id, 100.0)
            .await
            .unwrap();
        assert!(second.bonus_credited);

        let total = fx.store.get_account(5).await.unwrap().unwrap().total_points;
        assert_eq!(total, 150);

        let completions = std::iter::from_fn(|| fx.events.try_recv().ok())
            .filter(|event| matches!(event, Event::ChallengeCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn concurrent_completions_credit_exactly_once() {
        let mut fx = fixture().await;
        account(&fx, 5).await;
        let challenge = fx
            .challenges
            .create_challenge(recycling_week())
            .await
            .unwrap();
        fx.challenges.join(5, challenge.id).await.unwrap();

        let tasks = (0..8).map(|_| {
            let challenges = fx.challenges.clone();
            let challenge_id = challenge.id;
            tokio::spawn(async move {
                challenges
                    .update_progress(5, challenge_id, 100.0)
                    .await
                    .unwrap()
            })
        });
        let records: Vec<ParticipationRecord> = join_all(tasks)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();
        assert!(records.iter().all(|record| record.bonus_credited));

        let total = fx.store.get_account(5).await.unwrap().unwrap().total_points;
        assert_eq!(total, 150);

        let completions = std::iter::from_fn(|| fx.events.try_recv().ok())
            .filter(|event| matches!(event, Event::ChallengeCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn progress_is_clamped_into_range() {
        let fx = fixture().await;
        account(&fx, 3).await;
        let challenge = fx
            .challenges
            .create_challenge(recycling_week())
            .await
            .unwrap();
        fx.challenges.join(3, challenge.id).await.unwrap();

        let below = fx
            .challenges
            .update_progress(3, challenge.id, -20.0)
            .await
            .unwrap();
        assert_eq!(below.progress, 0.0);

        let above = fx
            .challenges
            .update_progress(3, challenge.id, 180.0)
            .await
            .unwrap();
        assert_eq!(above.progress, 100.0);
        assert!(above.bonus_credited);

        assert!(matches!(
            fx.challenges.update_progress(3, challenge.id, f64::NAN).await,
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn later_updates_change_the_value_but_never_recredit() {
        let fx = fixture().await;
        account(&fx, 6).await;
        let challenge = fx
            .challenges
            .create_challenge(recycling_week())
            .await
            .unwrap();
        fx.challenges.join(6, challenge.id).await.unwrap();

        fx.challenges
            .update_progress(6, challenge.id, 100.0)
            .await
            .unwrap();
        let reopened = fx
            .challenges
            .update_progress(6, challenge.id, 40.0)
            .await
            .unwrap();
        assert_eq!(reopened.progress, 40.0);
        assert!(reopened.completed);
        assert!(reopened.bonus_credited);

        let total = fx.store.get_account(6).await.unwrap().unwrap().total_points;
        assert_eq!(total, 150);
    }

    #[tokio::test]
    async fn leaving_keeps_an_already_credited_bonus() {
        let fx = fixture().await;
        account(&fx, 8).await;
        let challenge = fx
            .challenges
            .create_challenge(recycling_week())
            .await
            .unwrap();
        fx.challenges.join(8, challenge.id).await.unwrap();
        fx.challenges
            .update_progress(8, challenge.id, 100.0)
            .await
            .unwrap();

        fx.challenges.leave(8, challenge.id).await.unwrap();
        assert!(matches!(
            fx.challenges.get_participation(8, challenge.id).await,
            Err(LedgerError::NotFound("participation"))
        ));
        let total = fx.store.get_account(8).await.unwrap().unwrap().total_points;
        assert_eq!(total, 150);

        // Rejoining starts a fresh participation.
        let rejoined = fx.challenges.join(8, challenge.id).await.unwrap();
        assert!(!rejoined.bonus_credited);
    }

    #[tokio::test]
    async fn leaving_without_joining_is_not_found() {
        let fx = fixture().await;
        account(&fx, 2).await;
        let challenge = fx
            .challenges
            .create_challenge(recycling_week())
            .await
            .unwrap();
        assert!(matches!(
            fx.challenges.leave(2, challenge.id).await,
            Err(LedgerError::NotFound("participation"))
        ));
    }
}
