use std::sync::Arc;
use std::time::Duration;

use shared::{impact, milestones_crossed, points, ActivityId, Category, Event, UserId};
use tracing::instrument;

use crate::error::LedgerError;
use crate::events::Dispatcher;
use crate::storage::types::{ActivityRecord, ActivityStats, NewActivity, UserAccount};
use crate::storage::{with_deadline, Store};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Accrual ledger: turns logged activities into durable, exactly-reversible
/// changes to a user's point totals and impact aggregates.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    events: Dispatcher,
    deadline: Duration,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, events: Dispatcher, deadline: Duration) -> Self {
        Self {
            store,
            events,
            deadline,
        }
    }

    /// Scores the activity, applies points and impact to the owner's
    /// aggregates and persists the record, all in one storage transaction.
    /// A repeated `idempotency_key` returns the original record instead of
    /// logging the activity twice; without a key, identical calls
    /// legitimately create separate records.
    #[instrument(skip(self, new, idempotency_key))]
    pub async fn create_activity(
        &self,
        user_id: UserId,
        new: NewActivity,
        idempotency_key: Option<String>,
    ) -> Result<ActivityRecord, LedgerError> {
        if new.title.trim().is_empty() {
            return Err(LedgerError::Validation("title must not be empty".into()));
        }
        new.metrics
            .validate()
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        let awarded = points(&new.metrics, !new.photos.is_empty(), new.location.is_some());
        let delta = impact(&new.metrics);

        let outcome = with_deadline(
            self.deadline,
            self.store
                .apply_accrual(user_id, &new, awarded, &delta, idempotency_key.as_deref()),
        )
        .await?;

        if outcome.deduplicated {
            tracing::debug!(user_id, activity_id = outcome.record.id, "duplicate submit ignored");
            return Ok(outcome.record);
        }

        self.events.dispatch(Event::ActivityCreated {
            user_id,
            points: awarded,
        });
        self.dispatch_milestones(user_id, outcome.total_before, outcome.total_after);
        Ok(outcome.record)
    }

    /// Removes an owned activity and subtracts exactly the points and impact
    /// delta stored on it at creation, never a recomputation from metrics.
    #[instrument(skip(self))]
    pub async fn delete_activity(
        &self,
        activity_id: ActivityId,
        requesting_user_id: UserId,
    ) -> Result<(), LedgerError> {
        let outcome = with_deadline(
            self.deadline,
            self.store.reverse_accrual(activity_id, requesting_user_id),
        )
        .await?;

        if outcome.clamped {
            // Aggregates were clamped at zero instead of going negative.
            // Operators need to hear about it; the caller's delete stands.
            let violation = LedgerError::InvariantViolation {
                user_id: requesting_user_id,
            };
            tracing::error!(activity_id, "{violation}");
        }
        Ok(())
    }

    pub async fn get_activity(
        &self,
        activity_id: ActivityId,
    ) -> Result<ActivityRecord, LedgerError> {
        with_deadline(self.deadline, self.store.get_activity(activity_id))
            .await?
            .ok_or(LedgerError::NotFound("activity"))
    }

    pub async fn list_activities(
        &self,
        user_id: UserId,
        category: Option<Category>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<ActivityRecord>, LedgerError> {
        with_deadline(
            self.deadline,
            self.store.list_activities(user_id, category, page, limit),
        )
        .await
    }

    /// Entry point for the moderation collaborator; scoring never reads the
    /// flag, so flipping it does not touch any aggregate.
    pub async fn set_verified(
        &self,
        activity_id: ActivityId,
        verified: bool,
    ) -> Result<(), LedgerError> {
        with_deadline(self.deadline, self.store.set_verified(activity_id, verified)).await
    }

    pub async fn stats(&self) -> Result<ActivityStats, LedgerError> {
        with_deadline(self.deadline, self.store.activity_stats()).await
    }

    /// Called by the external registration/profile flow when an account
    /// appears or its region changes.
    pub async fn upsert_account(
        &self,
        user_id: UserId,
        region: Option<String>,
    ) -> Result<UserAccount, LedgerError> {
        with_deadline(
            self.deadline,
            self.store.upsert_account(user_id, region.as_deref()),
        )
        .await
    }

    pub async fn get_account(&self, user_id: UserId) -> Result<UserAccount, LedgerError> {
        with_deadline(self.deadline, self.store.get_account(user_id))
            .await?
            .ok_or(LedgerError::NotFound("user"))
    }

    fn dispatch_milestones(&self, user_id: UserId, before: i32, after: i32) {
        for total in milestones_crossed(before.max(0) as u32, after.max(0) as u32) {
            self.events
                .dispatch(Event::PointsMilestoneCrossed { user_id, total });
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use shared::{ActivityMetrics, ImpactDelta};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::storage::MemStore;

    fn ledger() -> (Ledger, UnboundedReceiver<Event>) {
        let (events, receiver) = Dispatcher::paired();
        let ledger = Ledger::new(Arc::new(MemStore::new()), events, DEFAULT_DEADLINE);
        (ledger, receiver)
    }

    fn trash_cleanup(bags: u32) -> NewActivity {
        NewActivity {
            title: "Beach cleanup".into(),
            description: "Picked up litter along the shore".into(),
            metrics: ActivityMetrics::Trash {
                bags_collected: Some(bags),
            },
            photos: vec!["/uploads/activities/cleanup.jpg".into()],
            location: Some("Labadi Beach".into()),
        }
    }

    fn tree_planting(trees: u32) -> NewActivity {
        NewActivity {
            title: "Community planting day".into(),
            description: "Planted seedlings in the park".into(),
            metrics: ActivityMetrics::Trees {
                trees_planted: trees,
            },
            photos: vec![],
            location: None,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test]
    async fn logging_a_cleanup_awards_points_and_impact() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(1, None).await.unwrap();

        let record = ledger
            .create_activity(1, trash_cleanup(3), None)
            .await
            .unwrap();
        assert_eq!(record.awarded_points, 48);
        assert_eq!(
            record.applied_impact_delta,
            ImpactDelta {
                trash_kg: 6.0,
                trees: 0,
                co2_kg: 1.5
            }
        );

        let account = ledger.get_account(1).await.unwrap();
        assert_eq!(account.total_points, 48);
        assert_eq!(account.weekly_points, 48);
        assert_close(account.trash_collected_kg, 6.0);
        assert_close(account.co2_saved_kg, 1.5);
    }

    #[tokio::test]
    async fn tree_planting_scores_per_extra_tree() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(2, None).await.unwrap();

        let record = ledger
            .create_activity(2, tree_planting(3), None)
            .await
            .unwrap();
        assert_eq!(record.awarded_points, 90);
        assert_eq!(record.applied_impact_delta.trees, 3);
        assert_close(record.applied_impact_delta.co2_kg, 65.31);
    }

    #[tokio::test]
    async fn deleting_reverses_exactly_what_was_applied() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(1, None).await.unwrap();

        let baseline = ledger.get_account(1).await.unwrap();
        let first = ledger
            .create_activity(1, trash_cleanup(3), None)
            .await
            .unwrap();
        let second = ledger
            .create_activity(1, tree_planting(2), None)
            .await
            .unwrap();

        ledger.delete_activity(second.id, 1).await.unwrap();
        ledger.delete_activity(first.id, 1).await.unwrap();

        let account = ledger.get_account(1).await.unwrap();
        assert_eq!(account.total_points, baseline.total_points);
        assert_eq!(account.weekly_points, baseline.weekly_points);
        assert_eq!(account.trees_planted, baseline.trees_planted);
        assert_close(account.trash_collected_kg, baseline.trash_collected_kg);
        assert_close(account.co2_saved_kg, baseline.co2_saved_kg);
        assert!(matches!(
            ledger.get_activity(first.id).await,
            Err(LedgerError::NotFound("activity"))
        ));
    }

    #[tokio::test]
    async fn concurrent_creates_for_one_user_lose_no_updates() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(7, None).await.unwrap();

        let n = 16;
        let tasks = (0..n).map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .create_activity(7, tree_planting(3), None)
                    .await
                    .unwrap()
            })
        });
        for result in join_all(tasks).await {
            assert_eq!(result.unwrap().awarded_points, 90);
        }

        let account = ledger.get_account(7).await.unwrap();
        assert_eq!(account.total_points, n * 90);
        assert_eq!(account.trees_planted, n * 3);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_logs_once() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(4, None).await.unwrap();

        let first = ledger
            .create_activity(4, trash_cleanup(2), Some("retry-1".into()))
            .await
            .unwrap();
        let second = ledger
            .create_activity(4, trash_cleanup(2), Some("retry-1".into()))
            .await
            .unwrap();
        assert_eq!(first, second);

        let account = ledger.get_account(4).await.unwrap();
        assert_eq!(account.total_points as u32, first.awarded_points);
        assert_eq!(ledger.list_activities(4, None, 0, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_someone_elses_activity_is_not_found() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(1, None).await.unwrap();
        ledger.upsert_account(2, None).await.unwrap();

        let record = ledger
            .create_activity(1, trash_cleanup(1), None)
            .await
            .unwrap();
        assert!(matches!(
            ledger.delete_activity(record.id, 2).await,
            Err(LedgerError::NotFound("activity"))
        ));
        // Still owned and intact.
        assert_eq!(ledger.get_activity(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn bad_metrics_are_rejected_before_any_write() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(3, None).await.unwrap();

        let bad = NewActivity {
            title: "Shower timer".into(),
            description: "Shorter showers all week".into(),
            metrics: ActivityMetrics::Water {
                water_saved_liters: f64::INFINITY,
            },
            photos: vec![],
            location: None,
        };
        assert!(matches!(
            ledger.create_activity(3, bad, None).await,
            Err(LedgerError::Validation(_))
        ));
        let account = ledger.get_account(3).await.unwrap();
        assert_eq!(account.total_points, 0);
    }

    #[tokio::test]
    async fn crossing_a_milestone_emits_an_event() {
        let (ledger, mut events) = ledger();
        ledger.upsert_account(9, None).await.unwrap();

        // Two 90-point activities cross the 100-point milestone.
        ledger
            .create_activity(9, tree_planting(3), None)
            .await
            .unwrap();
        ledger
            .create_activity(9, tree_planting(3), None)
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&Event::ActivityCreated {
            user_id: 9,
            points: 90
        }));
        assert!(seen.contains(&Event::PointsMilestoneCrossed {
            user_id: 9,
            total: 100
        }));
    }

    #[tokio::test]
    async fn verification_flag_never_touches_points() {
        let (ledger, _events) = ledger();
        ledger.upsert_account(5, None).await.unwrap();

        let record = ledger
            .create_activity(5, trash_cleanup(2), None)
            .await
            .unwrap();
        let before = ledger.get_account(5).await.unwrap();

        ledger.set_verified(record.id, true).await.unwrap();
        assert!(ledger.get_activity(record.id).await.unwrap().verified);
        assert_eq!(ledger.get_account(5).await.unwrap(), before);
    }
}
