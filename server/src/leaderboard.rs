use std::sync::Arc;
use std::time::Duration;

use shared::{LeaderboardOrdering, LeaderboardScope};

use crate::error::LedgerError;
use crate::storage::types::LeaderboardEntry;
use crate::storage::{with_deadline, Store};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Read-only ranked view over the live aggregates. Always recomputed at
/// read time; any rank persisted elsewhere is advisory and never consulted.
#[derive(Clone)]
pub struct Leaderboard {
    store: Arc<dyn Store>,
    deadline: Duration,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn Store>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    pub async fn get(
        &self,
        scope: LeaderboardScope,
        ordering: LeaderboardOrdering,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, LedgerError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        with_deadline(self.deadline, self.store.leaderboard(&scope, ordering, limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DEFAULT_DEADLINE;
    use crate::storage::types::NewActivity;
    use crate::storage::MemStore;
    use shared::{impact, points, ActivityMetrics};

    async fn seed(store: &MemStore, user_id: i32, region: Option<&str>, trees: u32) {
        store.upsert_account(user_id, region).await.unwrap();
        if trees == 0 {
            return;
        }
        let new = NewActivity {
            title: "Planting".into(),
            description: "Seedlings".into(),
            metrics: ActivityMetrics::Trees {
                trees_planted: trees,
            },
            photos: vec![],
            location: None,
        };
        let awarded = points(&new.metrics, false, false);
        let delta = impact(&new.metrics);
        store
            .apply_accrual(user_id, &new, awarded, &delta, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ranks_descending_with_ascending_id_tie_break() {
        let store = Arc::new(MemStore::new());
        // Users 2 and 3 tie on points; 1 trails.
        seed(&store, 3, None, 3).await;
        seed(&store, 2, None, 3).await;
        seed(&store, 1, None, 1).await;

        let leaderboard = Leaderboard::new(store, DEFAULT_DEADLINE);
        let entries = leaderboard
            .get(LeaderboardScope::Global, LeaderboardOrdering::AllTime, None)
            .await
            .unwrap();
        let ids: Vec<i32> = entries.iter().map(|entry| entry.user_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        // Same snapshot, same answer.
        let again = leaderboard
            .get(LeaderboardScope::Global, LeaderboardOrdering::AllTime, None)
            .await
            .unwrap();
        assert_eq!(entries, again);
    }

    #[tokio::test]
    async fn region_scope_filters_and_limit_truncates() {
        let store = Arc::new(MemStore::new());
        seed(&store, 1, Some("ashanti"), 2).await;
        seed(&store, 2, Some("volta"), 3).await;
        seed(&store, 3, Some("ashanti"), 1).await;

        let leaderboard = Leaderboard::new(store, DEFAULT_DEADLINE);
        let ashanti = leaderboard
            .get(
                LeaderboardScope::Region("ashanti".into()),
                LeaderboardOrdering::AllTime,
                None,
            )
            .await
            .unwrap();
        let ids: Vec<i32> = ashanti.iter().map(|entry| entry.user_id).collect();
        assert_eq!(ids, vec![1, 3]);

        let top_one = leaderboard
            .get(LeaderboardScope::Global, LeaderboardOrdering::AllTime, Some(1))
            .await
            .unwrap();
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].user_id, 2);
    }

    #[tokio::test]
    async fn weekly_ordering_uses_weekly_points() {
        let store = Arc::new(MemStore::new());
        seed(&store, 1, None, 3).await;
        seed(&store, 2, None, 2).await;

        let leaderboard = Leaderboard::new(store, DEFAULT_DEADLINE);
        let weekly = leaderboard
            .get(LeaderboardScope::Global, LeaderboardOrdering::Weekly, None)
            .await
            .unwrap();
        assert_eq!(weekly[0].user_id, 1);
        assert!(weekly[0].weekly_points > weekly[1].weekly_points);
    }
}
