use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use shared::{
    ActivityId, Category, ChallengeId, ImpactDelta, LeaderboardOrdering, LeaderboardScope, UserId,
};

use crate::error::LedgerError;

pub mod memory;
pub mod pg;
pub mod types;

pub use memory::MemStore;
pub use pg::PgStore;
use types::{
    AccrualOutcome, ActivityRecord, ActivityStats, ChallengeDefinition, ChallengeSummary,
    LeaderboardEntry, NewActivity, NewChallenge, ParticipantRow, ParticipationRecord,
    ProgressOutcome, ReversalOutcome, UserAccount,
};

pub type StoreResult<T> = Result<T, LedgerError>;

/// Persistence collaborator. Every method that touches a user's aggregates
/// is one all-or-nothing unit: partial application (counters moved but the
/// record not persisted, or vice versa) is never observable, and aggregate
/// arithmetic happens as atomic per-row updates inside the store, never as
/// read-modify-write in application memory. Dropping a call's future before
/// it resolves leaves no partial state behind.
#[async_trait]
pub trait Store: Send + Sync {
    /// Provisions or refreshes the ledger-owned account row. Called by the
    /// external registration/profile flow.
    async fn upsert_account(
        &self,
        user_id: UserId,
        region: Option<&str>,
    ) -> StoreResult<UserAccount>;

    async fn get_account(&self, user_id: UserId) -> StoreResult<Option<UserAccount>>;

    /// Inserts the activity and applies `awarded_points`/`delta` to the
    /// owner's aggregates in one transaction. When `idempotency_key` matches
    /// an earlier accrual for this user, returns that original record with
    /// `deduplicated` set and applies nothing.
    async fn apply_accrual(
        &self,
        user_id: UserId,
        new: &NewActivity,
        awarded_points: u32,
        delta: &ImpactDelta,
        idempotency_key: Option<&str>,
    ) -> StoreResult<AccrualOutcome>;

    /// Deletes the activity and subtracts exactly its stored
    /// `awarded_points`/`applied_impact_delta` in one transaction,
    /// clamping aggregates at zero. `NotFound` covers both a missing record
    /// and one owned by a different user.
    async fn reverse_accrual(
        &self,
        activity_id: ActivityId,
        user_id: UserId,
    ) -> StoreResult<ReversalOutcome>;

    async fn get_activity(&self, activity_id: ActivityId) -> StoreResult<Option<ActivityRecord>>;

    async fn list_activities(
        &self,
        user_id: UserId,
        category: Option<Category>,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ActivityRecord>>;

    /// Moderation-owned flag flip; never read by scoring or accrual.
    async fn set_verified(&self, activity_id: ActivityId, verified: bool) -> StoreResult<()>;

    async fn activity_stats(&self) -> StoreResult<ActivityStats>;

    async fn insert_challenge(&self, new: &NewChallenge) -> StoreResult<ChallengeDefinition>;

    async fn get_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> StoreResult<Option<ChallengeDefinition>>;

    async fn list_challenges(
        &self,
        active_only: bool,
        category: Option<Category>,
        viewer: Option<UserId>,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ChallengeSummary>>;

    async fn joined_challenges(
        &self,
        user_id: UserId,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ChallengeSummary>>;

    /// Creates the participation row. `Conflict` when one already exists for
    /// the pair; uniqueness is enforced by the store, not by a prior read.
    async fn insert_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<ParticipationRecord>;

    async fn get_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<Option<ParticipationRecord>>;

    /// Stores the (already clamped) progress value. When it reaches 100 the
    /// completion flip and the `reward_points` credit happen as a single
    /// conditional step guarded by `bonus_credited = false`, so concurrent
    /// or repeated calls credit at most once.
    async fn record_progress(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
        progress: f64,
        reward_points: u32,
    ) -> StoreResult<ProgressOutcome>;

    async fn delete_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<()>;

    async fn list_participants(
        &self,
        challenge_id: ChallengeId,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ParticipantRow>>;

    async fn count_participants(&self, challenge_id: ChallengeId) -> StoreResult<i64>;

    /// Snapshot read over current aggregates; never blocks writers.
    async fn leaderboard(
        &self,
        scope: &LeaderboardScope,
        ordering: LeaderboardOrdering,
        limit: i64,
    ) -> StoreResult<Vec<LeaderboardEntry>>;
}

/// Bounds a blocking ledger call. Lock acquisition and row updates may
/// stall behind other writers; past the deadline the caller gets
/// `ConcurrencyTimeout` instead of waiting forever.
pub async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::ConcurrencyTimeout(deadline)),
    }
}
