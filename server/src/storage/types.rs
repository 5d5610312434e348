use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use shared::{ActivityId, ActivityMetrics, Category, ChallengeId, ImpactDelta, UserId};

/// Ledger-owned slice of a user row. Profile fields live elsewhere; `region`
/// is owned by the profile subsystem and only read here as a leaderboard
/// filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAccount {
    pub id: UserId,
    pub region: Option<String>,
    pub total_points: i32,
    pub weekly_points: i32,
    pub trash_collected_kg: f64,
    pub trees_planted: i32,
    pub co2_saved_kg: f64,
}

/// A logged activity. `awarded_points` and `applied_impact_delta` are
/// computed once at creation and never recomputed; deletion reverses exactly
/// these stored values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub user_id: UserId,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub metrics: ActivityMetrics,
    pub photos: Vec<String>,
    pub location: Option<String>,
    pub awarded_points: u32,
    pub applied_impact_delta: ImpactDelta,
    pub verified: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub metrics: ActivityMetrics,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccrualOutcome {
    pub record: ActivityRecord,
    pub total_before: i32,
    pub total_after: i32,
    /// The supplied idempotency key matched an earlier call; `record` is the
    /// original and nothing was re-applied.
    pub deduplicated: bool,
}

#[derive(Debug, Clone)]
pub struct ReversalOutcome {
    pub record: ActivityRecord,
    /// A decrement would have driven an aggregate below zero and was clamped.
    pub clamped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDefinition {
    pub id: ChallengeId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub reward_points: u32,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl ChallengeDefinition {
    /// Whether the challenge accepts joins at `now`. An absent bound leaves
    /// that side of the window open.
    pub fn is_open_at(&self, now: NaiveDateTime) -> bool {
        self.is_active
            && self.starts_at.map_or(true, |starts| now >= starts)
            && self.ends_at.map_or(true, |ends| now <= ends)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChallenge {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub reward_points: u32,
    #[serde(default)]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
}

/// One user's participation in one challenge. At most one row per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipationRecord {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub joined_at: NaiveDateTime,
    pub progress: f64,
    pub completed: bool,
    pub bonus_credited: bool,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub record: ParticipationRecord,
    /// This call won the completion compare-and-set and credited the bonus.
    pub credited: bool,
    pub total_before: i32,
    pub total_after: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub challenge: ChallengeDefinition,
    pub participants: i64,
    pub joined: bool,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipantRow {
    pub user_id: UserId,
    pub region: Option<String>,
    pub progress: f64,
    pub joined_at: NaiveDateTime,
    pub total_points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub region: Option<String>,
    pub total_points: i32,
    pub weekly_points: i32,
    pub trash_collected_kg: f64,
    pub trees_planted: i32,
    pub co2_saved_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_activities: i64,
    pub total_points: i64,
    pub active_users: i64,
    pub activities_by_category: HashMap<Category, i64>,
    pub total_trash_collected_kg: f64,
    pub total_trees_planted: i64,
    pub total_co2_saved_kg: f64,
}
