use std::collections::HashMap;

use chrono::NaiveDateTime;
use greenpoints_server::storage::types::{
    ActivityRecord, ActivityStats, ChallengeSummary, LeaderboardEntry, NewActivity, NewChallenge,
    ParticipantRow, ParticipationRecord, UserAccount,
};
use greenpoints_server::LedgerError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateActivityRequest {
    pub title: String,
    pub description: String,
    /// Tagged per-category metrics; the `category` field selects the shape.
    #[schema(value_type = Object)]
    pub metrics: serde_json::Value,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl CreateActivityRequest {
    pub fn into_new_activity(self) -> Result<NewActivity, LedgerError> {
        let metrics = serde_json::from_value(self.metrics)
            .map_err(|e| LedgerError::Validation(format!("invalid metrics: {e}")))?;
        Ok(NewActivity {
            title: self.title,
            description: self.description,
            metrics,
            photos: self.photos,
            location: self.location,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ImpactResponse {
    pub trash_kg: f64,
    pub trees: u32,
    pub co2_kg: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityResponse {
    pub id: i32,
    pub user_id: i32,
    pub category: String,
    pub title: String,
    pub description: String,
    pub points: u32,
    #[schema(value_type = Object)]
    pub metrics: serde_json::Value,
    pub photos: Vec<String>,
    pub location: Option<String>,
    pub impact: ImpactResponse,
    pub verified: bool,
    pub created_at: NaiveDateTime,
}

impl From<ActivityRecord> for ActivityResponse {
    fn from(record: ActivityRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            category: record.category.to_string(),
            title: record.title,
            description: record.description,
            points: record.awarded_points,
            metrics: serde_json::to_value(&record.metrics).unwrap_or_default(),
            photos: record.photos,
            location: record.location,
            impact: ImpactResponse {
                trash_kg: record.applied_impact_delta.trash_kg,
                trees: record.applied_impact_delta.trees,
                co2_kg: record.applied_impact_delta.co2_kg,
            },
            verified: record.verified,
            created_at: record.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateChallengeRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub reward_points: u32,
    #[serde(default)]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
}

impl CreateChallengeRequest {
    pub fn into_new_challenge(self) -> Result<NewChallenge, LedgerError> {
        let category = self
            .category
            .parse()
            .map_err(|_| LedgerError::Validation(format!("unknown category: {}", self.category)))?;
        Ok(NewChallenge {
            title: self.title,
            description: self.description,
            category,
            reward_points: self.reward_points,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ChallengeResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: String,
    pub reward_points: u32,
    pub participants: i64,
    pub joined: bool,
    pub progress: f64,
    pub is_active: bool,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<ChallengeSummary> for ChallengeResponse {
    fn from(summary: ChallengeSummary) -> Self {
        Self {
            id: summary.challenge.id,
            title: summary.challenge.title,
            description: summary.challenge.description,
            category: summary.challenge.category.to_string(),
            reward_points: summary.challenge.reward_points,
            participants: summary.participants,
            joined: summary.joined,
            progress: summary.progress,
            is_active: summary.challenge.is_active,
            starts_at: summary.challenge.starts_at,
            ends_at: summary.challenge.ends_at,
            created_at: summary.challenge.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ParticipationResponse {
    pub challenge_id: i32,
    pub joined_at: NaiveDateTime,
    pub progress: f64,
    pub completed: bool,
    pub bonus_credited: bool,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<ParticipationRecord> for ParticipationResponse {
    fn from(record: ParticipationRecord) -> Self {
        Self {
            challenge_id: record.challenge_id,
            joined_at: record.joined_at,
            progress: record.progress,
            completed: record.completed,
            bonus_credited: record.bonus_credited,
            completed_at: record.completed_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ParticipantResponse {
    pub user_id: i32,
    pub region: Option<String>,
    pub progress: f64,
    pub joined_at: NaiveDateTime,
    pub total_points: i32,
}

impl From<ParticipantRow> for ParticipantResponse {
    fn from(row: ParticipantRow) -> Self {
        Self {
            user_id: row.user_id,
            region: row.region,
            progress: row.progress,
            joined_at: row.joined_at,
            total_points: row.total_points,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateProgressRequest {
    pub progress: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpsertAccountRequest {
    pub user_id: i32,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: i32,
    pub region: Option<String>,
    pub total_points: i32,
    pub weekly_points: i32,
    pub trash_collected_kg: f64,
    pub trees_planted: i32,
    pub co2_saved_kg: f64,
}

impl From<UserAccount> for AccountResponse {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            region: account.region,
            total_points: account.total_points,
            weekly_points: account.weekly_points,
            trash_collected_kg: account.trash_collected_kg,
            trees_planted: account.trees_planted,
            co2_saved_kg: account.co2_saved_kg,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntryResponse {
    pub rank: u64,
    pub user_id: i32,
    pub region: Option<String>,
    pub total_points: i32,
    pub weekly_points: i32,
    pub trash_collected_kg: f64,
    pub trees_planted: i32,
    pub co2_saved_kg: f64,
}

impl LeaderboardEntryResponse {
    /// Rank is assigned at projection time from the returned order; stored
    /// ranks are never used.
    pub fn ranked(entries: Vec<LeaderboardEntry>) -> Vec<Self> {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Self {
                rank: index as u64 + 1,
                user_id: entry.user_id,
                region: entry.region,
                total_points: entry.total_points,
                weekly_points: entry.weekly_points,
                trash_collected_kg: entry.trash_collected_kg,
                trees_planted: entry.trees_planted,
                co2_saved_kg: entry.co2_saved_kg,
            })
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub total_activities: i64,
    pub total_points: i64,
    pub active_users: i64,
    pub activities_by_category: HashMap<String, i64>,
    pub total_trash_collected_kg: f64,
    pub total_trees_planted: i64,
    pub total_co2_saved_kg: f64,
}

impl From<ActivityStats> for StatsResponse {
    fn from(stats: ActivityStats) -> Self {
        Self {
            total_activities: stats.total_activities,
            total_points: stats.total_points,
            active_users: stats.active_users,
            activities_by_category: stats
                .activities_by_category
                .into_iter()
                .map(|(category, count)| (category.to_string(), count))
                .collect(),
            total_trash_collected_kg: stats.total_trash_collected_kg,
            total_trees_planted: stats.total_trees_planted,
            total_co2_saved_kg: stats.total_co2_saved_kg,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
