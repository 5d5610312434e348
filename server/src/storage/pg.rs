use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use shared::{
    ActivityId, ActivityMetrics, Category, ChallengeId, ImpactDelta, LeaderboardOrdering,
    LeaderboardScope, UserId,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};

use super::types::{
    AccrualOutcome, ActivityRecord, ActivityStats, ChallengeDefinition, ChallengeSummary,
    LeaderboardEntry, NewActivity, NewChallenge, ParticipantRow, ParticipationRecord,
    ProgressOutcome, ReversalOutcome, UserAccount,
};
use super::{Store, StoreResult};
use crate::error::LedgerError;

const ACTIVITY_COLUMNS: &str = "id, user_id, category, title, description, metrics, photos, \
     location, awarded_points, impact_trash_kg, impact_trees, impact_co2_kg, verified, created_at";

const CHALLENGE_COLUMNS: &str =
    "id, title, description, category, reward_points, starts_at, ends_at, is_active, created_at";

const ACCOUNT_COLUMNS: &str =
    "id, region, total_points, weekly_points, trash_collected_kg, trees_planted, co2_saved_kg";

const PARTICIPATION_COLUMNS: &str =
    "user_id, challenge_id, joined_at, progress, completed, bonus_credited, completed_at";

/// Postgres-backed store. Per-user serialization comes from the row locks
/// taken by the atomic UPDATEs; every multi-statement operation runs in one
/// transaction, and a dropped transaction rolls back, so cancelled callers
/// leave no partial increments behind.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn find_existing_accrual(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        key: &str,
    ) -> StoreResult<Option<AccrualOutcome>> {
        let activity_id: Option<i32> = sqlx::query_scalar(
            "SELECT activity_id FROM idempotency_keys WHERE user_id = $1 AND key = $2",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(activity_id) = activity_id else {
            return Ok(None);
        };

        let row: ActivityRow =
            sqlx::query_as(&format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1"))
                .bind(activity_id)
                .fetch_one(&mut *conn)
                .await?;
        let total: i32 = sqlx::query_scalar("SELECT total_points FROM user_accounts WHERE id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(Some(AccrualOutcome {
            record: row.try_into()?,
            total_before: total,
            total_after: total,
            deduplicated: true,
        }))
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i32,
    user_id: i32,
    category: String,
    title: String,
    description: String,
    metrics: String,
    photos: String,
    location: Option<String>,
    awarded_points: i32,
    impact_trash_kg: f64,
    impact_trees: i32,
    impact_co2_kg: f64,
    verified: bool,
    created_at: NaiveDateTime,
}

impl TryFrom<ActivityRow> for ActivityRecord {
    type Error = LedgerError;

    fn try_from(row: ActivityRow) -> Result<Self, LedgerError> {
        let metrics: ActivityMetrics =
            serde_json::from_str(&row.metrics).map_err(anyhow::Error::from)?;
        let photos: Vec<String> = serde_json::from_str(&row.photos).map_err(anyhow::Error::from)?;
        let category: Category = row
            .category
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown category column value: {}", row.category))?;
        Ok(ActivityRecord {
            id: row.id,
            user_id: row.user_id,
            category,
            title: row.title,
            description: row.description,
            metrics,
            photos,
            location: row.location,
            awarded_points: row.awarded_points.max(0) as u32,
            applied_impact_delta: ImpactDelta {
                trash_kg: row.impact_trash_kg,
                trees: row.impact_trees.max(0) as u32,
                co2_kg: row.impact_co2_kg,
            },
            verified: row.verified,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChallengeRow {
    id: i32,
    title: String,
    description: String,
    category: String,
    reward_points: i32,
    starts_at: Option<NaiveDateTime>,
    ends_at: Option<NaiveDateTime>,
    is_active: bool,
    created_at: NaiveDateTime,
}

impl TryFrom<ChallengeRow> for ChallengeDefinition {
    type Error = LedgerError;

    fn try_from(row: ChallengeRow) -> Result<Self, LedgerError> {
        let category: Category = row
            .category
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown category column value: {}", row.category))?;
        Ok(ChallengeDefinition {
            id: row.id,
            title: row.title,
            description: row.description,
            category,
            reward_points: row.reward_points.max(0) as u32,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChallengeSummaryRow {
    #[sqlx(flatten)]
    challenge: ChallengeRow,
    participants: i64,
    joined: bool,
    progress: f64,
}

impl TryFrom<ChallengeSummaryRow> for ChallengeSummary {
    type Error = LedgerError;

    fn try_from(row: ChallengeSummaryRow) -> Result<Self, LedgerError> {
        Ok(ChallengeSummary {
            challenge: row.challenge.try_into()?,
            participants: row.participants,
            joined: row.joined,
            progress: row.progress,
        })
    }
}

/// Inserts referencing a missing user or challenge trip a foreign key
/// instead of a prior existence read; translate that to the caller's 404.
fn fk_to_not_found(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23503") {
            return LedgerError::NotFound("user or challenge");
        }
    }
    LedgerError::Storage(err)
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_account(
        &self,
        user_id: UserId,
        region: Option<&str>,
    ) -> StoreResult<UserAccount> {
        // First try to update the account
        let updated: Option<UserAccount> = sqlx::query_as(&format!(
            "UPDATE user_accounts SET region = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(region)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(account) = updated {
            return Ok(account);
        }

        // If the update did not find a matching row, insert the account
        let inserted: Option<UserAccount> = sqlx::query_as(&format!(
            "INSERT INTO user_accounts (id, region) VALUES ($1, $2) \
             ON CONFLICT (id) DO NOTHING RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(region)
        .fetch_optional(&self.pool)
        .await?;
        match inserted {
            Some(account) => Ok(account),
            // Lost an upsert race; the row exists now.
            None => self
                .get_account(user_id)
                .await?
                .ok_or(LedgerError::NotFound("user")),
        }
    }

    async fn get_account(&self, user_id: UserId) -> StoreResult<Option<UserAccount>> {
        Ok(sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM user_accounts WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn apply_accrual(
        &self,
        user_id: UserId,
        new: &NewActivity,
        awarded_points: u32,
        delta: &ImpactDelta,
        idempotency_key: Option<&str>,
    ) -> StoreResult<AccrualOutcome> {
        let metrics_json = serde_json::to_string(&new.metrics).map_err(anyhow::Error::from)?;
        let photos_json = serde_json::to_string(&new.photos).map_err(anyhow::Error::from)?;

        let mut tx = self.pool.begin().await?;

        if let Some(key) = idempotency_key {
            if let Some(outcome) = self.find_existing_accrual(tx.as_mut(), user_id, key).await? {
                return Ok(outcome);
            }
        }

        let total_after: Option<i32> = sqlx::query_scalar(
            "UPDATE user_accounts \
             SET total_points = total_points + $2, \
                 weekly_points = weekly_points + $2, \
                 trash_collected_kg = trash_collected_kg + $3, \
                 trees_planted = trees_planted + $4, \
                 co2_saved_kg = co2_saved_kg + $5 \
             WHERE id = $1 \
             RETURNING total_points",
        )
        .bind(user_id)
        .bind(awarded_points as i32)
        .bind(delta.trash_kg)
        .bind(delta.trees as i32)
        .bind(delta.co2_kg)
        .fetch_optional(tx.as_mut())
        .await?;
        let total_after = total_after.ok_or(LedgerError::NotFound("user"))?;
        let total_before = total_after - awarded_points as i32;

        let row: ActivityRow = sqlx::query_as(&format!(
            "INSERT INTO activities (user_id, category, title, description, metrics, photos, \
                 location, awarded_points, impact_trash_kg, impact_trees, impact_co2_kg) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {ACTIVITY_COLUMNS}"
        ))
        .bind(user_id)
        .bind(new.metrics.category().to_string())
        .bind(&new.title)
        .bind(&new.description)
        .bind(&metrics_json)
        .bind(&photos_json)
        .bind(new.location.as_deref())
        .bind(awarded_points as i32)
        .bind(delta.trash_kg)
        .bind(delta.trees as i32)
        .bind(delta.co2_kg)
        .fetch_one(tx.as_mut())
        .await?;

        if let Some(key) = idempotency_key {
            let inserted = sqlx::query(
                "INSERT INTO idempotency_keys (user_id, key, activity_id) VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, key) DO NOTHING",
            )
            .bind(user_id)
            .bind(key)
            .bind(row.id)
            .execute(tx.as_mut())
            .await?;
            if inserted.rows_affected() == 0 {
                // A concurrent call with the same key won; drop our work and
                // hand back the committed original.
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                return self
                    .find_existing_accrual(&mut conn, user_id, key)
                    .await?
                    .ok_or(LedgerError::NotFound("activity"));
            }
        }

        tx.commit().await?;

        Ok(AccrualOutcome {
            record: row.try_into()?,
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
        let mut tx = self.pool.begin().await?;

        let row: Option<ActivityRow> = sqlx::query_as(&format!(
            "DELETE FROM activities WHERE id = $1 AND user_id = $2 RETURNING {ACTIVITY_COLUMNS}"
        ))
        .bind(activity_id)
        .bind(user_id)
        .fetch_optional(tx.as_mut())
        .await?;
        let record: ActivityRecord = row.ok_or(LedgerError::NotFound("activity"))?.try_into()?;

        let points = record.awarded_points as i32;
        let delta = record.applied_impact_delta;
        let prev: Option<(i32, i32, f64, i32, f64)> = sqlx::query_as(
            "WITH prev AS ( \
                 SELECT total_points, weekly_points, trash_collected_kg, trees_planted, \
                        co2_saved_kg \
                 FROM user_accounts WHERE id = $1 FOR UPDATE \
             ) \
             UPDATE user_accounts u \
             SET total_points = GREATEST(u.total_points - $2, 0), \
                 weekly_points = GREATEST(u.weekly_points - $2, 0), \
                 trash_collected_kg = GREATEST(u.trash_collected_kg - $3, 0), \
                 trees_planted = GREATEST(u.trees_planted - $4, 0), \
                 co2_saved_kg = GREATEST(u.co2_saved_kg - $5, 0) \
             FROM prev \
             WHERE u.id = $1 \
             RETURNING prev.total_points, prev.weekly_points, prev.trash_collected_kg, \
                       prev.trees_planted, prev.co2_saved_kg",
        )
        .bind(user_id)
        .bind(points)
        .bind(delta.trash_kg)
        .bind(delta.trees as i32)
        .bind(delta.co2_kg)
        .fetch_optional(tx.as_mut())
        .await?;
        let (prev_total, prev_weekly, prev_trash, prev_trees, prev_co2) =
            prev.ok_or(LedgerError::NotFound("user"))?;

        tx.commit().await?;

        let clamped = prev_total < points
            || prev_weekly < points
            || prev_trash - delta.trash_kg < -1e-9
            || prev_trees < delta.trees as i32
            || prev_co2 - delta.co2_kg < -1e-9;

        Ok(ReversalOutcome { record, clamped })
    }

    async fn get_activity(&self, activity_id: ActivityId) -> StoreResult<Option<ActivityRecord>> {
        let row: Option<ActivityRow> = sqlx::query_as(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1"
        ))
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ActivityRecord::try_from).transpose()
    }

    async fn list_activities(
        &self,
        user_id: UserId,
        category: Option<Category>,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ActivityRecord>> {
        let rows: Vec<ActivityRow> = sqlx::query_as(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities \
             WHERE user_id = $1 AND ($2::text IS NULL OR category = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(category.map(|category| category.to_string()))
        .bind(limit)
        .bind(page * limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ActivityRecord::try_from).collect()
    }

    async fn set_verified(&self, activity_id: ActivityId, verified: bool) -> StoreResult<()> {
        let updated = sqlx::query("UPDATE activities SET verified = $2 WHERE id = $1")
            .bind(activity_id)
            .bind(verified)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::NotFound("activity"));
        }
        Ok(())
    }

    async fn activity_stats(&self) -> StoreResult<ActivityStats> {
        let (total_activities, total_points, active_users, trash, trees, co2): (
            i64,
            i64,
            i64,
            f64,
            i64,
            f64,
        ) = sqlx::query_as(
            "SELECT \
                 (SELECT COUNT(*) FROM activities), \
                 (SELECT COALESCE(SUM(awarded_points), 0) FROM activities), \
                 (SELECT COUNT(DISTINCT user_id) FROM activities), \
                 (SELECT COALESCE(SUM(trash_collected_kg), 0) FROM user_accounts), \
                 (SELECT COALESCE(SUM(trees_planted), 0) FROM user_accounts), \
                 (SELECT COALESCE(SUM(co2_saved_kg), 0) FROM user_accounts)",
        )
        .fetch_one(&self.pool)
        .await?;

        let by_category: Vec<(String, i64)> =
            sqlx::query_as("SELECT category, COUNT(*) FROM activities GROUP BY category")
                .fetch_all(&self.pool)
                .await?;
        let activities_by_category: HashMap<Category, i64> = by_category
            .into_iter()
            .filter_map(|(category, count)| Some((category.parse::<Category>().ok()?, count)))
            .collect();

        Ok(ActivityStats {
            total_activities,
            total_points,
            active_users,
            activities_by_category,
            total_trash_collected_kg: trash,
            total_trees_planted: trees,
            total_co2_saved_kg: co2,
        })
    }

    async fn insert_challenge(&self, new: &NewChallenge) -> StoreResult<ChallengeDefinition> {
        let row: ChallengeRow = sqlx::query_as(&format!(
            "INSERT INTO challenges (title, description, category, reward_points, starts_at, \
                 ends_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {CHALLENGE_COLUMNS}"
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.category.to_string())
        .bind(new.reward_points as i32)
        .bind(new.starts_at)
        .bind(new.ends_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> StoreResult<Option<ChallengeDefinition>> {
        let row: Option<ChallengeRow> = sqlx::query_as(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = $1"
        ))
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ChallengeDefinition::try_from).transpose()
    }

    async fn list_challenges(
        &self,
        active_only: bool,
        category: Option<Category>,
        viewer: Option<UserId>,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ChallengeSummary>> {
        let rows: Vec<ChallengeSummaryRow> = sqlx::query_as(
            "SELECT c.id, c.title, c.description, c.category, c.reward_points, c.starts_at, \
                 c.ends_at, c.is_active, c.created_at, \
                 COUNT(p.user_id) AS participants, \
                 COALESCE(BOOL_OR(p.user_id = $1), FALSE) AS joined, \
                 COALESCE(MAX(CASE WHEN p.user_id = $1 THEN p.progress END), 0) AS progress \
             FROM challenges c \
             LEFT JOIN challenge_participants p ON p.challenge_id = c.id \
             WHERE (NOT $2 OR c.is_active) AND ($3::text IS NULL OR c.category = $3) \
             GROUP BY c.id \
             ORDER BY c.created_at DESC, c.id DESC \
             LIMIT $4 OFFSET $5",
        )
        .bind(viewer)
        .bind(active_only)
        .bind(category.map(|category| category.to_string()))
        .bind(limit)
        .bind(page * limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ChallengeSummary::try_from).collect()
    }

    async fn joined_challenges(
        &self,
        user_id: UserId,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ChallengeSummary>> {
        let rows: Vec<ChallengeSummaryRow> = sqlx::query_as(
            "SELECT c.id, c.title, c.description, c.category, c.reward_points, c.starts_at, \
                 c.ends_at, c.is_active, c.created_at, \
                 (SELECT COUNT(*) FROM challenge_participants pc \
                  WHERE pc.challenge_id = c.id) AS participants, \
                 TRUE AS joined, \
                 p.progress AS progress \
             FROM challenges c \
             JOIN challenge_participants p ON p.challenge_id = c.id AND p.user_id = $1 \
             ORDER BY p.joined_at DESC, c.id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(page * limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ChallengeSummary::try_from).collect()
    }

    async fn insert_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<ParticipationRecord> {
        let row: Option<ParticipationRecord> = sqlx::query_as(&format!(
            "INSERT INTO challenge_participants (user_id, challenge_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING RETURNING {PARTICIPATION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(fk_to_not_found)?;
        row.ok_or(LedgerError::Conflict(challenge_id))
    }

    async fn get_participation(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
    ) -> StoreResult<Option<ParticipationRecord>> {
        Ok(sqlx::query_as(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM challenge_participants \
             WHERE user_id = $1 AND challenge_id = $2"
        ))
        .bind(user_id)
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_progress(
        &self,
        user_id: UserId,
        challenge_id: ChallengeId,
        progress: f64,
        reward_points: u32,
    ) -> StoreResult<ProgressOutcome> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE challenge_participants SET progress = $3 \
             WHERE user_id = $1 AND challenge_id = $2",
        )
        .bind(user_id)
        .bind(challenge_id)
        .bind(progress)
        .execute(tx.as_mut())
        .await?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::NotFound("participation"));
        }

        let mut credited = false;
        let mut total_before = 0;
        let mut total_after = 0;
        if progress >= 100.0 {
            // Compare-and-set: only the call that flips bonus_credited
            // credits the reward, no matter how many reach the threshold.
            let cas = sqlx::query(
                "UPDATE challenge_participants \
                 SET completed = TRUE, bonus_credited = TRUE, completed_at = now() \
                 WHERE user_id = $1 AND challenge_id = $2 AND bonus_credited = FALSE",
            )
            .bind(user_id)
            .bind(challenge_id)
            .execute(tx.as_mut())
            .await?;
            if cas.rows_affected() == 1 {
                let new_total: Option<i32> = sqlx::query_scalar(
                    "UPDATE user_accounts \
                     SET total_points = total_points + $2, weekly_points = weekly_points + $2 \
                     WHERE id = $1 \
                     RETURNING total_points",
                )
                .bind(user_id)
                .bind(reward_points as i32)
                .fetch_optional(tx.as_mut())
                .await?;
                total_after = new_total.ok_or(LedgerError::NotFound("user"))?;
                total_before = total_after - reward_points as i32;
                credited = true;
            }
        }

        let record: ParticipationRecord = sqlx::query_as(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM challenge_participants \
             WHERE user_id = $1 AND challenge_id = $2"
        ))
        .bind(user_id)
        .bind(challenge_id)
        .fetch_one(tx.as_mut())
        .await?;

        tx.commit().await?;

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
        let deleted = sqlx::query(
            "DELETE FROM challenge_participants WHERE user_id = $1 AND challenge_id = $2",
        )
        .bind(user_id)
        .bind(challenge_id)
        .execute(&self.pool)
        .await?;
        if deleted.rows_affected() == 0 {
            return Err(LedgerError::NotFound("participation"));
        }
        Ok(())
    }

    async fn list_participants(
        &self,
        challenge_id: ChallengeId,
        page: i64,
        limit: i64,
    ) -> StoreResult<Vec<ParticipantRow>> {
        Ok(sqlx::query_as(
            "SELECT p.user_id, u.region, p.progress, p.joined_at, u.total_points \
             FROM challenge_participants p \
             JOIN user_accounts u ON u.id = p.user_id \
             WHERE p.challenge_id = $1 \
             ORDER BY p.progress DESC, p.user_id ASC \
             LIMIT $2 OFFSET $3",
        )
        .bind(challenge_id)
        .bind(limit)
        .bind(page * limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_participants(&self, challenge_id: ChallengeId) -> StoreResult<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM challenge_participants WHERE challenge_id = $1",
        )
        .bind(challenge_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn leaderboard(
        &self,
        scope: &LeaderboardScope,
        ordering: LeaderboardOrdering,
        limit: i64,
    ) -> StoreResult<Vec<LeaderboardEntry>> {
        // Ranking always recomputes from the live aggregates; no stored rank
        // column is consulted. Ascending id breaks ties deterministically.
        let order_column = match ordering {
            LeaderboardOrdering::AllTime => "total_points",
            LeaderboardOrdering::Weekly => "weekly_points",
        };
        let entries = match scope {
            LeaderboardScope::Global => {
                sqlx::query_as(&format!(
                    "SELECT id AS user_id, region, total_points, weekly_points, \
                         trash_collected_kg, trees_planted, co2_saved_kg \
                     FROM user_accounts \
                     ORDER BY {order_column} DESC, id ASC \
                     LIMIT $1"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            LeaderboardScope::Region(region) => {
                sqlx::query_as(&format!(
                    "SELECT id AS user_id, region, total_points, weekly_points, \
                         trash_collected_kg, trees_planted, co2_saved_kg \
                     FROM user_accounts \
                     WHERE region = $1 \
                     ORDER BY {order_column} DESC, id ASC \
                     LIMIT $2"
                ))
                .bind(region)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(entries)
    }
}
