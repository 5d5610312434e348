use greenpoints_server::ledger::Ledger;
use greenpoints_server::LedgerError;
use rocket::serde::json::Json;
use rocket::State;
use shared::Category;

use super::types::{ActivityResponse, CreateActivityRequest, MessageResponse, StatsResponse};
use super::{AuthenticatedUser, IdempotencyKey};

#[utoipa::path(context_path = "/activities", responses(
    (status = 200, description = "Log an activity and credit its points", body = ActivityResponse)
))]
#[post("/", data = "<new>")]
pub(super) async fn create_activity(
    ledger: &State<Ledger>,
    user: AuthenticatedUser,
    idempotency_key: IdempotencyKey,
    new: Json<CreateActivityRequest>,
) -> Result<Json<ActivityResponse>, LedgerError> {
    let new = new.into_inner().into_new_activity()?;
    let record = ledger
        .create_activity(user.0, new, idempotency_key.0)
        .await?;
    Ok(Json(record.into()))
}

#[utoipa::path(context_path = "/activities", responses(
    (status = 200, description = "Get one activity", body = ActivityResponse)
))]
#[get("/<activity_id>")]
pub(super) async fn get_activity(
    ledger: &State<Ledger>,
    activity_id: i32,
) -> Result<Json<ActivityResponse>, LedgerError> {
    let record = ledger.get_activity(activity_id).await?;
    Ok(Json(record.into()))
}

#[utoipa::path(context_path = "/activities", responses(
    (status = 200, description = "List the caller's activities, newest first", body = [ActivityResponse])
))]
#[get("/my?<category>&<page>&<limit>")]
pub(super) async fn my_activities(
    ledger: &State<Ledger>,
    user: AuthenticatedUser,
    category: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<ActivityResponse>>, LedgerError> {
    let category = category
        .map(|value| {
            value
                .parse::<Category>()
                .map_err(|_| LedgerError::Validation(format!("unknown category: {value}")))
        })
        .transpose()?;
    let page = page.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let records = ledger.list_activities(user.0, category, page, limit).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(context_path = "/activities", responses(
    (status = 200, description = "Delete an owned activity and reverse its accrual", body = MessageResponse)
))]
#[delete("/<activity_id>")]
pub(super) async fn delete_activity(
    ledger: &State<Ledger>,
    user: AuthenticatedUser,
    activity_id: i32,
) -> Result<Json<MessageResponse>, LedgerError> {
    ledger.delete_activity(activity_id, user.0).await?;
    Ok(Json(MessageResponse::new("Activity deleted successfully")))
}

#[utoipa::path(context_path = "/activities", responses(
    (status = 200, description = "Moderation callback flipping the verified flag", body = MessageResponse)
))]
#[put("/<activity_id>/verified?<value>")]
pub(super) async fn set_verified(
    ledger: &State<Ledger>,
    activity_id: i32,
    value: bool,
) -> Result<Json<MessageResponse>, LedgerError> {
    ledger.set_verified(activity_id, value).await?;
    Ok(Json(MessageResponse::new("Verification flag updated")))
}

#[utoipa::path(context_path = "/activities", responses(
    (status = 200, description = "Global activity statistics", body = StatsResponse)
))]
#[get("/stats/global")]
pub(super) async fn global_stats(
    ledger: &State<Ledger>,
) -> Result<Json<StatsResponse>, LedgerError> {
    Ok(Json(ledger.stats().await?.into()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing activity entrypoints", |rocket| async {
        rocket.mount(
            "/activities",
            rocket::routes![
                create_activity,
                get_activity,
                my_activities,
                delete_activity,
                set_verified,
                global_stats
            ],
        )
    })
}
