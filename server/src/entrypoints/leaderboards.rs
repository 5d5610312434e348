use greenpoints_server::leaderboard::Leaderboard;
use greenpoints_server::LedgerError;
use rocket::serde::json::Json;
use rocket::State;
use shared::{LeaderboardOrdering, LeaderboardScope};

use super::types::LeaderboardEntryResponse;

#[utoipa::path(context_path = "/leaderboard", responses(
    (status = 200, description = "Ranked users, recomputed from live totals", body = [LeaderboardEntryResponse])
))]
#[get("/?<region>&<ordering>&<limit>")]
pub(super) async fn get_leaderboard(
    leaderboard: &State<Leaderboard>,
    region: Option<String>,
    ordering: Option<String>,
    limit: Option<i64>,
) -> Result<Json<Vec<LeaderboardEntryResponse>>, LedgerError> {
    let ordering = ordering
        .map(|value| {
            value
                .parse::<LeaderboardOrdering>()
                .map_err(|_| LedgerError::Validation(format!("unknown ordering: {value}")))
        })
        .transpose()?
        .unwrap_or_default();
    let entries = leaderboard
        .get(LeaderboardScope::from_region(region), ordering, limit)
        .await?;
    Ok(Json(LeaderboardEntryResponse::ranked(entries)))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing leaderboard entrypoints", |rocket| async {
        rocket.mount("/leaderboard", rocket::routes![get_leaderboard])
    })
}
