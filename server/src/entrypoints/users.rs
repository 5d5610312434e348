use greenpoints_server::ledger::Ledger;
use greenpoints_server::LedgerError;
use rocket::serde::json::Json;
use rocket::State;

use super::types::{AccountResponse, UpsertAccountRequest};

#[utoipa::path(context_path = "/users", responses(
    (status = 200, description = "Provision or refresh a ledger account row", body = AccountResponse)
))]
#[post("/", data = "<account>")]
pub(super) async fn upsert_account(
    ledger: &State<Ledger>,
    account: Json<UpsertAccountRequest>,
) -> Result<Json<AccountResponse>, LedgerError> {
    let account = account.into_inner();
    let record = ledger
        .upsert_account(account.user_id, account.region)
        .await?;
    Ok(Json(record.into()))
}

#[utoipa::path(context_path = "/users", responses(
    (status = 200, description = "Ledger-owned aggregates for one user", body = AccountResponse)
))]
#[get("/<user_id>")]
pub(super) async fn get_account(
    ledger: &State<Ledger>,
    user_id: i32,
) -> Result<Json<AccountResponse>, LedgerError> {
    Ok(Json(ledger.get_account(user_id).await?.into()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing user entrypoints", |rocket| async {
        rocket.mount("/users", rocket::routes![upsert_account, get_account])
    })
}
