use rocket::fairing::AdHoc;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use shared::UserId;
use utoipa::OpenApi;

pub mod activities;
pub mod challenges;
pub mod leaderboards;
pub mod types;
pub mod users;

/// Caller identity resolved by the authentication gateway in front of this
/// service and forwarded as a header; this service never issues or checks
/// credentials itself.
pub struct AuthenticatedUser(pub UserId);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request
            .headers()
            .get_one("x-user-id")
            .and_then(|value| value.parse().ok())
        {
            Some(user_id) => Outcome::Success(AuthenticatedUser(user_id)),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Like `AuthenticatedUser` but for endpoints that also serve anonymous
/// callers.
pub struct MaybeUser(pub Option<UserId>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeUser {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(MaybeUser(
            request
                .headers()
                .get_one("x-user-id")
                .and_then(|value| value.parse().ok()),
        ))
    }
}

/// Client-chosen token for safely retrying a non-idempotent write; a repeat
/// of the same key replays the original result instead of double-logging.
pub struct IdempotencyKey(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for IdempotencyKey {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(IdempotencyKey(
            request
                .headers()
                .get_one("idempotency-key")
                .map(str::to_owned),
        ))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        activities::create_activity,
        activities::get_activity,
        activities::my_activities,
        activities::delete_activity,
        activities::set_verified,
        activities::global_stats,
        challenges::create_challenge,
        challenges::list_challenges,
        challenges::my_challenges,
        challenges::get_challenge,
        challenges::join_challenge,
        challenges::update_progress,
        challenges::leave_challenge,
        challenges::get_participants,
        leaderboards::get_leaderboard,
        users::upsert_account,
        users::get_account,
    ),
    components(schemas(
        types::CreateActivityRequest,
        types::ActivityResponse,
        types::ImpactResponse,
        types::CreateChallengeRequest,
        types::ChallengeResponse,
        types::ParticipationResponse,
        types::ParticipantResponse,
        types::UpdateProgressRequest,
        types::UpsertAccountRequest,
        types::AccountResponse,
        types::LeaderboardEntryResponse,
        types::StatsResponse,
        types::MessageResponse,
    ))
)]
struct ApiDoc;

#[rocket::get("/openapi.json")]
fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket
            .attach(activities::stage())
            .attach(challenges::stage())
            .attach(leaderboards::stage())
            .attach(users::stage())
            .mount("/", rocket::routes![openapi_json])
    })
}
