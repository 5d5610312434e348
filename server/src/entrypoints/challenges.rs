use greenpoints_server::challenges::Challenges;
use greenpoints_server::LedgerError;
use rocket::serde::json::Json;
use rocket::State;
use shared::Category;

use super::types::{
    ChallengeResponse, CreateChallengeRequest, MessageResponse, ParticipantResponse,
    ParticipationResponse, UpdateProgressRequest,
};
use super::{AuthenticatedUser, MaybeUser};

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "Create a challenge", body = ChallengeResponse)
))]
#[post("/", data = "<new>")]
pub(super) async fn create_challenge(
    challenges: &State<Challenges>,
    _user: AuthenticatedUser,
    new: Json<CreateChallengeRequest>,
) -> Result<Json<ChallengeResponse>, LedgerError> {
    let challenge = challenges
        .create_challenge(new.into_inner().into_new_challenge()?)
        .await?;
    Ok(Json(ChallengeResponse {
        id: challenge.id,
        title: challenge.title,
        description: challenge.description,
        category: challenge.category.to_string(),
        reward_points: challenge.reward_points,
        participants: 0,
        joined: false,
        progress: 0.0,
        is_active: challenge.is_active,
        starts_at: challenge.starts_at,
        ends_at: challenge.ends_at,
        created_at: challenge.created_at,
    }))
}

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "List challenges", body = [ChallengeResponse])
))]
#[get("/?<active_only>&<category>&<page>&<limit>")]
pub(super) async fn list_challenges(
    challenges: &State<Challenges>,
    viewer: MaybeUser,
    active_only: Option<bool>,
    category: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<ChallengeResponse>>, LedgerError> {
    let category = category
        .map(|value| {
            value
                .parse::<Category>()
                .map_err(|_| LedgerError::Validation(format!("unknown category: {value}")))
        })
        .transpose()?;
    let page = page.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let summaries = challenges
        .list_challenges(active_only.unwrap_or(true), category, viewer.0, page, limit)
        .await?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "List the caller's joined challenges", body = [ChallengeResponse])
))]
#[get("/my?<page>&<limit>")]
pub(super) async fn my_challenges(
    challenges: &State<Challenges>,
    user: AuthenticatedUser,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<ChallengeResponse>>, LedgerError> {
    let page = page.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let summaries = challenges.joined_challenges(user.0, page, limit).await?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "Get one challenge", body = ChallengeResponse)
))]
#[get("/<challenge_id>")]
pub(super) async fn get_challenge(
    challenges: &State<Challenges>,
    viewer: MaybeUser,
    challenge_id: i32,
) -> Result<Json<ChallengeResponse>, LedgerError> {
    // Reuse the listing projection so participant counts and the viewer's
    // join state come back in one shape.
    let challenge = challenges.get_challenge(challenge_id).await?;
    let participation = match viewer.0 {
        Some(user_id) => challenges.get_participation(user_id, challenge_id).await.ok(),
        None => None,
    };
    let participants = challenges.participant_count(challenge_id).await?;
    Ok(Json(ChallengeResponse {
        id: challenge.id,
        title: challenge.title,
        description: challenge.description,
        category: challenge.category.to_string(),
        reward_points: challenge.reward_points,
        participants,
        joined: participation.is_some(),
        progress: participation.map_or(0.0, |p| p.progress),
        is_active: challenge.is_active,
        starts_at: challenge.starts_at,
        ends_at: challenge.ends_at,
        created_at: challenge.created_at,
    }))
}

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "Join a challenge", body = ParticipationResponse)
))]
#[post("/<challenge_id>/join")]
pub(super) async fn join_challenge(
    challenges: &State<Challenges>,
    user: AuthenticatedUser,
    challenge_id: i32,
) -> Result<Json<ParticipationResponse>, LedgerError> {
    let participation = challenges.join(user.0, challenge_id).await?;
    Ok(Json(participation.into()))
}

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "Update challenge progress", body = ParticipationResponse)
))]
#[put("/<challenge_id>/progress", data = "<update>")]
pub(super) async fn update_progress(
    challenges: &State<Challenges>,
    user: AuthenticatedUser,
    challenge_id: i32,
    update: Json<UpdateProgressRequest>,
) -> Result<Json<ParticipationResponse>, LedgerError> {
    let participation = challenges
        .update_progress(user.0, challenge_id, update.progress)
        .await?;
    Ok(Json(participation.into()))
}

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "Leave a challenge", body = MessageResponse)
))]
#[post("/<challenge_id>/leave")]
pub(super) async fn leave_challenge(
    challenges: &State<Challenges>,
    user: AuthenticatedUser,
    challenge_id: i32,
) -> Result<Json<MessageResponse>, LedgerError> {
    challenges.leave(user.0, challenge_id).await?;
    Ok(Json(MessageResponse::new("Successfully left challenge")))
}

#[utoipa::path(context_path = "/challenges", responses(
    (status = 200, description = "List participants ordered by progress", body = [ParticipantResponse])
))]
#[get("/<challenge_id>/participants?<page>&<limit>")]
pub(super) async fn get_participants(
    challenges: &State<Challenges>,
    challenge_id: i32,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<ParticipantResponse>>, LedgerError> {
    let page = page.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(50).clamp(1, 100);
    let participants = challenges
        .list_participants(challenge_id, page, limit)
        .await?;
    Ok(Json(participants.into_iter().map(Into::into).collect()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing challenge entrypoints", |rocket| async {
        rocket.mount(
            "/challenges",
            rocket::routes![
                create_challenge,
                list_challenges,
                my_challenges,
                get_challenge,
                join_challenge,
                update_progress,
                leave_challenge,
                get_participants
            ],
        )
    })
}
