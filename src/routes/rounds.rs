use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use validator::Validate;

use crate::{
    dto::{
        requests::{PlayerRequest, SpeechRequest, StrategyRequest, TrapRequest, VoteRequest},
        responses::ActionResponse,
    },
    error::AppError,
    services::round_service,
    state::SharedState,
};

/// Player and admin actions inside the current round.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{code}/strategy", post(submit_strategy))
        .route("/games/{code}/trap", post(submit_trap))
        .route("/games/{code}/trap/vote", post(vote_trap))
        .route("/games/{code}/coop/vote", post(vote_coop))
        .route("/games/{code}/sacrifice/volunteer", post(volunteer))
        .route("/games/{code}/sacrifice/advance", post(advance_volunteers))
        .route("/games/{code}/sacrifice/vote", post(vote_sacrifice))
        .route("/games/{code}/sacrifice/speech", post(submit_speech))
        .route("/games/{code}/revival/vote", post(vote_revival))
        .route("/games/{code}/revival/advance", post(advance_revival))
}

/// Submit a survival strategy.
#[utoipa::path(
    post,
    path = "/games/{code}/strategy",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = StrategyRequest,
    responses(
        (status = 200, description = "Strategy recorded", body = ActionResponse),
        (status = 409, description = "Wrong phase or different strategy already submitted", body = crate::error::ErrorBody)
    )
)]
pub async fn submit_strategy(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<StrategyRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome =
        round_service::submit_strategy(&state, &code, &payload.player_id, payload.strategy.trim())
            .await?;
    Ok(Json(outcome.into()))
}

/// Propose a trap.
#[utoipa::path(
    post,
    path = "/games/{code}/trap",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = TrapRequest,
    responses((status = 200, description = "Trap recorded", body = ActionResponse))
)]
pub async fn submit_trap(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<TrapRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome =
        round_service::submit_trap(&state, &code, &payload.player_id, payload.trap.trim()).await?;
    Ok(Json(outcome.into()))
}

/// Vote for the deadliest trap.
#[utoipa::path(
    post,
    path = "/games/{code}/trap/vote",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = VoteRequest,
    responses((status = 200, description = "Vote recorded", body = ActionResponse))
)]
pub async fn vote_trap(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome =
        round_service::vote_trap(&state, &code, &payload.player_id, &payload.target_id).await?;
    Ok(Json(outcome.into()))
}

/// Vote for the best cooperative strategy.
#[utoipa::path(
    post,
    path = "/games/{code}/coop/vote",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = VoteRequest,
    responses((status = 200, description = "Vote recorded", body = ActionResponse))
)]
pub async fn vote_coop(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome =
        round_service::vote_coop(&state, &code, &payload.player_id, &payload.target_id).await?;
    Ok(Json(outcome.into()))
}

/// Volunteer as martyr.
#[utoipa::path(
    post,
    path = "/games/{code}/sacrifice/volunteer",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = PlayerRequest,
    responses((status = 200, description = "Volunteer recorded", body = ActionResponse))
)]
pub async fn volunteer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome = round_service::volunteer(&state, &code, &payload.player_id).await?;
    Ok(Json(outcome.into()))
}

/// Admin: close volunteering.
#[utoipa::path(
    post,
    path = "/games/{code}/sacrifice/advance",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Volunteering closed", body = ActionResponse),
        (status = 403, description = "Caller is not the admin", body = crate::error::ErrorBody)
    )
)]
pub async fn advance_volunteers(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome = round_service::advance_volunteers(&state, &code, &payload.player_id).await?;
    Ok(Json(outcome.into()))
}

/// Vote for the martyr.
#[utoipa::path(
    post,
    path = "/games/{code}/sacrifice/vote",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = VoteRequest,
    responses((status = 200, description = "Vote recorded", body = ActionResponse))
)]
pub async fn vote_sacrifice(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome =
        round_service::vote_sacrifice(&state, &code, &payload.player_id, &payload.target_id)
            .await?;
    Ok(Json(outcome.into()))
}

/// Deliver the martyr's final words.
#[utoipa::path(
    post,
    path = "/games/{code}/sacrifice/speech",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = SpeechRequest,
    responses(
        (status = 200, description = "Final words recorded", body = ActionResponse),
        (status = 403, description = "Caller is not the martyr", body = crate::error::ErrorBody)
    )
)]
pub async fn submit_speech(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SpeechRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome =
        round_service::submit_speech(&state, &code, &payload.player_id, payload.speech.trim())
            .await?;
    Ok(Json(outcome.into()))
}

/// Vote to revive a fallen player.
#[utoipa::path(
    post,
    path = "/games/{code}/revival/vote",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = VoteRequest,
    responses((status = 200, description = "Vote recorded", body = ActionResponse))
)]
pub async fn vote_revival(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome =
        round_service::vote_revival(&state, &code, &payload.player_id, &payload.target_id).await?;
    Ok(Json(outcome.into()))
}

/// Admin: close the revival vote.
#[utoipa::path(
    post,
    path = "/games/{code}/revival/advance",
    tag = "rounds",
    params(("code" = String, Path, description = "Session code")),
    request_body = PlayerRequest,
    responses((status = 200, description = "Revival vote closed", body = ActionResponse))
)]
pub async fn advance_revival(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let outcome = round_service::advance_revival(&state, &code, &payload.player_id).await?;
    Ok(Json(outcome.into()))
}
