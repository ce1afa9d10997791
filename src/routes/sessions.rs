use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        requests::{CreateSessionRequest, JoinRequest, PlayerRequest, RegenerateCharacterRequest, StateQuery},
        responses::{CreateSessionResponse, JoinResponse, MediaRetryResponse},
        session::{SessionView, TimingConfigView},
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Session lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_session))
        .route("/games/{code}", get(get_session))
        .route("/games/{code}/join", post(join_session))
        .route("/games/{code}/lobby", post(enter_lobby))
        .route("/games/{code}/start", post(start_game))
        .route("/games/{code}/next", post(next_round))
        .route("/games/{code}/videos/retry", post(retry_videos))
        .route("/games/{code}/character/regenerate", post(regenerate_character))
        .route("/config", get(timing_config))
}

/// Create an empty session in the lobby.
#[utoipa::path(
    post,
    path = "/games",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = CreateSessionResponse),
        (status = 400, description = "Invalid options", body = crate::error::ErrorBody)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate()?;
    let session = session_service::create(&state, payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { code: session.code }),
    ))
}

/// Read the session, enforcing phase deadlines on the way.
#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code"), StateQuery),
    responses(
        (status = 200, description = "Current session state", body = SessionView),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<StateQuery>,
) -> Result<Json<SessionView>, AppError> {
    let reader = query.player_id.as_deref();
    let session = session_service::get_state(&state, &code, reader).await?;
    Ok(Json(SessionView::project(
        &session,
        reader,
        &state.config().timeouts,
    )))
}

/// Join a session that has not started yet.
#[utoipa::path(
    post,
    path = "/games/{code}/join",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code")),
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Joined", body = JoinResponse),
        (status = 409, description = "Game already started or full", body = crate::error::ErrorBody)
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinRequest>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    payload.validate()?;
    let player = session_service::join(
        &state,
        &code,
        payload.name.trim(),
        payload.character_description.as_deref().map(str::trim),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(JoinResponse::new(&code, &player))))
}

/// Enter the lobby and start counting as an active player.
#[utoipa::path(
    post,
    path = "/games/{code}/lobby",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code")),
    request_body = PlayerRequest,
    responses((status = 204, description = "Player is in the lobby"))
)]
pub async fn enter_lobby(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    session_service::enter_lobby(&state, &code, &payload.player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admin: start the game.
#[utoipa::path(
    post,
    path = "/games/{code}/start",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Round 1 opened", body = SessionView),
        (status = 403, description = "Caller is not the admin", body = crate::error::ErrorBody)
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<SessionView>, AppError> {
    payload.validate()?;
    let session = session_service::start(&state, &code, &payload.player_id).await?;
    Ok(Json(SessionView::project(
        &session,
        Some(&payload.player_id),
        &state.config().timeouts,
    )))
}

/// Admin: open the next round or finish the game.
#[utoipa::path(
    post,
    path = "/games/{code}/next",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Next round opened or game finished", body = SessionView),
        (status = 409, description = "Current round not over", body = crate::error::ErrorBody)
    )
)]
pub async fn next_round(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<SessionView>, AppError> {
    payload.validate()?;
    let session = session_service::next_round(&state, &code, &payload.player_id).await?;
    Ok(Json(SessionView::project(
        &session,
        Some(&payload.player_id),
        &state.config().timeouts,
    )))
}

/// Restart a failed or stalled end-of-game media run.
#[utoipa::path(
    post,
    path = "/games/{code}/videos/retry",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 202, description = "Media run restarted", body = MediaRetryResponse),
        (status = 409, description = "Media is not stuck or failed", body = crate::error::ErrorBody)
    )
)]
pub async fn retry_videos(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<(StatusCode, Json<MediaRetryResponse>), AppError> {
    let run_id = session_service::retry_media(&state, &code).await?;
    Ok((StatusCode::ACCEPTED, Json(MediaRetryResponse { run_id })))
}

/// Re-request a player's portrait.
#[utoipa::path(
    post,
    path = "/games/{code}/character/regenerate",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code")),
    request_body = RegenerateCharacterRequest,
    responses((status = 202, description = "Portrait requested"))
)]
pub async fn regenerate_character(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<RegenerateCharacterRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    session_service::regenerate_character(
        &state,
        &code,
        &payload.player_id,
        payload.character_description.as_deref().map(str::trim),
    )
    .await?;
    Ok(StatusCode::ACCEPTED)
}

/// Phase durations for client countdowns.
#[utoipa::path(
    get,
    path = "/config",
    tag = "sessions",
    responses((status = 200, description = "Phase durations", body = TimingConfigView))
)]
pub async fn timing_config(State(state): State<SharedState>) -> Json<TimingConfigView> {
    Json(TimingConfigView::from(&state.config().timeouts))
}
