use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for SurvAIve Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::enter_lobby,
        crate::routes::sessions::start_game,
        crate::routes::sessions::next_round,
        crate::routes::sessions::retry_videos,
        crate::routes::sessions::regenerate_character,
        crate::routes::sessions::timing_config,
        crate::routes::rounds::submit_strategy,
        crate::routes::rounds::submit_trap,
        crate::routes::rounds::vote_trap,
        crate::routes::rounds::vote_coop,
        crate::routes::rounds::volunteer,
        crate::routes::rounds::advance_volunteers,
        crate::routes::rounds::vote_sacrifice,
        crate::routes::rounds::submit_speech,
        crate::routes::rounds::vote_revival,
        crate::routes::rounds::advance_revival,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::requests::CreateSessionRequest,
            crate::dto::requests::JoinRequest,
            crate::dto::requests::PlayerRequest,
            crate::dto::requests::StrategyRequest,
            crate::dto::requests::TrapRequest,
            crate::dto::requests::VoteRequest,
            crate::dto::requests::SpeechRequest,
            crate::dto::requests::RegenerateCharacterRequest,
            crate::dto::responses::CreateSessionResponse,
            crate::dto::responses::JoinResponse,
            crate::dto::responses::ActionResponse,
            crate::dto::responses::MediaRetryResponse,
            crate::dto::session::SessionView,
            crate::dto::session::TimingConfigView,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle"),
        (name = "rounds", description = "Player and admin actions inside a round"),
    )
)]
pub struct ApiDoc;
