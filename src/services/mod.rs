/// Follow-up dispatch onto the background task registry.
pub mod dispatch;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Image generation jobs attached to rounds and players.
pub mod illustration;
/// Judgement pipeline: early, batch, team, sacrifice, ranked and revival verdicts.
pub mod judgement;
/// End-of-game video pipeline.
pub mod media;
/// Retry-verify wrapper around whole-record session writes.
pub mod optimistic;
/// Phase completeness rules.
pub mod progression;
/// Player and admin actions inside a round.
pub mod round_service;
/// Scenario prewarm and per-round scenario writing.
pub mod scenario_service;
/// Session lifecycle operations.
pub mod session_service;
/// Session store connection supervisor with degraded-mode handling.
pub mod storage_supervisor;
/// Phase deadlines and abandoned-work repair.
pub mod timeouts;
