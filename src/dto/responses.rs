//! Response payloads of the session and round endpoints.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    services::round_service::{ActionOutcome, ActionStatus},
    state::{
        round_machine::RoundPhase,
        session::{Player, PlayerId},
    },
};

/// Code of a freshly created session.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub code: String,
}

/// Identity handed to a player who joined.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub code: String,
    pub player_id: PlayerId,
    pub is_admin: bool,
}

impl JoinResponse {
    pub fn new(code: &str, player: &Player) -> Self {
        Self {
            code: code.to_string(),
            player_id: player.id.clone(),
            is_admin: player.is_admin,
        }
    }
}

/// Whether a round action changed anything.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatusDto {
    Applied,
    AlreadyApplied,
}

/// Acknowledgement of a round action.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub status: ActionStatusDto,
    pub round: u32,
    /// Phase right after the action.
    pub phase: RoundPhase,
}

impl From<ActionOutcome> for ActionResponse {
    fn from(outcome: ActionOutcome) -> Self {
        Self {
            status: match outcome.status {
                ActionStatus::Applied => ActionStatusDto::Applied,
                ActionStatus::AlreadyApplied => ActionStatusDto::AlreadyApplied,
            },
            round: outcome.round,
            phase: outcome.phase,
        }
    }
}

/// Media run started by a retry.
#[derive(Debug, Serialize, ToSchema)]
pub struct MediaRetryResponse {
    pub run_id: Uuid,
}
