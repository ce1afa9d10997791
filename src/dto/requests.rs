//! Request payloads accepted by the session and round endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::validation::{validate_not_blank, validate_player_id},
    services::session_service::{CreateOptions, MAX_ROUNDS_LIMIT},
    state::session::RoundType,
};

/// Options for a new session; both fields fall back to the server configuration.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Rounds to play (1 to 10).
    #[serde(default)]
    #[validate(range(min = 1, max = MAX_ROUNDS_LIMIT))]
    pub max_rounds: Option<usize>,
    /// Round types cycled through in order.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub round_sequence: Option<Vec<RoundType>>,
}

impl From<CreateSessionRequest> for CreateOptions {
    fn from(request: CreateSessionRequest) -> Self {
        Self {
            max_rounds: request.max_rounds,
            round_sequence: request.round_sequence,
        }
    }
}

/// Join a session in the lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Display name.
    #[validate(length(min = 1, max = 40), custom(function = "validate_not_blank"))]
    pub name: String,
    /// Free-text look used for the character portrait.
    #[serde(default)]
    #[validate(length(min = 1, max = 300), custom(function = "validate_not_blank"))]
    pub character_description: Option<String>,
}

/// Identifies the acting player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerRequest {
    /// Acting player.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
}

/// Submit a survival strategy.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StrategyRequest {
    /// Submitting player.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// What the player does to survive.
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub strategy: String,
}

/// Propose a trap in a blind architect round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TrapRequest {
    /// Proposing player.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// Trap description.
    #[validate(length(min = 1, max = 300), custom(function = "validate_not_blank"))]
    pub trap: String,
}

/// A vote for another player (trap author, strategy author, volunteer or casualty).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VoteRequest {
    /// Voting player.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// Player voted for.
    #[validate(custom(function = "validate_player_id"))]
    pub target_id: String,
}

/// The martyr's final words.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SpeechRequest {
    /// Martyr.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// Final words.
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub speech: String,
}

/// Re-request a portrait, optionally with a new description.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegenerateCharacterRequest {
    /// Portrayed player.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// Replacement description.
    #[serde(default)]
    #[validate(length(min = 1, max = 300), custom(function = "validate_not_blank"))]
    pub character_description: Option<String>,
}

/// Query string of the state endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StateQuery {
    /// Reading player; refreshes their heartbeat when present.
    pub player_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_limits() {
        let ok = StrategyRequest {
            player_id: "p1".into(),
            strategy: "x".repeat(500),
        };
        assert!(ok.validate().is_ok());

        let long = StrategyRequest {
            player_id: "p1".into(),
            strategy: "x".repeat(501),
        };
        assert!(long.validate().is_err());

        let blank = StrategyRequest {
            player_id: "p1".into(),
            strategy: "   ".into(),
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn join_limits() {
        let request: JoinRequest =
            serde_json::from_str(r#"{ "name": "Ada", "character_description": "red scarf" }"#)
                .unwrap();
        assert!(request.validate().is_ok());

        let request = JoinRequest {
            name: "n".repeat(41),
            character_description: None,
        };
        assert!(request.validate().is_err());

        let request = JoinRequest {
            name: "Ada".into(),
            character_description: Some("d".repeat(301)),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_options_are_bounded() {
        let request: CreateSessionRequest = serde_json::from_str(r#"{ "max_rounds": 11 }"#).unwrap();
        assert!(request.validate().is_err());

        let request: CreateSessionRequest =
            serde_json::from_str(r#"{ "max_rounds": 3, "round_sequence": ["sacrifice", "ranked"] }"#)
                .unwrap();
        assert!(request.validate().is_ok());
        let options = CreateOptions::from(request);
        assert_eq!(
            options.round_sequence,
            Some(vec![RoundType::Sacrifice, RoundType::Ranked])
        );

        let empty: CreateSessionRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.validate().is_ok());
    }
}
