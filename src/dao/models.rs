//! Persisted session schema.
//!
//! A session is stored as one flat JSON tree keyed by its join code. Round-type specific
//! collections all live on [`RoundEntity`] and are simply left empty when they do not apply; the
//! typed view lives in [`crate::state::session`].

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{TimestampSecondsWithFrac, serde_as};
use utoipa::ToSchema;

use crate::state::{
    round_machine::RoundPhase,
    session::{MediaStatus, RoundType, SessionStatus},
};

/// Whole-session record exchanged with the storage backends.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SessionEntity {
    /// Opaque session identifier.
    pub id: String,
    /// Short human-entry code, also the storage key.
    pub code: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Players keyed by id, in join order.
    pub players: IndexMap<String, PlayerEntity>,
    /// Rounds played so far.
    pub rounds: Vec<RoundEntity>,
    /// Index of the current round, `-1` while in the lobby.
    pub current_round_idx: i64,
    /// Number of rounds before the session finishes.
    pub max_rounds: usize,
    /// Round-type rotation.
    pub round_sequence: Vec<RoundType>,
    /// Pre-written scenarios keyed by round number.
    #[serde(default)]
    pub scenario_cache: IndexMap<String, String>,
    /// End-of-game media status.
    pub videos_status: MediaStatus,
    /// When the current media run started (epoch seconds).
    #[serde_as(as = "Option<TimestampSecondsWithFrac<f64>>")]
    #[schema(value_type = Option<f64>)]
    pub videos_started_at: Option<SystemTime>,
    /// Identifier of the media run allowed to write results.
    #[serde(default)]
    pub videos_run_id: Option<String>,
    /// Final video URL per player id.
    #[serde(default)]
    pub videos: IndexMap<String, String>,
    /// Highest scorer once finished.
    #[serde(default)]
    pub winner_id: Option<String>,
    /// Creation time (epoch seconds).
    #[serde_as(as = "TimestampSecondsWithFrac<f64>")]
    #[schema(value_type = f64)]
    pub created_at: SystemTime,
    /// Last write time (epoch seconds).
    #[serde_as(as = "TimestampSecondsWithFrac<f64>")]
    #[schema(value_type = f64)]
    pub updated_at: SystemTime,
}

/// Persisted player.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PlayerEntity {
    /// Player identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Cumulative score.
    pub score: i64,
    /// First joiner of the session.
    pub is_admin: bool,
    /// Alive in the current round.
    pub is_alive: bool,
    /// Entered the lobby and takes part in completeness checks.
    #[serde(default)]
    pub in_lobby: bool,
    /// Free-text look of the character.
    #[serde(default)]
    pub character_description: Option<String>,
    /// Generated or uploaded portrait.
    #[serde(default)]
    pub character_image_url: Option<String>,
    /// Strategy submitted this round.
    #[serde(default)]
    pub strategy: Option<String>,
    /// Death narrative for this round.
    #[serde(default)]
    pub death_reason: Option<String>,
    /// Survival narrative for this round.
    #[serde(default)]
    pub survival_reason: Option<String>,
    /// Outcome illustration for this round.
    #[serde(default)]
    pub result_image_url: Option<String>,
    /// A judgement for this player is in flight.
    #[serde(default)]
    pub judgement_pending: bool,
    /// Last heartbeat (epoch seconds).
    #[serde_as(as = "Option<TimestampSecondsWithFrac<f64>>")]
    #[schema(value_type = Option<f64>)]
    pub last_seen: Option<SystemTime>,
}

/// Persisted round with every type-specific collection flattened in.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RoundEntity {
    /// 1-based round number.
    pub number: u32,
    /// Round type.
    #[serde(rename = "type")]
    pub round_type: RoundType,
    /// Current phase.
    pub status: RoundPhase,
    /// Threat description.
    pub scenario_text: String,
    /// Threat illustration.
    #[serde(default)]
    pub scenario_image_url: Option<String>,
    /// Visual theme shared by every image of the round.
    #[serde(default)]
    pub style_theme: String,
    /// When the current phase was entered (epoch seconds).
    #[serde_as(as = "TimestampSecondsWithFrac<f64>")]
    #[schema(value_type = f64)]
    pub phase_started_at: SystemTime,
    /// Start of the running submission window (epoch seconds).
    #[serde_as(as = "Option<TimestampSecondsWithFrac<f64>>")]
    #[schema(value_type = Option<f64>)]
    pub submission_start_time: Option<SystemTime>,
    /// Start of the running voting window (epoch seconds).
    #[serde_as(as = "Option<TimestampSecondsWithFrac<f64>>")]
    #[schema(value_type = Option<f64>)]
    pub voting_start_time: Option<SystemTime>,
    /// Players who missed a deadline this round.
    #[serde(default)]
    pub timed_out_players: IndexMap<String, bool>,
    /// Incremented on every phase change.
    #[serde(default)]
    pub phase_version: u64,
    /// Token of the writer that performed the last phase change.
    #[serde(default)]
    pub transition_token: Option<String>,

    /// Blind architect: trap text per author.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub trap_proposals: IndexMap<String, String>,
    /// Blind architect: trap illustration per author.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub trap_images: IndexMap<String, String>,
    /// Blind architect: voter to trap author.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub votes: IndexMap<String, String>,
    /// Blind architect: author of the winning trap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architect_id: Option<String>,

    /// Cooperative: strategy illustration per author.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub strategy_images: IndexMap<String, String>,
    /// Cooperative: voter to strategy author.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub coop_votes: IndexMap<String, String>,
    /// Cooperative: rank reward per author.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub coop_points: IndexMap<String, i64>,
    /// Cooperative: author of the strategy judged for the team.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coop_winning_strategy_id: Option<String>,
    /// Cooperative: verdict of the team judgement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coop_team_survived: Option<bool>,

    /// Sacrifice: volunteers in order of volunteering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sacrifice_volunteers: Vec<String>,
    /// Sacrifice: voter to volunteer.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub sacrifice_votes: IndexMap<String, String>,
    /// Sacrifice: chosen martyr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub martyr_id: Option<String>,
    /// Sacrifice: martyr's final words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sacrifice_speech: Option<String>,
    /// Sacrifice: verdict on the final words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sacrifice_epic: Option<bool>,

    /// Last stand: survivor to casualty.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub revival_votes: IndexMap<String, String>,
    /// Last stand: casualty granted a second chance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revival_target_id: Option<String>,
    /// Last stand: casualty who survived the second chance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revived_player_id: Option<String>,

    /// Ranked: rank per player (1 is best).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub ranked_ranks: IndexMap<String, u32>,
    /// Ranked: points per player.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub ranked_points: IndexMap<String, i64>,
    /// Ranked: judge commentary per player.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub ranked_commentary: IndexMap<String, String>,
}
