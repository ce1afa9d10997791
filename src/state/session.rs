//! Typed session model.
//!
//! The persisted record ([`SessionEntity`]) is a flat tree where every round carries every
//! type-specific collection. Here each round type gets its own variant of [`RoundKind`] carrying
//! only the fields it uses; conversion happens at the store boundary.

use std::time::SystemTime;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, RoundEntity, SessionEntity},
    state::round_machine::{self, InvalidTransition, RoundEvent, RoundPhase},
};

/// Player identifiers are opaque strings (UUIDv4 rendered as text).
pub type PlayerId = String;

/// Kind of challenge a round presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    /// Everyone submits a strategy, each judged on its own.
    Survival,
    /// Players design the trap, then survive the winning one.
    BlindArchitect,
    /// Players rank each other's strategies; the best one decides for the team.
    Cooperative,
    /// One martyr's final words decide everybody's fate.
    Sacrifice,
    /// Harsh boss round with a revival vote.
    LastStand,
    /// Strategies are ranked against each other; only the best survives.
    Ranked,
}

impl RoundType {
    /// Whether strategies are judged the moment they are submitted.
    pub fn judges_early(self) -> bool {
        matches!(
            self,
            RoundType::Survival | RoundType::BlindArchitect | RoundType::LastStand
        )
    }

    /// Whether the round needs a generated scenario before players can act.
    pub fn needs_scenario(self) -> bool {
        self != RoundType::BlindArchitect
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Players are joining.
    Lobby,
    /// Rounds are being played.
    Playing,
    /// All rounds played; media may still be generating.
    Finished,
}

/// Status of the end-of-game media pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    /// Not started yet.
    Pending,
    /// A run is in progress.
    Generating,
    /// Every expected video is available.
    Ready,
    /// Some videos are available.
    Partial,
    /// No video could be produced.
    Failed,
}

/// One running game.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Opaque identifier.
    pub id: String,
    /// Human-entry code.
    pub code: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Players in join order.
    pub players: IndexMap<PlayerId, Player>,
    /// Rounds in play order.
    pub rounds: Vec<Round>,
    /// Current round, `None` while in the lobby.
    pub current_round_idx: Option<usize>,
    /// Rounds to play before finishing.
    pub max_rounds: usize,
    /// Round-type rotation.
    pub round_sequence: Vec<RoundType>,
    /// Scenarios written ahead of time, keyed by round number.
    pub scenario_cache: IndexMap<u32, String>,
    /// End-of-game media.
    pub media: MediaState,
    /// Highest scorer once finished.
    pub winner_id: Option<PlayerId>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last write time.
    pub updated_at: SystemTime,
}

/// End-of-game media bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaState {
    /// Pipeline status.
    pub status: MediaStatus,
    /// Start of the current run, used for stuck detection.
    pub started_at: Option<SystemTime>,
    /// Run allowed to write results; a retry replaces it.
    pub run_id: Option<Uuid>,
    /// Final video per player.
    pub videos: IndexMap<PlayerId, String>,
}

impl Session {
    /// Create an empty session in the lobby.
    pub fn new(
        code: String,
        max_rounds: usize,
        round_sequence: Vec<RoundType>,
        now: SystemTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code,
            status: SessionStatus::Lobby,
            players: IndexMap::new(),
            rounds: Vec::new(),
            current_round_idx: None,
            max_rounds,
            round_sequence,
            scenario_cache: IndexMap::new(),
            media: MediaState {
                status: MediaStatus::Pending,
                started_at: None,
                run_id: None,
                videos: IndexMap::new(),
            },
            winner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Round currently in play.
    pub fn current_round(&self) -> Option<&Round> {
        self.current_round_idx.and_then(|idx| self.rounds.get(idx))
    }

    /// Mutable access to the round currently in play.
    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.current_round_idx.and_then(|idx| self.rounds.get_mut(idx))
    }

    /// Type of the round with the given 1-based number, cycling through the rotation.
    pub fn round_type_for(&self, number: u32) -> RoundType {
        if self.round_sequence.is_empty() {
            return RoundType::Survival;
        }
        let idx = (number.saturating_sub(1) as usize) % self.round_sequence.len();
        self.round_sequence[idx]
    }

    /// Players who entered the lobby, in join order.
    pub fn participants(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|player| player.in_lobby)
    }

    /// Ids of lobby players still alive this round.
    pub fn active_ids(&self) -> Vec<PlayerId> {
        self.participants()
            .filter(|player| player.is_alive)
            .map(|player| player.id.clone())
            .collect()
    }

    /// Whether the given player is the session admin.
    pub fn is_admin(&self, player_id: &str) -> bool {
        self.players
            .get(player_id)
            .is_some_and(|player| player.is_admin)
    }

    /// Lobby player with the highest score; ties go to the earliest joiner.
    pub fn leader(&self) -> Option<&Player> {
        self.participants().fold(None, |best: Option<&Player>, player| match best {
            Some(current) if current.score >= player.score => Some(current),
            _ => Some(player),
        })
    }
}

/// One participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// First joiner of the session.
    pub is_admin: bool,
    /// Cumulative score.
    pub score: i64,
    /// Alive this round.
    pub is_alive: bool,
    /// Entered the lobby.
    pub in_lobby: bool,
    /// Free-text look.
    pub character_description: Option<String>,
    /// Portrait.
    pub character_image_url: Option<String>,
    /// Strategy submitted this round.
    pub strategy: Option<String>,
    /// Death narrative this round.
    pub death_reason: Option<String>,
    /// Survival narrative this round.
    pub survival_reason: Option<String>,
    /// Outcome illustration this round.
    pub result_image_url: Option<String>,
    /// A judgement for this player is in flight.
    pub judgement_pending: bool,
    /// Last heartbeat.
    pub last_seen: Option<SystemTime>,
}

impl Player {
    /// Create a freshly joined player (not yet in the lobby).
    pub fn new(
        id: PlayerId,
        name: String,
        is_admin: bool,
        character_description: Option<String>,
        character_image_url: Option<String>,
        now: SystemTime,
    ) -> Self {
        Self {
            id,
            name,
            is_admin,
            score: 0,
            is_alive: true,
            in_lobby: false,
            character_description,
            character_image_url,
            strategy: None,
            death_reason: None,
            survival_reason: None,
            result_image_url: None,
            judgement_pending: false,
            last_seen: Some(now),
        }
    }

    /// Holds a terminal outcome for the current round.
    pub fn has_outcome(&self) -> bool {
        self.death_reason.is_some() || self.survival_reason.is_some()
    }

    /// In the lobby and alive.
    pub fn is_active(&self) -> bool {
        self.in_lobby && self.is_alive
    }

    /// Reset every per-round field at the start of a new round.
    pub fn resurrect(&mut self) {
        self.is_alive = true;
        self.strategy = None;
        self.death_reason = None;
        self.survival_reason = None;
        self.result_image_url = None;
        self.judgement_pending = false;
    }

    /// Record a survival outcome and award points.
    pub fn survive(&mut self, reason: String, points: i64) {
        self.is_alive = true;
        self.death_reason = None;
        self.survival_reason = Some(reason);
        self.score += points;
        self.judgement_pending = false;
    }

    /// Record a death outcome.
    pub fn die(&mut self, reason: String) {
        self.is_alive = false;
        self.survival_reason = None;
        self.death_reason = Some(reason);
        self.judgement_pending = false;
    }
}

/// One round of play.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    /// 1-based number.
    pub number: u32,
    /// Current phase.
    pub phase: RoundPhase,
    /// Threat description.
    pub scenario_text: String,
    /// Threat illustration.
    pub scenario_image_url: Option<String>,
    /// Visual theme for every image of the round.
    pub style_theme: String,
    /// When the current phase was entered.
    pub phase_started_at: SystemTime,
    /// Start of the running submission window.
    pub submission_started_at: Option<SystemTime>,
    /// Start of the running voting window.
    pub voting_started_at: Option<SystemTime>,
    /// Players who missed a deadline this round.
    pub timed_out: IndexSet<PlayerId>,
    /// Incremented on every phase change.
    pub phase_version: u64,
    /// Token of the writer that performed the last phase change.
    pub transition_token: Option<Uuid>,
    /// Type-specific state.
    pub kind: RoundKind,
}

/// Type-specific round state.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundKind {
    /// Plain survival round.
    Survival,
    /// Blind architect round.
    BlindArchitect(ArchitectRound),
    /// Cooperative round.
    Cooperative(CoopRound),
    /// Sacrifice round.
    Sacrifice(SacrificeRound),
    /// Last-stand boss round.
    LastStand(LastStandRound),
    /// Ranked elimination round.
    Ranked(RankedRound),
}

/// Blind architect state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchitectRound {
    /// Trap text per author.
    pub proposals: IndexMap<PlayerId, String>,
    /// Trap illustration per author.
    pub proposal_images: IndexMap<PlayerId, String>,
    /// Voter to trap author.
    pub votes: IndexMap<PlayerId, PlayerId>,
    /// Author of the winning trap.
    pub architect_id: Option<PlayerId>,
}

/// Cooperative state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoopRound {
    /// Strategy illustration per author.
    pub strategy_images: IndexMap<PlayerId, String>,
    /// Voter to strategy author.
    pub votes: IndexMap<PlayerId, PlayerId>,
    /// Rank reward per author.
    pub points: IndexMap<PlayerId, i64>,
    /// Author of the strategy judged for the team.
    pub winning_strategy_id: Option<PlayerId>,
    /// Verdict of the team judgement.
    pub team_survived: Option<bool>,
}

/// Sacrifice state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SacrificeRound {
    /// Volunteers in order.
    pub volunteers: IndexSet<PlayerId>,
    /// Voter to volunteer.
    pub votes: IndexMap<PlayerId, PlayerId>,
    /// Chosen martyr.
    pub martyr_id: Option<PlayerId>,
    /// Martyr's final words.
    pub speech: Option<String>,
    /// Verdict on the final words.
    pub epic: Option<bool>,
}

/// Last-stand state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastStandRound {
    /// Survivor to casualty.
    pub revival_votes: IndexMap<PlayerId, PlayerId>,
    /// Casualty granted a second chance.
    pub revival_target: Option<PlayerId>,
    /// Casualty who survived the second chance.
    pub revived_id: Option<PlayerId>,
}

/// Ranked state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedRound {
    /// Rank per player (1 is best).
    pub ranks: IndexMap<PlayerId, u32>,
    /// Points per player.
    pub points: IndexMap<PlayerId, i64>,
    /// Commentary per player.
    pub commentary: IndexMap<PlayerId, String>,
}

impl RoundKind {
    fn empty(round_type: RoundType) -> Self {
        match round_type {
            RoundType::Survival => RoundKind::Survival,
            RoundType::BlindArchitect => RoundKind::BlindArchitect(ArchitectRound::default()),
            RoundType::Cooperative => RoundKind::Cooperative(CoopRound::default()),
            RoundType::Sacrifice => RoundKind::Sacrifice(SacrificeRound::default()),
            RoundType::LastStand => RoundKind::LastStand(LastStandRound::default()),
            RoundType::Ranked => RoundKind::Ranked(RankedRound::default()),
        }
    }

    /// Type tag of this variant.
    pub fn round_type(&self) -> RoundType {
        match self {
            RoundKind::Survival => RoundType::Survival,
            RoundKind::BlindArchitect(_) => RoundType::BlindArchitect,
            RoundKind::Cooperative(_) => RoundType::Cooperative,
            RoundKind::Sacrifice(_) => RoundType::Sacrifice,
            RoundKind::LastStand(_) => RoundType::LastStand,
            RoundKind::Ranked(_) => RoundType::Ranked,
        }
    }
}

impl Round {
    /// Create round `number` in its initial phase.
    pub fn new(number: u32, round_type: RoundType, style_theme: String, now: SystemTime) -> Self {
        let phase = round_machine::initial_phase(round_type);
        Self {
            number,
            phase,
            scenario_text: String::new(),
            scenario_image_url: None,
            style_theme,
            phase_started_at: now,
            submission_started_at: phase.is_submission().then_some(now),
            voting_started_at: phase.is_voting().then_some(now),
            timed_out: IndexSet::new(),
            phase_version: 0,
            transition_token: None,
            kind: RoundKind::empty(round_type),
        }
    }

    /// Type of this round.
    pub fn round_type(&self) -> RoundType {
        self.kind.round_type()
    }

    /// Apply `event`, stamping the new phase with `token` so the writer can later recognise
    /// its own transition.
    pub fn apply(
        &mut self,
        event: RoundEvent,
        now: SystemTime,
        token: Uuid,
    ) -> Result<RoundPhase, InvalidTransition> {
        let next = round_machine::next_phase(self.round_type(), self.phase, event)?;
        self.phase = next;
        self.phase_version += 1;
        self.phase_started_at = now;
        self.submission_started_at = next.is_submission().then_some(now);
        self.voting_started_at = next.is_voting().then_some(now);
        self.transition_token = Some(token);
        Ok(next)
    }

    /// Blind architect state, if this is such a round.
    pub fn architect(&self) -> Option<&ArchitectRound> {
        match &self.kind {
            RoundKind::BlindArchitect(state) => Some(state),
            _ => None,
        }
    }

    /// Cooperative state, if this is such a round.
    pub fn coop(&self) -> Option<&CoopRound> {
        match &self.kind {
            RoundKind::Cooperative(state) => Some(state),
            _ => None,
        }
    }

    /// Sacrifice state, if this is such a round.
    pub fn sacrifice(&self) -> Option<&SacrificeRound> {
        match &self.kind {
            RoundKind::Sacrifice(state) => Some(state),
            _ => None,
        }
    }

    /// Last-stand state, if this is such a round.
    pub fn last_stand(&self) -> Option<&LastStandRound> {
        match &self.kind {
            RoundKind::LastStand(state) => Some(state),
            _ => None,
        }
    }

    /// Ranked state, if this is such a round.
    pub fn ranked(&self) -> Option<&RankedRound> {
        match &self.kind {
            RoundKind::Ranked(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable blind architect state, if this is such a round.
    pub fn architect_mut(&mut self) -> Option<&mut ArchitectRound> {
        match &mut self.kind {
            RoundKind::BlindArchitect(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable cooperative state, if this is such a round.
    pub fn coop_mut(&mut self) -> Option<&mut CoopRound> {
        match &mut self.kind {
            RoundKind::Cooperative(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable sacrifice state, if this is such a round.
    pub fn sacrifice_mut(&mut self) -> Option<&mut SacrificeRound> {
        match &mut self.kind {
            RoundKind::Sacrifice(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable last-stand state, if this is such a round.
    pub fn last_stand_mut(&mut self) -> Option<&mut LastStandRound> {
        match &mut self.kind {
            RoundKind::LastStand(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable ranked state, if this is such a round.
    pub fn ranked_mut(&mut self) -> Option<&mut RankedRound> {
        match &mut self.kind {
            RoundKind::Ranked(state) => Some(state),
            _ => None,
        }
    }
}

fn parse_uuid(raw: Option<String>) -> Option<Uuid> {
    raw.and_then(|value| Uuid::parse_str(&value).ok())
}

impl From<PlayerEntity> for Player {
    fn from(entity: PlayerEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            is_admin: entity.is_admin,
            score: entity.score,
            is_alive: entity.is_alive,
            in_lobby: entity.in_lobby,
            character_description: entity.character_description,
            character_image_url: entity.character_image_url,
            strategy: entity.strategy,
            death_reason: entity.death_reason,
            survival_reason: entity.survival_reason,
            result_image_url: entity.result_image_url,
            judgement_pending: entity.judgement_pending,
            last_seen: entity.last_seen,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            name: player.name,
            score: player.score,
            is_admin: player.is_admin,
            is_alive: player.is_alive,
            in_lobby: player.in_lobby,
            character_description: player.character_description,
            character_image_url: player.character_image_url,
            strategy: player.strategy,
            death_reason: player.death_reason,
            survival_reason: player.survival_reason,
            result_image_url: player.result_image_url,
            judgement_pending: player.judgement_pending,
            last_seen: player.last_seen,
        }
    }
}

impl From<RoundEntity> for Round {
    fn from(entity: RoundEntity) -> Self {
        let kind = match entity.round_type {
            RoundType::Survival => RoundKind::Survival,
            RoundType::BlindArchitect => RoundKind::BlindArchitect(ArchitectRound {
                proposals: entity.trap_proposals,
                proposal_images: entity.trap_images,
                votes: entity.votes,
                architect_id: entity.architect_id,
            }),
            RoundType::Cooperative => RoundKind::Cooperative(CoopRound {
                strategy_images: entity.strategy_images,
                votes: entity.coop_votes,
                points: entity.coop_points,
                winning_strategy_id: entity.coop_winning_strategy_id,
                team_survived: entity.coop_team_survived,
            }),
            RoundType::Sacrifice => RoundKind::Sacrifice(SacrificeRound {
                volunteers: entity.sacrifice_volunteers.into_iter().collect(),
                votes: entity.sacrifice_votes,
                martyr_id: entity.martyr_id,
                speech: entity.sacrifice_speech,
                epic: entity.sacrifice_epic,
            }),
            RoundType::LastStand => RoundKind::LastStand(LastStandRound {
                revival_votes: entity.revival_votes,
                revival_target: entity.revival_target_id,
                revived_id: entity.revived_player_id,
            }),
            RoundType::Ranked => RoundKind::Ranked(RankedRound {
                ranks: entity.ranked_ranks,
                points: entity.ranked_points,
                commentary: entity.ranked_commentary,
            }),
        };

        Self {
            number: entity.number,
            phase: entity.status,
            scenario_text: entity.scenario_text,
            scenario_image_url: entity.scenario_image_url,
            style_theme: entity.style_theme,
            phase_started_at: entity.phase_started_at,
            submission_started_at: entity.submission_start_time,
            voting_started_at: entity.voting_start_time,
            timed_out: entity
                .timed_out_players
                .into_iter()
                .filter_map(|(id, flagged)| flagged.then_some(id))
                .collect(),
            phase_version: entity.phase_version,
            transition_token: parse_uuid(entity.transition_token),
            kind,
        }
    }
}

impl From<Round> for RoundEntity {
    fn from(round: Round) -> Self {
        let mut entity = RoundEntity {
            number: round.number,
            round_type: round.kind.round_type(),
            status: round.phase,
            scenario_text: round.scenario_text,
            scenario_image_url: round.scenario_image_url,
            style_theme: round.style_theme,
            phase_started_at: round.phase_started_at,
            submission_start_time: round.submission_started_at,
            voting_start_time: round.voting_started_at,
            timed_out_players: round.timed_out.into_iter().map(|id| (id, true)).collect(),
            phase_version: round.phase_version,
            transition_token: round.transition_token.map(|token| token.to_string()),
            trap_proposals: IndexMap::new(),
            trap_images: IndexMap::new(),
            votes: IndexMap::new(),
            architect_id: None,
            strategy_images: IndexMap::new(),
            coop_votes: IndexMap::new(),
            coop_points: IndexMap::new(),
            coop_winning_strategy_id: None,
            coop_team_survived: None,
            sacrifice_volunteers: Vec::new(),
            sacrifice_votes: IndexMap::new(),
            martyr_id: None,
            sacrifice_speech: None,
            sacrifice_epic: None,
            revival_votes: IndexMap::new(),
            revival_target_id: None,
            revived_player_id: None,
            ranked_ranks: IndexMap::new(),
            ranked_points: IndexMap::new(),
            ranked_commentary: IndexMap::new(),
        };

        match round.kind {
            RoundKind::Survival => {}
            RoundKind::BlindArchitect(state) => {
                entity.trap_proposals = state.proposals;
                entity.trap_images = state.proposal_images;
                entity.votes = state.votes;
                entity.architect_id = state.architect_id;
            }
            RoundKind::Cooperative(state) => {
                entity.strategy_images = state.strategy_images;
                entity.coop_votes = state.votes;
                entity.coop_points = state.points;
                entity.coop_winning_strategy_id = state.winning_strategy_id;
                entity.coop_team_survived = state.team_survived;
            }
            RoundKind::Sacrifice(state) => {
                entity.sacrifice_volunteers = state.volunteers.into_iter().collect();
                entity.sacrifice_votes = state.votes;
                entity.martyr_id = state.martyr_id;
                entity.sacrifice_speech = state.speech;
                entity.sacrifice_epic = state.epic;
            }
            RoundKind::LastStand(state) => {
                entity.revival_votes = state.revival_votes;
                entity.revival_target_id = state.revival_target;
                entity.revived_player_id = state.revived_id;
            }
            RoundKind::Ranked(state) => {
                entity.ranked_ranks = state.ranks;
                entity.ranked_points = state.points;
                entity.ranked_commentary = state.commentary;
            }
        }

        entity
    }
}

impl From<SessionEntity> for Session {
    fn from(entity: SessionEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            status: entity.status,
            players: entity
                .players
                .into_iter()
                .map(|(id, player)| (id, player.into()))
                .collect(),
            rounds: entity.rounds.into_iter().map(Into::into).collect(),
            current_round_idx: usize::try_from(entity.current_round_idx).ok(),
            max_rounds: entity.max_rounds,
            round_sequence: entity.round_sequence,
            scenario_cache: entity
                .scenario_cache
                .into_iter()
                .filter_map(|(key, text)| key.parse::<u32>().ok().map(|number| (number, text)))
                .collect(),
            media: MediaState {
                status: entity.videos_status,
                started_at: entity.videos_started_at,
                run_id: parse_uuid(entity.videos_run_id),
                videos: entity.videos,
            },
            winner_id: entity.winner_id,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

impl From<Session> for SessionEntity {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            code: session.code,
            status: session.status,
            players: session
                .players
                .into_iter()
                .map(|(id, player)| (id, player.into()))
                .collect(),
            rounds: session.rounds.into_iter().map(Into::into).collect(),
            current_round_idx: session
                .current_round_idx
                .and_then(|idx| i64::try_from(idx).ok())
                .unwrap_or(-1),
            max_rounds: session.max_rounds,
            round_sequence: session.round_sequence,
            scenario_cache: session
                .scenario_cache
                .into_iter()
                .map(|(number, text)| (number.to_string(), text))
                .collect(),
            videos_status: session.media.status,
            videos_started_at: session.media.started_at,
            videos_run_id: session.media.run_id.map(|id| id.to_string()),
            videos: session.media.videos,
            winner_id: session.winner_id,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}
