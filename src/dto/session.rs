//! Client-facing projection of a session.

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::TimeoutConfig,
    dto::format_system_time,
    services::{round_service, timeouts},
    state::{
        round_machine::RoundPhase,
        session::{MediaStatus, Player, PlayerId, Round, RoundKind, RoundType, Session, SessionStatus},
    },
};

/// Full session state as polled by clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub code: String,
    pub status: SessionStatus,
    pub max_rounds: usize,
    pub round_sequence: Vec<RoundType>,
    /// Players in join order.
    pub players: Vec<PlayerView>,
    /// Round in play; absent while in the lobby.
    pub current_round: Option<RoundView>,
    /// Number of rounds opened so far.
    pub rounds_played: usize,
    pub winner_id: Option<PlayerId>,
    pub media: MediaView,
    /// Players the reading player may vote for right now.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vote_candidates: Vec<PlayerId>,
    pub updated_at: String,
}

/// One player as seen by everyone.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_admin: bool,
    pub score: i64,
    pub is_alive: bool,
    pub in_lobby: bool,
    pub character_description: Option<String>,
    pub character_image_url: Option<String>,
    pub has_submitted: bool,
    pub strategy: Option<String>,
    pub death_reason: Option<String>,
    pub survival_reason: Option<String>,
    pub result_image_url: Option<String>,
    pub judgement_pending: bool,
    pub last_seen: Option<String>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            is_admin: player.is_admin,
            score: player.score,
            is_alive: player.is_alive,
            in_lobby: player.in_lobby,
            character_description: player.character_description.clone(),
            character_image_url: player.character_image_url.clone(),
            has_submitted: player.strategy.is_some(),
            strategy: player.strategy.clone(),
            death_reason: player.death_reason.clone(),
            survival_reason: player.survival_reason.clone(),
            result_image_url: player.result_image_url.clone(),
            judgement_pending: player.judgement_pending,
            last_seen: player.last_seen.map(format_system_time),
        }
    }
}

/// Current round with the details of its type.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundView {
    pub number: u32,
    pub round_type: RoundType,
    pub phase: RoundPhase,
    pub scenario_text: String,
    pub scenario_image_url: Option<String>,
    pub style_theme: String,
    pub phase_started_at: String,
    /// When the current phase closes on its own, if it has a deadline.
    pub deadline: Option<String>,
    pub timed_out: Vec<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architect: Option<ArchitectView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooperative: Option<CoopView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sacrifice: Option<SacrificeView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_stand: Option<LastStandView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranked: Option<RankedView>,
}

/// Trap proposals are shown without their authors until the vote is over.
#[derive(Debug, Serialize, ToSchema)]
pub struct ArchitectView {
    pub proposals: Vec<TrapProposalView>,
    pub votes_cast: usize,
    pub architect_id: Option<PlayerId>,
}

/// One trap up for vote.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrapProposalView {
    /// Voting handle; equals the author id.
    pub id: PlayerId,
    pub text: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CoopView {
    pub strategy_images: IndexMap<PlayerId, String>,
    pub votes_cast: usize,
    pub points: IndexMap<PlayerId, i64>,
    pub winning_strategy_id: Option<PlayerId>,
    pub team_survived: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SacrificeView {
    pub volunteers: Vec<PlayerId>,
    pub votes_cast: usize,
    pub martyr_id: Option<PlayerId>,
    pub speech: Option<String>,
    pub epic: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LastStandView {
    pub votes_cast: usize,
    pub revival_target: Option<PlayerId>,
    pub revived_id: Option<PlayerId>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RankedView {
    pub ranks: IndexMap<PlayerId, u32>,
    pub points: IndexMap<PlayerId, i64>,
    pub commentary: IndexMap<PlayerId, String>,
}

/// End-of-game media state.
#[derive(Debug, Serialize, ToSchema)]
pub struct MediaView {
    pub status: MediaStatus,
    pub started_at: Option<String>,
    pub videos: IndexMap<PlayerId, String>,
}

impl SessionView {
    /// Project `session` for `reader` (when known).
    pub fn project(session: &Session, reader: Option<&str>, timeouts: &TimeoutConfig) -> Self {
        let vote_candidates = reader
            .filter(|id| session.players.get(*id).is_some_and(|p| p.in_lobby))
            .map(|id| round_service::vote_candidates(session, id))
            .unwrap_or_default();

        Self {
            code: session.code.clone(),
            status: session.status,
            max_rounds: session.max_rounds,
            round_sequence: session.round_sequence.clone(),
            players: session.players.values().map(PlayerView::from).collect(),
            current_round: session
                .current_round()
                .map(|round| RoundView::project(round, timeouts)),
            rounds_played: session.rounds.len(),
            winner_id: session.winner_id.clone(),
            media: MediaView {
                status: session.media.status,
                started_at: session.media.started_at.map(format_system_time),
                videos: session.media.videos.clone(),
            },
            vote_candidates,
            updated_at: format_system_time(session.updated_at),
        }
    }
}

impl RoundView {
    fn project(round: &Round, timeouts: &TimeoutConfig) -> Self {
        let mut view = Self {
            number: round.number,
            round_type: round.round_type(),
            phase: round.phase,
            scenario_text: round.scenario_text.clone(),
            scenario_image_url: round.scenario_image_url.clone(),
            style_theme: round.style_theme.clone(),
            phase_started_at: format_system_time(round.phase_started_at),
            deadline: timeouts::deadline(round, timeouts).map(format_system_time),
            timed_out: round.timed_out.iter().cloned().collect(),
            architect: None,
            cooperative: None,
            sacrifice: None,
            last_stand: None,
            ranked: None,
        };

        match &round.kind {
            RoundKind::Survival => {}
            RoundKind::BlindArchitect(architect) => {
                view.architect = Some(ArchitectView {
                    proposals: architect
                        .proposals
                        .iter()
                        .map(|(id, text)| TrapProposalView {
                            id: id.clone(),
                            text: text.clone(),
                            image_url: architect.proposal_images.get(id).cloned(),
                        })
                        .collect(),
                    votes_cast: architect.votes.len(),
                    architect_id: architect.architect_id.clone(),
                });
            }
            RoundKind::Cooperative(coop) => {
                view.cooperative = Some(CoopView {
                    strategy_images: coop.strategy_images.clone(),
                    votes_cast: coop.votes.len(),
                    points: coop.points.clone(),
                    winning_strategy_id: coop.winning_strategy_id.clone(),
                    team_survived: coop.team_survived,
                });
            }
            RoundKind::Sacrifice(sacrifice) => {
                view.sacrifice = Some(SacrificeView {
                    volunteers: sacrifice.volunteers.iter().cloned().collect(),
                    votes_cast: sacrifice.votes.len(),
                    martyr_id: sacrifice.martyr_id.clone(),
                    speech: sacrifice.speech.clone(),
                    epic: sacrifice.epic,
                });
            }
            RoundKind::LastStand(last_stand) => {
                view.last_stand = Some(LastStandView {
                    votes_cast: last_stand.revival_votes.len(),
                    revival_target: last_stand.revival_target.clone(),
                    revived_id: last_stand.revived_id.clone(),
                });
            }
            RoundKind::Ranked(ranked) => {
                view.ranked = Some(RankedView {
                    ranks: ranked.ranks.clone(),
                    points: ranked.points.clone(),
                    commentary: ranked.commentary.clone(),
                });
            }
        }
        view
    }
}

/// Phase durations clients use to render countdowns, in seconds.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimingConfigView {
    pub submission_seconds: u64,
    pub volunteer_seconds: u64,
    pub sacrifice_submission_seconds: u64,
    pub voting_seconds: u64,
}

impl From<&TimeoutConfig> for TimingConfigView {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            submission_seconds: timeouts.submission.as_secs(),
            volunteer_seconds: timeouts.volunteer.as_secs(),
            sacrifice_submission_seconds: timeouts.sacrifice_speech.as_secs(),
            voting_seconds: timeouts.voting.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state::round_machine::RoundEvent, test_support};

    #[test]
    fn projection_carries_the_round_deadline() {
        let session = test_support::playing(
            RoundType::Sacrifice,
            &["ada", "bob"],
            &[RoundEvent::ScenarioReady],
        );
        let timeouts = TimeoutConfig::default();
        let view = SessionView::project(&session, Some("ada"), &timeouts);

        let round = view.current_round.unwrap();
        assert_eq!(round.phase, RoundPhase::SacrificeVolunteer);
        assert_eq!(
            round.deadline,
            Some(format_system_time(test_support::start() + timeouts.volunteer))
        );
        assert!(round.sacrifice.is_some());
        assert!(round.architect.is_none());
        assert_eq!(view.players.len(), 2);
        assert!(view.vote_candidates.is_empty());
    }

    #[test]
    fn readers_see_who_they_can_vote_for() {
        let mut session = test_support::playing(
            RoundType::Sacrifice,
            &["ada", "bob", "cy"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::VolunteersClosed { volunteers: 2 },
            ],
        );
        let sacrifice = session.rounds[0].sacrifice_mut().unwrap();
        sacrifice.volunteers.insert("bob".into());
        sacrifice.volunteers.insert("cy".into());

        let view = SessionView::project(&session, Some("bob"), &TimeoutConfig::default());
        assert_eq!(view.vote_candidates, vec!["cy".to_string()]);
    }

    #[test]
    fn timing_config_is_in_seconds() {
        let view = TimingConfigView::from(&TimeoutConfig::default());
        assert_eq!(view.submission_seconds, 90);
        assert_eq!(view.voting_seconds, 45);
    }
}
