//! Per-round-type phase graph.
//!
//! Every round starts in [`RoundPhase::Scenario`] (or [`RoundPhase::TrapCreation`] for blind
//! architect rounds) and converges on [`RoundPhase::Results`]. The graph only answers "what is the
//! next phase"; deciding *when* an event fires is the job of the progression rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::session::RoundType;

/// Sub-state of a round, persisted verbatim as the round `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Waiting for the scenario text to be written.
    Scenario,
    /// Players submit survival strategies.
    Strategy,
    /// Individual strategies are being judged.
    Judgement,
    /// Round is over; waiting for the admin to advance.
    Results,
    /// Blind architect: players propose traps.
    TrapCreation,
    /// Blind architect: players vote for the deadliest trap.
    TrapVoting,
    /// Cooperative: players rank each other's strategies.
    CoopVoting,
    /// Cooperative: the winning strategy is judged for the whole team.
    CoopJudgement,
    /// Sacrifice: players may volunteer as martyr.
    SacrificeVolunteer,
    /// Sacrifice: players pick the martyr among several volunteers.
    SacrificeVoting,
    /// Sacrifice: the martyr writes their final words.
    SacrificeSubmission,
    /// Sacrifice: the final words are judged epic or lame.
    SacrificeJudgement,
    /// Last stand: survivors vote to grant one casualty a second chance.
    LastStandRevival,
    /// Last stand: the chosen casualty is re-judged.
    RevivalJudgement,
    /// Ranked: all strategies are judged comparatively.
    RankedJudgement,
}

impl RoundPhase {
    /// Phases whose deadline is measured from the submission timestamp.
    pub fn is_submission(self) -> bool {
        matches!(
            self,
            RoundPhase::Strategy
                | RoundPhase::TrapCreation
                | RoundPhase::SacrificeVolunteer
                | RoundPhase::SacrificeSubmission
        )
    }

    /// Phases whose deadline is measured from the voting timestamp.
    pub fn is_voting(self) -> bool {
        matches!(
            self,
            RoundPhase::TrapVoting
                | RoundPhase::CoopVoting
                | RoundPhase::SacrificeVoting
                | RoundPhase::LastStandRevival
        )
    }

    /// Phases completed by a background judgement task rather than by player input.
    pub fn is_judging(self) -> bool {
        matches!(
            self,
            RoundPhase::Judgement
                | RoundPhase::CoopJudgement
                | RoundPhase::SacrificeJudgement
                | RoundPhase::RevivalJudgement
                | RoundPhase::RankedJudgement
        )
    }
}

/// Events that move a round forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Scenario text is available.
    ScenarioReady,
    /// Enough trap proposals were collected to vote.
    TrapsSubmitted,
    /// A trap became the round's scenario (vote, single proposal, or fallback).
    TrapChosen,
    /// Every active player submitted (or timed out).
    StrategiesSubmitted,
    /// Cooperative votes were counted and rewards assigned.
    CoopVotesTallied,
    /// Volunteering closed with the given number of volunteers.
    VolunteersClosed {
        /// Number of volunteers when the window closed.
        volunteers: usize,
    },
    /// The martyr vote picked a player.
    MartyrChosen,
    /// The martyr submitted their final words.
    SpeechSubmitted,
    /// The martyr stayed silent past the deadline.
    SpeechTimedOut,
    /// Every participant holds a terminal outcome.
    JudgementComplete {
        /// Both survivors and casualties exist.
        mixed: bool,
    },
    /// Survivors unanimously granted a second chance.
    RevivalGranted,
    /// Revival vote was not unanimous, timed out, or was closed.
    RevivalDeclined,
}

/// Error returned when an event does not apply to the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied to a {round_type:?} round in {from:?}")]
pub struct InvalidTransition {
    /// Type of the round receiving the event.
    pub round_type: RoundType,
    /// Phase the round was in when the event was received.
    pub from: RoundPhase,
    /// The rejected event.
    pub event: RoundEvent,
}

/// Phase a fresh round of `round_type` starts in.
pub fn initial_phase(round_type: RoundType) -> RoundPhase {
    match round_type {
        RoundType::BlindArchitect => RoundPhase::TrapCreation,
        _ => RoundPhase::Scenario,
    }
}

/// Phase entered once the scenario is known.
pub fn entry_phase(round_type: RoundType) -> RoundPhase {
    match round_type {
        RoundType::Sacrifice => RoundPhase::SacrificeVolunteer,
        RoundType::BlindArchitect => RoundPhase::TrapCreation,
        _ => RoundPhase::Strategy,
    }
}

/// Compute the phase reached by applying `event` to a round of `round_type` in `from`.
pub fn next_phase(
    round_type: RoundType,
    from: RoundPhase,
    event: RoundEvent,
) -> Result<RoundPhase, InvalidTransition> {
    use RoundEvent as E;
    use RoundPhase as P;
    use RoundType as T;

    let next = match (round_type, from, event) {
        (T::BlindArchitect, P::Scenario, E::ScenarioReady) => {
            return Err(InvalidTransition {
                round_type,
                from,
                event,
            });
        }
        (_, P::Scenario, E::ScenarioReady) => entry_phase(round_type),

        (T::BlindArchitect, P::TrapCreation, E::TrapsSubmitted) => P::TrapVoting,
        (T::BlindArchitect, P::TrapCreation | P::TrapVoting, E::TrapChosen) => P::Strategy,

        (T::Survival | T::BlindArchitect | T::LastStand, P::Strategy, E::StrategiesSubmitted) => {
            P::Judgement
        }
        (T::Cooperative, P::Strategy, E::StrategiesSubmitted) => P::CoopVoting,
        (T::Ranked, P::Strategy, E::StrategiesSubmitted) => P::RankedJudgement,

        (T::Cooperative, P::CoopVoting, E::CoopVotesTallied) => P::CoopJudgement,

        (T::Sacrifice, P::SacrificeVolunteer, E::VolunteersClosed { volunteers }) => {
            if volunteers > 1 {
                P::SacrificeVoting
            } else {
                P::SacrificeSubmission
            }
        }
        (T::Sacrifice, P::SacrificeVoting, E::MartyrChosen) => P::SacrificeSubmission,
        (T::Sacrifice, P::SacrificeSubmission, E::SpeechSubmitted) => P::SacrificeJudgement,
        (T::Sacrifice, P::SacrificeSubmission, E::SpeechTimedOut) => P::Results,

        (T::LastStand, P::Judgement, E::JudgementComplete { mixed: true }) => P::LastStandRevival,
        (T::Survival | T::BlindArchitect | T::LastStand, P::Judgement, E::JudgementComplete { .. }) => {
            P::Results
        }
        (T::Cooperative, P::CoopJudgement, E::JudgementComplete { .. })
        | (T::Sacrifice, P::SacrificeJudgement, E::JudgementComplete { .. })
        | (T::Ranked, P::RankedJudgement, E::JudgementComplete { .. })
        | (T::LastStand, P::RevivalJudgement, E::JudgementComplete { .. }) => P::Results,

        (T::LastStand, P::LastStandRevival, E::RevivalGranted) => P::RevivalJudgement,
        (T::LastStand, P::LastStandRevival, E::RevivalDeclined) => P::Results,

        (round_type, from, event) => {
            return Err(InvalidTransition {
                round_type,
                from,
                event,
            });
        }
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(round_type: RoundType, events: &[RoundEvent]) -> Vec<RoundPhase> {
        let mut phase = initial_phase(round_type);
        let mut visited = vec![phase];
        for event in events {
            phase = next_phase(round_type, phase, *event).unwrap();
            visited.push(phase);
        }
        visited
    }

    #[test]
    fn survival_happy_path() {
        let phases = walk(
            RoundType::Survival,
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::JudgementComplete { mixed: true },
            ],
        );
        assert_eq!(
            phases,
            vec![
                RoundPhase::Scenario,
                RoundPhase::Strategy,
                RoundPhase::Judgement,
                RoundPhase::Results
            ]
        );
    }

    #[test]
    fn blind_architect_skips_scenario() {
        let phases = walk(
            RoundType::BlindArchitect,
            &[
                RoundEvent::TrapsSubmitted,
                RoundEvent::TrapChosen,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::JudgementComplete { mixed: false },
            ],
        );
        assert_eq!(phases[0], RoundPhase::TrapCreation);
        assert_eq!(phases[2], RoundPhase::Strategy);
        assert_eq!(*phases.last().unwrap(), RoundPhase::Results);

        let err = next_phase(
            RoundType::BlindArchitect,
            RoundPhase::Scenario,
            RoundEvent::ScenarioReady,
        )
        .unwrap_err();
        assert_eq!(err.round_type, RoundType::BlindArchitect);
    }

    #[test]
    fn cooperative_votes_before_judgement() {
        let phases = walk(
            RoundType::Cooperative,
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::CoopVotesTallied,
                RoundEvent::JudgementComplete { mixed: false },
            ],
        );
        assert_eq!(
            &phases[2..],
            &[
                RoundPhase::CoopVoting,
                RoundPhase::CoopJudgement,
                RoundPhase::Results
            ]
        );
    }

    #[test]
    fn single_volunteer_skips_voting() {
        let next = next_phase(
            RoundType::Sacrifice,
            RoundPhase::SacrificeVolunteer,
            RoundEvent::VolunteersClosed { volunteers: 1 },
        )
        .unwrap();
        assert_eq!(next, RoundPhase::SacrificeSubmission);

        let drafted = next_phase(
            RoundType::Sacrifice,
            RoundPhase::SacrificeVolunteer,
            RoundEvent::VolunteersClosed { volunteers: 0 },
        )
        .unwrap();
        assert_eq!(drafted, RoundPhase::SacrificeSubmission);

        let contested = next_phase(
            RoundType::Sacrifice,
            RoundPhase::SacrificeVolunteer,
            RoundEvent::VolunteersClosed { volunteers: 3 },
        )
        .unwrap();
        assert_eq!(contested, RoundPhase::SacrificeVoting);
    }

    #[test]
    fn sacrifice_timeout_goes_straight_to_results() {
        let next = next_phase(
            RoundType::Sacrifice,
            RoundPhase::SacrificeSubmission,
            RoundEvent::SpeechTimedOut,
        )
        .unwrap();
        assert_eq!(next, RoundPhase::Results);
    }

    #[test]
    fn last_stand_opens_revival_only_on_mixed_outcome() {
        let mixed = next_phase(
            RoundType::LastStand,
            RoundPhase::Judgement,
            RoundEvent::JudgementComplete { mixed: true },
        )
        .unwrap();
        assert_eq!(mixed, RoundPhase::LastStandRevival);

        let wiped = next_phase(
            RoundType::LastStand,
            RoundPhase::Judgement,
            RoundEvent::JudgementComplete { mixed: false },
        )
        .unwrap();
        assert_eq!(wiped, RoundPhase::Results);

        let granted = next_phase(
            RoundType::LastStand,
            RoundPhase::LastStandRevival,
            RoundEvent::RevivalGranted,
        )
        .unwrap();
        assert_eq!(granted, RoundPhase::RevivalJudgement);
    }

    #[test]
    fn survival_never_opens_revival() {
        let next = next_phase(
            RoundType::Survival,
            RoundPhase::Judgement,
            RoundEvent::JudgementComplete { mixed: true },
        )
        .unwrap();
        assert_eq!(next, RoundPhase::Results);
    }

    #[test]
    fn results_is_terminal() {
        for event in [
            RoundEvent::ScenarioReady,
            RoundEvent::StrategiesSubmitted,
            RoundEvent::JudgementComplete { mixed: false },
            RoundEvent::RevivalDeclined,
        ] {
            let err = next_phase(RoundType::Survival, RoundPhase::Results, event).unwrap_err();
            assert_eq!(err.from, RoundPhase::Results);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn ranked_is_judged_in_one_step() {
        let phases = walk(
            RoundType::Ranked,
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::JudgementComplete { mixed: true },
            ],
        );
        assert_eq!(phases[2], RoundPhase::RankedJudgement);
        assert_eq!(phases[3], RoundPhase::Results);
    }
}
