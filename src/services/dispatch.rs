//! Turns verified [`FollowUp`]s into registered background tasks.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::{illustration, judgement, media, progression::FollowUp, scenario_service},
    state::{
        SharedState,
        session::Session,
        tasks::{TaskKey, TaskKind},
    },
};

/// Outcome of a committed mutation that may have changed phase.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    /// Value handed back to the caller.
    pub value: T,
    /// Round the mutation applied to.
    pub round: Option<u32>,
    /// Token stamped on any transition performed.
    pub token: Uuid,
    /// Whether the mutation changed the round's phase.
    pub transitioned: bool,
    /// Work to start once the write is verified.
    pub followups: Vec<FollowUp>,
}

impl<T> Committed<T> {
    /// A commit that did not move the round.
    pub fn quiet(value: T, token: Uuid) -> Self {
        Self {
            value,
            round: None,
            token,
            transitioned: false,
            followups: Vec::new(),
        }
    }

    /// Whether the transition this commit performed (if any) is the one stored in `session`.
    pub fn transition_visible(&self, session: &Session) -> bool {
        if !self.transitioned {
            return true;
        }
        session.rounds.iter().any(|round| {
            Some(round.number) == self.round && round.transition_token == Some(self.token)
        })
    }
}

/// Spawn the task behind each follow-up, skipping those already running.
pub fn dispatch(state: &SharedState, code: &str, followups: Vec<FollowUp>) {
    for followup in followups {
        let key = TaskKey::new(code, task_kind(&followup));
        let tasks = state.tasks();
        let (state, code) = (state.clone(), code.to_string());
        let spawned = match followup {
            FollowUp::JudgeEarly { round, player_id } => {
                tasks.spawn(key, judgement::judge_early(state, code, round, player_id))
            }
            FollowUp::JudgeRound { round } => {
                tasks.spawn(key, judgement::judge_round(state, code, round))
            }
            FollowUp::WriteScenario { round } => tasks.spawn(
                key,
                scenario_service::write_round_scenario(state, code, round),
            ),
            FollowUp::PrewarmScenarios => tasks.spawn(key, scenario_service::prewarm(state, code)),
            FollowUp::IllustrateScenario { round } => {
                tasks.spawn(key, illustration::scenario(state, code, round))
            }
            FollowUp::IllustrateTrap { round, player_id } => {
                tasks.spawn(key, illustration::trap(state, code, round, player_id))
            }
            FollowUp::IllustrateStrategies { round } => {
                tasks.spawn(key, illustration::strategies(state, code, round))
            }
            FollowUp::IllustrateOutcome {
                round,
                player_ids,
                prompt,
            } => tasks.spawn(
                key,
                illustration::outcome(state, code, round, player_ids, prompt),
            ),
            FollowUp::IllustrateTimeout { round, player_id } => {
                tasks.spawn(key, illustration::timeout(state, code, round, player_id))
            }
            FollowUp::Portrait { player_id } => {
                tasks.spawn(key, illustration::portrait(state, code, player_id))
            }
            FollowUp::Media { run_id } => tasks.spawn(key, media::run(state, code, run_id)),
        };
        if !spawned {
            debug!("follow-up already in flight");
        }
    }
}

/// Dispatch the follow-ups of a background write, logging instead of surfacing failures.
pub fn complete<T>(
    state: &SharedState,
    code: &str,
    task: &'static str,
    result: Result<Option<Committed<T>>, ServiceError>,
) {
    match result {
        Ok(Some(committed)) => dispatch(state, code, committed.followups),
        Ok(None) => debug!(code, task, "nothing left to apply"),
        Err(err) => warn!(code, task, error = %err, "failed to store background result"),
    }
}

fn task_kind(followup: &FollowUp) -> TaskKind {
    match followup {
        FollowUp::JudgeEarly { round, player_id } => TaskKind::EarlyJudgement {
            round: *round,
            player_id: player_id.clone(),
        },
        FollowUp::JudgeRound { round } => TaskKind::RoundJudgement { round: *round },
        FollowUp::WriteScenario { round } => TaskKind::RoundScenario { round: *round },
        FollowUp::PrewarmScenarios => TaskKind::ScenarioPrewarm,
        FollowUp::IllustrateScenario { round } => illustration_kind(*round, "scenario".into()),
        FollowUp::IllustrateTrap { round, player_id } => {
            illustration_kind(*round, format!("trap:{player_id}"))
        }
        FollowUp::IllustrateStrategies { round } => illustration_kind(*round, "strategies".into()),
        FollowUp::IllustrateOutcome {
            round, player_ids, ..
        } => illustration_kind(*round, format!("outcome:{}", player_ids.join(","))),
        FollowUp::IllustrateTimeout { round, player_id } => {
            illustration_kind(*round, format!("timeout:{player_id}"))
        }
        FollowUp::Portrait { player_id } => TaskKind::CharacterPortrait {
            player_id: player_id.clone(),
        },
        FollowUp::Media { run_id } => TaskKind::MediaPipeline { run_id: *run_id },
    }
}

fn illustration_kind(round: u32, subject: String) -> TaskKind {
    TaskKind::Illustration { round, subject }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::RoundType;

    #[test]
    fn outcome_illustrations_are_keyed_by_their_players() {
        let kind = task_kind(&FollowUp::IllustrateOutcome {
            round: 2,
            player_ids: vec!["a".into(), "b".into()],
            prompt: "scene".into(),
        });
        assert_eq!(
            kind,
            TaskKind::Illustration {
                round: 2,
                subject: "outcome:a,b".into()
            }
        );
    }

    #[test]
    fn transition_is_recognised_by_its_token() {
        let now = std::time::SystemTime::UNIX_EPOCH;
        let mut session = Session::new("ABCD".into(), 3, vec![RoundType::Survival], now);
        let mut round = crate::state::session::Round::new(1, RoundType::Survival, "ink".into(), now);
        let mine = Uuid::new_v4();
        round.transition_token = Some(Uuid::new_v4());
        session.rounds.push(round);
        session.current_round_idx = Some(0);

        let committed = Committed {
            value: (),
            round: Some(1),
            token: mine,
            transitioned: true,
            followups: Vec::new(),
        };
        assert!(!committed.transition_visible(&session));

        session.rounds[0].transition_token = Some(mine);
        assert!(committed.transition_visible(&session));
        assert!(Committed::quiet((), Uuid::new_v4()).transition_visible(&session));
    }
}
