//! Timeout scheduler.
//!
//! There is no timer: every state read checks the current phase deadline and, once it has passed,
//! closes the phase with whatever input exists. The same read also repairs sessions whose
//! background work vanished (process restart, dropped task) by re-dispatching it.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::TimeoutConfig,
    error::ServiceError,
    services::{
        dispatch::{Committed, dispatch},
        optimistic::{Mutation, update_with_retry},
        progression::{FollowUp, Pace, settle},
    },
    state::{
        SharedState,
        round_machine::RoundPhase,
        session::{Round, Session, SessionStatus},
        tasks::{TaskKey, TaskKind},
    },
};

/// When the current phase of `round` closes on its own, if it has a deadline at all.
pub fn deadline(round: &Round, timeouts: &TimeoutConfig) -> Option<SystemTime> {
    let (started, limit) = match round.phase {
        RoundPhase::Strategy | RoundPhase::TrapCreation => {
            (round.submission_started_at?, timeouts.submission)
        }
        RoundPhase::SacrificeVolunteer => (round.submission_started_at?, timeouts.volunteer),
        RoundPhase::SacrificeSubmission => {
            (round.submission_started_at?, timeouts.sacrifice_speech)
        }
        phase if phase.is_voting() => (round.voting_started_at?, timeouts.voting),
        _ => return None,
    };
    Some(started + limit)
}

/// Whether the deadline of `round`'s current phase has passed at `now`.
pub fn expired(round: &Round, timeouts: &TimeoutConfig, now: SystemTime) -> bool {
    deadline(round, timeouts).is_some_and(|deadline| now >= deadline)
}

/// Enforce the deadline and repair abandoned work for the snapshot a reader just loaded.
///
/// Returns `true` when the stored session changed, so the caller re-reads before projecting.
pub async fn enforce(state: &SharedState, session: &Session) -> Result<bool, ServiceError> {
    if session.status != SessionStatus::Playing {
        return Ok(false);
    }
    let Some(round) = session.current_round() else {
        return Ok(false);
    };

    let now = state.now();
    if expired(round, &state.config().timeouts, now) {
        force_close(state, &session.code, round.number, round.phase_version).await?;
        return Ok(true);
    }

    repair(state, session, round, now).await
}

async fn force_close(
    state: &SharedState,
    code: &str,
    number: u32,
    version: u64,
) -> Result<(), ServiceError> {
    let timeouts = &state.config().timeouts;
    let token = Uuid::new_v4();
    let now = state.now();

    let committed = update_with_retry(
        state,
        code,
        |session| {
            let still_due = session.current_round().is_some_and(|r| {
                r.number == number && r.phase_version == version && expired(r, timeouts, now)
            });
            if !still_due {
                return Ok(Mutation::Skip(None));
            }

            let settled = settle(session, now, token, Pace::Forced)?;
            if !settled.transitioned() {
                // Nothing can close this phase; stop its clock.
                if let Some(round) = session.current_round_mut() {
                    round.submission_started_at = None;
                    round.voting_started_at = None;
                }
            }
            Ok(Mutation::Commit(Some(Committed {
                value: (),
                round: Some(number),
                token,
                transitioned: settled.transitioned(),
                followups: settled.followups,
            })))
        },
        |session, committed| match committed {
            None => true,
            Some(c) if c.transitioned => c.transition_visible(session),
            Some(_) => session
                .current_round()
                .is_none_or(|r| r.number != number || deadline(r, timeouts).is_none()),
        },
    )
    .await?;

    if let Some(committed) = committed {
        info!(code, round = number, transitioned = committed.transitioned, "phase deadline enforced");
        dispatch(state, code, committed.followups);
    }
    Ok(())
}

/// Re-dispatch background work a phase is waiting for but nobody is doing.
async fn repair(
    state: &SharedState,
    session: &Session,
    round: &Round,
    now: SystemTime,
) -> Result<bool, ServiceError> {
    let code = session.code.as_str();
    let number = round.number;
    let tasks = state.tasks();
    let mut followups = Vec::new();

    if round.phase == RoundPhase::Scenario
        && !tasks.is_running(&TaskKey::new(code, TaskKind::RoundScenario { round: number }))
    {
        followups.push(FollowUp::WriteScenario { round: number });
    }

    if matches!(round.phase, RoundPhase::Strategy | RoundPhase::Judgement) {
        for player in session
            .participants()
            .filter(|p| p.judgement_pending && !p.has_outcome())
        {
            let kind = TaskKind::EarlyJudgement {
                round: number,
                player_id: player.id.clone(),
            };
            if !tasks.is_running(&TaskKey::new(code, kind)) {
                followups.push(FollowUp::JudgeEarly {
                    round: number,
                    player_id: player.id.clone(),
                });
            }
        }
    }

    let mut settled = false;
    if round.phase.is_judging() {
        let waiting = session.participants().any(|p| {
            !p.has_outcome()
                && (!p.judgement_pending || round.phase == RoundPhase::RevivalJudgement)
        });
        let age = now
            .duration_since(round.phase_started_at)
            .unwrap_or_default();
        let judging = tasks.is_running(&TaskKey::new(code, TaskKind::RoundJudgement { round: number }));

        if waiting && !judging && age >= state.config().timeouts.stuck_judgement {
            info!(code, round = number, phase = ?round.phase, "judgement abandoned; restarting");
            followups.push(FollowUp::JudgeRound { round: number });
        }
        let complete = session
            .participants()
            .all(|p| p.has_outcome() && !p.judgement_pending);
        if complete {
            settled = settle_stuck(state, code, number, round.phase_version).await?;
        }
    }

    if !followups.is_empty() {
        debug!(code, round = number, count = followups.len(), "re-dispatching abandoned work");
        dispatch(state, code, followups);
    }
    Ok(settled)
}

/// Every outcome is in but nobody closed the judgement phase.
async fn settle_stuck(
    state: &SharedState,
    code: &str,
    number: u32,
    version: u64,
) -> Result<bool, ServiceError> {
    let token = Uuid::new_v4();
    let now = state.now();
    let committed = update_with_retry(
        state,
        code,
        |session| {
            let same_phase = session
                .current_round()
                .is_some_and(|r| r.number == number && r.phase_version == version);
            if !same_phase {
                return Ok(Mutation::Skip(None));
            }
            let settled = settle(session, now, token, Pace::Natural)?;
            if !settled.transitioned() {
                return Ok(Mutation::Skip(None));
            }
            Ok(Mutation::Commit(Some(Committed {
                value: (),
                round: Some(number),
                token,
                transitioned: true,
                followups: settled.followups,
            })))
        },
        |session, committed| {
            committed
                .as_ref()
                .is_none_or(|c| c.transition_visible(session))
        },
    )
    .await?;

    let Some(committed) = committed else {
        return Ok(false);
    };
    info!(code, round = number, "stuck judgement phase closed");
    dispatch(state, code, committed.followups);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        providers::fallback,
        services::optimistic,
        state::{round_machine::RoundEvent, session::RoundType},
        test_support::{self, Scripted},
    };

    #[test]
    fn judging_phases_have_no_deadline() {
        let session = test_support::playing(
            RoundType::Survival,
            &["ada"],
            &[RoundEvent::ScenarioReady, RoundEvent::StrategiesSubmitted],
        );
        let round = session.current_round().unwrap();
        assert!(deadline(round, &TimeoutConfig::default()).is_none());
    }

    #[test]
    fn voting_deadline_runs_from_the_vote_start() {
        let session = test_support::playing(
            RoundType::Cooperative,
            &["ada"],
            &[RoundEvent::ScenarioReady, RoundEvent::StrategiesSubmitted],
        );
        let round = session.current_round().unwrap();
        let timeouts = TimeoutConfig::default();
        let start = test_support::start();

        assert!(!expired(round, &timeouts, start + timeouts.voting - Duration::from_secs(1)));
        assert!(expired(round, &timeouts, start + timeouts.voting));
    }

    #[tokio::test]
    async fn silent_martyr_timeout_kills_everyone() {
        let (state, clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(
            RoundType::Sacrifice,
            &["ada", "bob", "cy"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::VolunteersClosed { volunteers: 1 },
            ],
        );
        session.rounds[0].sacrifice_mut().unwrap().martyr_id = Some("bob".into());
        test_support::seed(&state, session).await;

        clock.advance(state.config().timeouts.sacrifice_speech + Duration::from_secs(1));
        let snapshot = optimistic::load(&state, "ABCD").await.unwrap();
        assert!(enforce(&state, &snapshot).await.unwrap());

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let round = session.current_round().unwrap();
        assert_eq!(round.phase, RoundPhase::Results);
        assert_eq!(round.timed_out.len(), 3);
        let narrative = fallback::silent_martyr_narrative(&session.players["bob"].name);
        assert!(
            session
                .players
                .values()
                .all(|p| !p.is_alive && p.death_reason.as_deref() == Some(narrative.as_str()))
        );
        assert!(round.sacrifice().unwrap().epic.is_none());
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn concurrent_readers_close_the_phase_once() {
        let (state, clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(
            RoundType::Survival,
            &["ada", "bob"],
            &[RoundEvent::ScenarioReady],
        );
        session.players["ada"].strategy = Some("run".into());
        session.players["ada"].survive("ran".into(), 100);
        test_support::seed(&state, session).await;

        clock.advance(state.config().timeouts.submission);
        let snapshot = optimistic::load(&state, "ABCD").await.unwrap();
        let (first, second) = tokio::join!(enforce(&state, &snapshot), enforce(&state, &snapshot));
        first.unwrap();
        second.unwrap();

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let round = session.current_round().unwrap();
        assert_eq!(round.phase, RoundPhase::Results);
        assert_eq!(round.phase_version, 3);
        assert!(!session.players["bob"].is_alive);
        assert_eq!(session.players["ada"].score, 100);
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn abandoned_scenario_is_rewritten() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        test_support::seed(&state, test_support::playing(RoundType::Survival, &["ada"], &[])).await;

        let snapshot = optimistic::load(&state, "ABCD").await.unwrap();
        enforce(&state, &snapshot).await.unwrap();
        state.tasks().idle().await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.current_round().unwrap().phase, RoundPhase::Strategy);
    }
}
