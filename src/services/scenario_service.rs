//! Scenario generation: a prewarm pass filling the cache at game start, and the per-round job
//! that moves a round out of its scenario phase.

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    providers::ScenarioRequest,
    services::{
        dispatch::{self, Committed},
        optimistic::{self, Mutation, update_with_retry},
        progression::{FollowUp, Pace, settle},
    },
    state::{
        SharedState,
        round_machine::{RoundEvent, RoundPhase},
    },
};

/// Generate a scenario for every upcoming round that needs one and is not cached yet.
pub async fn prewarm(state: SharedState, code: String) {
    let session = match optimistic::load(&state, &code).await {
        Ok(session) => session,
        Err(err) => {
            warn!(code, error = %err, "cannot load session for scenario prewarm");
            return;
        }
    };

    let started = session.rounds.len() as u32;
    let missing: Vec<ScenarioRequest> = (started + 1..=session.max_rounds as u32)
        .map(|number| ScenarioRequest {
            round_number: number,
            round_type: session.round_type_for(number),
        })
        .filter(|request| {
            request.round_type.needs_scenario()
                && !session.scenario_cache.contains_key(&request.round_number)
        })
        .collect();
    if missing.is_empty() {
        return;
    }

    let providers = state.providers();
    let written = join_all(missing.into_iter().map(|request| async move {
        let number = request.round_number;
        (number, providers.scenario(request).await)
    }))
    .await;
    info!(code, scenarios = written.len(), "scenario cache prewarmed");

    let result = update_with_retry(
        &state,
        &code,
        |session| {
            let mut added = false;
            for (number, text) in &written {
                if !session.scenario_cache.contains_key(number) {
                    session.scenario_cache.insert(*number, text.clone());
                    added = true;
                }
            }
            Ok(if added {
                Mutation::Commit(())
            } else {
                Mutation::Skip(())
            })
        },
        |session, _| {
            written
                .iter()
                .all(|(number, _)| session.scenario_cache.contains_key(number))
        },
    )
    .await;
    if let Err(err) = result {
        warn!(code, error = %err, "failed to store prewarmed scenarios");
    }
}

/// Give round `round` its scenario (cached or freshly written) and open its first phase.
pub async fn write_round_scenario(state: SharedState, code: String, round: u32) {
    let session = match optimistic::load(&state, &code).await {
        Ok(session) => session,
        Err(err) => {
            warn!(code, round, error = %err, "cannot load session for scenario");
            return;
        }
    };
    let Some(current) = session
        .current_round()
        .filter(|r| r.number == round && r.phase == RoundPhase::Scenario)
    else {
        debug!(code, round, "round no longer waits for a scenario");
        return;
    };

    let text = match session.scenario_cache.get(&round) {
        Some(cached) => cached.clone(),
        None => {
            state
                .providers()
                .scenario(ScenarioRequest {
                    round_number: round,
                    round_type: current.round_type(),
                })
                .await
        }
    };

    let token = Uuid::new_v4();
    let now = state.now();
    let result = update_with_retry(
        &state,
        &code,
        |session| {
            let Some(target) = session
                .current_round_mut()
                .filter(|r| r.number == round && r.phase == RoundPhase::Scenario)
            else {
                return Ok(Mutation::Skip(None));
            };
            target.scenario_text = text.clone();
            target.apply(RoundEvent::ScenarioReady, now, token)?;

            let mut followups = vec![FollowUp::IllustrateScenario { round }];
            followups.extend(settle(session, now, token, Pace::Natural)?.followups);
            Ok(Mutation::Commit(Some(Committed {
                value: (),
                round: Some(round),
                token,
                transitioned: true,
                followups,
            })))
        },
        |session, committed| {
            committed
                .as_ref()
                .is_none_or(|c| c.transition_visible(session))
        },
    )
    .await;
    dispatch::complete(&state, &code, "scenario", result);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        state::session::RoundType,
        test_support::{self, Scripted},
    };

    #[tokio::test]
    async fn cached_scenario_opens_the_round() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(RoundType::Survival, &["ada"], &[]);
        session.scenario_cache.insert(1, "cached threat".into());
        test_support::seed(&state, session).await;

        write_round_scenario(state.clone(), "ABCD".into(), 1).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let round = session.current_round().unwrap();
        assert_eq!(round.scenario_text, "cached threat");
        assert_eq!(round.phase, RoundPhase::Strategy);
        assert!(round.submission_started_at.is_some());
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn prewarm_skips_started_and_trap_rounds() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(RoundType::Survival, &["ada"], &[]);
        session.max_rounds = 3;
        session.round_sequence = vec![
            RoundType::Survival,
            RoundType::BlindArchitect,
            RoundType::Cooperative,
        ];
        test_support::seed(&state, session).await;

        prewarm(state.clone(), "ABCD".into()).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let cached: Vec<u32> = session.scenario_cache.keys().copied().collect();
        assert_eq!(cached, vec![3]);
        assert_eq!(session.scenario_cache[&3], "Scenario for round 3");
    }
}
