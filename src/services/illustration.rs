//! Illustration jobs. None of them gates progression: each one generates an image outside any
//! lock and stores it only if the slot it targets still exists and is still empty.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    providers::{ImageKind, fallback, prompts},
    services::optimistic::{self, Mutation, update_with_retry},
    state::{
        SharedState,
        session::{PlayerId, Round, Session},
    },
};

/// Illustrate the scenario of round `round`.
pub async fn scenario(state: SharedState, code: String, round: u32) {
    let Some((text, theme)) = with_round(&state, &code, round, |_, r| {
        (r.scenario_image_url.is_none() && !r.scenario_text.is_empty())
            .then(|| (r.scenario_text.clone(), r.style_theme.clone()))
    })
    .await
    else {
        return;
    };

    let prompt = prompts::image(&text, ImageKind::Scenario, &theme);
    let Some(url) = state.providers().image(prompt, ImageKind::Scenario).await else {
        return;
    };

    store(
        &state,
        &code,
        "scenario image",
        |session| {
            let target = round_mut(session, round)?;
            if target.scenario_image_url.is_some() || target.scenario_text != text {
                return None;
            }
            target.scenario_image_url = Some(url.clone());
            Some(())
        },
        |session| round_ref(session, round).is_some_and(|r| r.scenario_image_url.is_some()),
    )
    .await;
}

/// Illustrate `player_id`'s trap proposal. The chosen trap doubles as the scenario image.
pub async fn trap(state: SharedState, code: String, round: u32, player_id: PlayerId) {
    let Some((text, theme)) = with_round(&state, &code, round, |_, r| {
        let proposal = r.architect()?.proposals.get(&player_id)?;
        Some((proposal.clone(), r.style_theme.clone()))
    })
    .await
    else {
        return;
    };

    let prompt = prompts::image(&text, ImageKind::Trap, &theme);
    let Some(url) = state.providers().image(prompt, ImageKind::Trap).await else {
        return;
    };

    store(
        &state,
        &code,
        "trap image",
        |session| {
            let target = round_mut(session, round)?;
            let architect = target.architect_mut()?;
            if architect.proposal_images.contains_key(&player_id) {
                return None;
            }
            architect
                .proposal_images
                .insert(player_id.clone(), url.clone());
            let chosen = architect.architect_id.as_ref() == Some(&player_id);
            if chosen && target.scenario_image_url.is_none() {
                target.scenario_image_url = Some(url.clone());
            }
            Some(())
        },
        |session| {
            round_ref(session, round)
                .and_then(Round::architect)
                .is_some_and(|a| a.proposal_images.contains_key(&player_id))
        },
    )
    .await;
}

/// Illustrate every cooperative strategy up for vote.
pub async fn strategies(state: SharedState, code: String, round: u32) {
    let Some((candidates, theme)) = with_round(&state, &code, round, |session, r| {
        let coop = r.coop()?;
        let candidates: Vec<(PlayerId, String)> = session
            .participants()
            .filter(|p| !coop.strategy_images.contains_key(&p.id))
            .filter_map(|p| p.strategy.clone().map(|s| (p.id.clone(), s)))
            .collect();
        Some((candidates, r.style_theme.clone()))
    })
    .await
    else {
        return;
    };

    let providers = state.providers();
    let images: Vec<(PlayerId, String)> = join_all(candidates.into_iter().map(|(id, strategy)| {
        let prompt = prompts::image(&strategy, ImageKind::Strategy, &theme);
        async move {
            providers
                .image(prompt, ImageKind::Strategy)
                .await
                .map(|url| (id, url))
        }
    }))
    .await
    .into_iter()
    .flatten()
    .collect();
    if images.is_empty() {
        return;
    }

    store(
        &state,
        &code,
        "strategy images",
        |session| {
            let coop = round_mut(session, round)?.coop_mut()?;
            let mut added = false;
            for (id, url) in &images {
                if !coop.strategy_images.contains_key(id) {
                    coop.strategy_images.insert(id.clone(), url.clone());
                    added = true;
                }
            }
            added.then_some(())
        },
        |session| {
            round_ref(session, round)
                .and_then(Round::coop)
                .is_some_and(|c| images.iter().all(|(id, _)| c.strategy_images.contains_key(id)))
        },
    )
    .await;
}

/// Illustrate an outcome; every listed player gets the same image.
pub async fn outcome(
    state: SharedState,
    code: String,
    round: u32,
    player_ids: Vec<PlayerId>,
    prompt: String,
) {
    let Some(theme) = with_round(&state, &code, round, |_, r| Some(r.style_theme.clone())).await
    else {
        return;
    };
    let prompt = prompts::image(&prompt, ImageKind::Outcome, &theme);
    let Some(url) = state.providers().image(prompt, ImageKind::Outcome).await else {
        return;
    };
    store_result_image(&state, &code, round, &player_ids, url).await;
}

/// Illustrate a player who let the deadline pass.
pub async fn timeout(state: SharedState, code: String, round: u32, player_id: PlayerId) {
    let Some((theme, name)) = with_round(&state, &code, round, |session, r| {
        if !r.timed_out.contains(&player_id) {
            return None;
        }
        let name = session.players.get(&player_id)?.name.clone();
        Some((r.style_theme.clone(), name))
    })
    .await
    else {
        return;
    };

    let description = format!("{name}: {}", fallback::timeout_image_prompt());
    let prompt = prompts::image(&description, ImageKind::Outcome, &theme);
    let Some(url) = state.providers().image(prompt, ImageKind::Outcome).await else {
        return;
    };
    store_result_image(&state, &code, round, &[player_id], url).await;
}

async fn store_result_image(
    state: &SharedState,
    code: &str,
    round: u32,
    player_ids: &[PlayerId],
    url: String,
) {
    store(
        state,
        code,
        "outcome image",
        |session| {
            if session.current_round().map(|r| r.number) != Some(round) {
                return None;
            }
            let mut added = false;
            for id in player_ids {
                if let Some(player) = session.players.get_mut(id) {
                    if player.has_outcome() && player.result_image_url.is_none() {
                        player.result_image_url = Some(url.clone());
                        added = true;
                    }
                }
            }
            added.then_some(())
        },
        |session| {
            player_ids.iter().all(|id| {
                session
                    .players
                    .get(id)
                    .is_none_or(|p| p.result_image_url.is_some() || !p.has_outcome())
            })
        },
    )
    .await;
}

/// Generate (or regenerate) `player_id`'s portrait from their current description.
pub async fn portrait(state: SharedState, code: String, player_id: PlayerId) {
    let session = match optimistic::load(&state, &code).await {
        Ok(session) => session,
        Err(err) => {
            warn!(code, error = %err, "cannot load session for portrait");
            return;
        }
    };
    let Some(description) = session
        .players
        .get(&player_id)
        .and_then(|p| p.character_description.clone())
    else {
        debug!(code, player_id, "no character description to portray");
        return;
    };

    let prompt = prompts::image(&description, ImageKind::Character, "character portrait");
    let Some(url) = state.providers().image(prompt, ImageKind::Character).await else {
        return;
    };

    store(
        &state,
        &code,
        "portrait",
        |session| {
            let player = session.players.get_mut(&player_id)?;
            if player.character_description.as_ref() != Some(&description) {
                return None;
            }
            player.character_image_url = Some(url.clone());
            Some(())
        },
        |session| {
            session
                .players
                .get(&player_id)
                .is_some_and(|p| p.character_image_url.as_ref() == Some(&url))
        },
    )
    .await;
}

/// Load the session and extract what the job needs from round `round`.
async fn with_round<T>(
    state: &SharedState,
    code: &str,
    round: u32,
    extract: impl FnOnce(&Session, &Round) -> Option<T>,
) -> Option<T> {
    let session = match optimistic::load(state, code).await {
        Ok(session) => session,
        Err(err) => {
            warn!(code, round, error = %err, "cannot load session for illustration");
            return None;
        }
    };
    let found = round_ref(&session, round)?;
    extract(&session, found)
}

fn round_ref(session: &Session, number: u32) -> Option<&Round> {
    session.rounds.iter().find(|r| r.number == number)
}

fn round_mut(session: &mut Session, number: u32) -> Option<&mut Round> {
    session.rounds.iter_mut().find(|r| r.number == number)
}

/// Store an image; `apply` returns `None` when the slot is gone or already filled.
async fn store<A, V>(state: &SharedState, code: &str, what: &'static str, mut apply: A, stored: V)
where
    A: FnMut(&mut Session) -> Option<()>,
    V: Fn(&Session) -> bool,
{
    let result = update_with_retry(
        state,
        code,
        |session| {
            Ok(match apply(session) {
                Some(()) => Mutation::Commit(true),
                None => Mutation::Skip(false),
            })
        },
        |session, _| stored(session),
    )
    .await;
    match result {
        Ok(true) => debug!(code, what, "illustration stored"),
        Ok(false) => debug!(code, what, "illustration no longer needed"),
        Err(err) => warn!(code, what, error = %err, "failed to store illustration"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        state::{round_machine::RoundEvent, session::RoundType},
        test_support::{self, Scripted},
    };

    #[tokio::test]
    async fn chosen_trap_image_becomes_the_scenario_image() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(
            RoundType::BlindArchitect,
            &["ada", "bob"],
            &[RoundEvent::TrapChosen],
        );
        let architect = session.rounds[0].architect_mut().unwrap();
        architect.proposals.insert("bob".into(), "spikes".into());
        architect.architect_id = Some("bob".into());
        test_support::seed(&state, session).await;

        trap(state.clone(), "ABCD".into(), 1, "bob".into()).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let round = session.current_round().unwrap();
        let image = round.architect().unwrap().proposal_images.get("bob").cloned();
        assert!(image.is_some());
        assert_eq!(round.scenario_image_url, image);
    }

    #[tokio::test]
    async fn outcome_image_is_shared_and_never_overwritten() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(RoundType::Survival, &["ada", "bob", "cy"], &[]);
        session.players["ada"].die("crushed".into());
        session.players["bob"].die("crushed".into());
        session.players["bob"].result_image_url = Some("https://img.test/old".into());
        test_support::seed(&state, session).await;

        let ids = vec!["ada".to_string(), "bob".to_string(), "cy".to_string()];
        outcome(state.clone(), "ABCD".into(), 1, ids, "a press".into()).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert!(session.players["ada"].result_image_url.is_some());
        assert_eq!(
            session.players["bob"].result_image_url.as_deref(),
            Some("https://img.test/old")
        );
        // No outcome yet, so no image either.
        assert!(session.players["cy"].result_image_url.is_none());
    }
}
