//! Session lifecycle: creation, joining, lobby entry, round advancement, state reads and the
//! end-of-game media retry.

use std::time::SystemTime;

use rand::{Rng, seq::IndexedRandom};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::{
        dispatch::{Committed, dispatch},
        optimistic::{self, Mutation, update_with_retry},
        progression::FollowUp,
        timeouts,
    },
    state::{
        SharedState,
        round_machine::{RoundEvent, RoundPhase},
        session::{MediaStatus, Player, PlayerId, Round, RoundType, Session, SessionStatus},
    },
};

/// Upper bound accepted for a per-session round count.
pub const MAX_ROUNDS_LIMIT: usize = 10;
const CODE_LEN: usize = 4;
const CODE_ATTEMPTS: usize = 16;

/// Optional overrides accepted at creation.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Rounds to play instead of the configured count.
    pub max_rounds: Option<usize>,
    /// Round types to cycle through instead of the configured rotation.
    pub round_sequence: Option<Vec<RoundType>>,
}

/// Create an empty session in the lobby under a fresh code.
pub async fn create(state: &SharedState, options: CreateOptions) -> Result<Session, ServiceError> {
    let game = &state.config().game;
    let max_rounds = options.max_rounds.unwrap_or(game.max_rounds);
    if !(1..=MAX_ROUNDS_LIMIT).contains(&max_rounds) {
        return Err(ServiceError::InvalidInput(format!(
            "max_rounds must be between 1 and {MAX_ROUNDS_LIMIT}"
        )));
    }
    let round_sequence = match options.round_sequence {
        Some(sequence) if sequence.is_empty() => {
            return Err(ServiceError::InvalidInput(
                "round_sequence must not be empty".into(),
            ));
        }
        Some(sequence) => sequence,
        None => game.round_sequence.clone(),
    };

    let store = state.require_session_store().await?;
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_code();
        if store.get(&code).await?.is_some() {
            debug!(code, "session code already taken; drawing another");
            continue;
        }
        let session = Session::new(code.clone(), max_rounds, round_sequence, state.now());
        store.put(&code, session.clone().into()).await?;
        info!(code, max_rounds, "session created");
        return Ok(session);
    }
    Err(ServiceError::InvalidState(
        "could not allocate a free session code".into(),
    ))
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| char::from(rng.random_range(b'A'..=b'Z')))
        .collect()
}

/// Add a player to a session still in the lobby. The first player becomes admin.
pub async fn join(
    state: &SharedState,
    code: &str,
    name: &str,
    character_description: Option<&str>,
) -> Result<Player, ServiceError> {
    let player_id: PlayerId = Uuid::new_v4().to_string();
    let max_players = state.config().game.max_players;
    let now = state.now();

    let player = update_with_retry(
        state,
        code,
        |session| {
            if let Some(existing) = session.players.get(&player_id) {
                return Ok(Mutation::Skip(existing.clone()));
            }
            if session.status != SessionStatus::Lobby {
                return Err(ServiceError::InvalidState("the game has already started".into()));
            }
            if session.players.len() >= max_players {
                return Err(ServiceError::InvalidState("the session is full".into()));
            }
            let player = Player::new(
                player_id.clone(),
                name.to_string(),
                session.players.is_empty(),
                character_description.map(str::to_string),
                None,
                now,
            );
            session.players.insert(player_id.clone(), player.clone());
            Ok(Mutation::Commit(player))
        },
        |session, _| session.players.contains_key(&player_id),
    )
    .await?;

    info!(code, player_id, admin = player.is_admin, "player joined");
    if player.character_description.is_some() {
        dispatch(
            state,
            code,
            vec![FollowUp::Portrait {
                player_id: player_id.clone(),
            }],
        );
    }
    Ok(player)
}

/// Mark a joined player as actively participating.
pub async fn enter_lobby(
    state: &SharedState,
    code: &str,
    player_id: &str,
) -> Result<(), ServiceError> {
    update_with_retry(
        state,
        code,
        |session| {
            let player = session
                .players
                .get_mut(player_id)
                .ok_or_else(|| player_not_found(player_id))?;
            if player.in_lobby {
                return Ok(Mutation::Skip(()));
            }
            player.in_lobby = true;
            Ok(Mutation::Commit(()))
        },
        |session, _| session.players.get(player_id).is_some_and(|p| p.in_lobby),
    )
    .await?;
    debug!(code, player_id, "player entered the lobby");
    Ok(())
}

/// Admin: leave the lobby and open round 1.
pub async fn start(state: &SharedState, code: &str, admin_id: &str) -> Result<Session, ServiceError> {
    let token = Uuid::new_v4();
    let now = state.now();
    let themes = &state.config().game.style_themes;

    let committed = update_with_retry(
        state,
        code,
        |session| {
            if session.status == SessionStatus::Playing
                && session.rounds.first().is_some_and(|r| r.transition_token == Some(token))
            {
                return Ok(Mutation::Skip(Committed::quiet((), token)));
            }
            require_admin(session, admin_id)?;
            if session.status != SessionStatus::Lobby {
                return Err(ServiceError::InvalidInput("the game has already started".into()));
            }
            if session.participants().next().is_none() {
                return Err(ServiceError::InvalidState(
                    "nobody has entered the lobby yet".into(),
                ));
            }

            session.status = SessionStatus::Playing;
            let mut followups = open_round(session, 1, pick_theme(themes), now, token)?;
            followups.push(FollowUp::PrewarmScenarios);
            Ok(Mutation::Commit(Committed {
                value: (),
                round: Some(1),
                token,
                transitioned: true,
                followups,
            }))
        },
        |session, committed| {
            session.status == SessionStatus::Playing && committed.transition_visible(session)
        },
    )
    .await?;

    info!(code, admin_id, "game started");
    dispatch(state, code, committed.followups);
    optimistic::load(state, code).await
}

/// Admin: open the next round, or finish the game after the last one.
pub async fn next_round(
    state: &SharedState,
    code: &str,
    admin_id: &str,
) -> Result<Session, ServiceError> {
    let token = Uuid::new_v4();
    let now = state.now();
    let themes = &state.config().game.style_themes;
    let run_id = Uuid::new_v4();
    let mut target: Option<usize> = None;

    let committed = update_with_retry(
        state,
        code,
        |session| {
            require_admin(session, admin_id)?;
            // Round numbers only move forward: a retry that finds its own round or finish is done.
            let target = *target.get_or_insert(session.rounds.len() + 1);
            let opened = session
                .rounds
                .get(target - 1)
                .is_some_and(|r| r.transition_token == Some(token));
            let finished = session.media.run_id == Some(run_id);
            if opened || finished {
                return Ok(Mutation::Skip(Committed::quiet((), token)));
            }
            if session.status != SessionStatus::Playing {
                return Err(ServiceError::InvalidState("the game is not in progress".into()));
            }
            let phase = session.current_round().map(|r| r.phase);
            if phase != Some(RoundPhase::Results) {
                return Err(ServiceError::InvalidState(
                    "the current round is not over yet".into(),
                ));
            }

            if session.rounds.len() >= session.max_rounds {
                finish(session, now, run_id);
                return Ok(Mutation::Commit(Committed {
                    value: (),
                    round: None,
                    token,
                    transitioned: false,
                    followups: vec![FollowUp::Media { run_id }],
                }));
            }

            let number = session.rounds.len() as u32 + 1;
            let followups = open_round(session, number, pick_theme(themes), now, token)?;
            Ok(Mutation::Commit(Committed {
                value: (),
                round: Some(number),
                token,
                transitioned: true,
                followups,
            }))
        },
        |session, committed| match committed.round {
            Some(_) => committed.transition_visible(session),
            None => session.status == SessionStatus::Finished,
        },
    )
    .await?;

    info!(code, admin_id, round = ?committed.round, "round advanced");
    dispatch(state, code, committed.followups);
    optimistic::load(state, code).await
}

/// Append round `number`, make it current and bring every player back to life.
fn open_round(
    session: &mut Session,
    number: u32,
    theme: String,
    now: SystemTime,
    token: Uuid,
) -> Result<Vec<FollowUp>, ServiceError> {
    let round_type = session.round_type_for(number);
    let mut round = Round::new(number, round_type, theme, now);
    let mut followups = Vec::new();

    if round_type.needs_scenario() {
        match session.scenario_cache.get(&number) {
            Some(cached) => {
                round.scenario_text = cached.clone();
                round.apply(RoundEvent::ScenarioReady, now, token)?;
                followups.push(FollowUp::IllustrateScenario { round: number });
            }
            None => followups.push(FollowUp::WriteScenario { round: number }),
        }
    }
    round.transition_token = Some(token);

    for player in session.players.values_mut() {
        player.resurrect();
    }
    session.rounds.push(round);
    session.current_round_idx = Some(session.rounds.len() - 1);
    Ok(followups)
}

/// Close the game: crown the leader and hand off to a fresh media run.
fn finish(session: &mut Session, now: SystemTime, run_id: Uuid) {
    session.winner_id = session.leader().map(|p| p.id.clone());
    session.status = SessionStatus::Finished;
    session.media.status = MediaStatus::Generating;
    session.media.started_at = Some(now);
    session.media.run_id = Some(run_id);
    session.media.videos.clear();
}

fn pick_theme(themes: &[String]) -> String {
    themes.choose(&mut rand::rng()).cloned().unwrap_or_default()
}

/// Read a session, enforcing the current phase deadline first.
///
/// A read naming a player also refreshes that player's heartbeat.
pub async fn get_state(
    state: &SharedState,
    code: &str,
    player_id: Option<&str>,
) -> Result<Session, ServiceError> {
    let mut session = optimistic::load(state, code).await?;
    if timeouts::enforce(state, &session).await? {
        session = optimistic::load(state, code).await?;
    }

    if let Some(player_id) = player_id {
        let throttle = state.config().timeouts.heartbeat_throttle;
        let now = state.now();
        let due = session.players.get(player_id).is_some_and(|p| {
            p.last_seen
                .and_then(|seen| now.duration_since(seen).ok())
                .is_none_or(|age| age >= throttle)
        });
        if due {
            if let Err(err) = heartbeat(state, code, player_id, now).await {
                warn!(code, player_id, error = %err, "failed to record heartbeat");
            }
        }
    }
    Ok(session)
}

async fn heartbeat(
    state: &SharedState,
    code: &str,
    player_id: &str,
    now: SystemTime,
) -> Result<(), ServiceError> {
    update_with_retry(
        state,
        code,
        |session| match session.players.get_mut(player_id) {
            Some(player) => {
                player.last_seen = Some(now);
                Ok(Mutation::Commit(()))
            }
            None => Ok(Mutation::Skip(())),
        },
        |session, _| {
            session
                .players
                .get(player_id)
                .is_none_or(|p| p.last_seen.is_some_and(|seen| seen >= now))
        },
    )
    .await
}

/// Restart the media pipeline of a finished game whose last run failed or stalled.
pub async fn retry_media(state: &SharedState, code: &str) -> Result<Uuid, ServiceError> {
    let now = state.now();
    let stuck_after = state.config().providers.media_stuck_after;
    let run_id = Uuid::new_v4();

    update_with_retry(
        state,
        code,
        |session| {
            if session.media.run_id == Some(run_id) {
                return Ok(Mutation::Skip(()));
            }
            if session.status != SessionStatus::Finished {
                return Err(ServiceError::InvalidState("the game is not finished".into()));
            }
            let retryable = match session.media.status {
                MediaStatus::Failed | MediaStatus::Partial | MediaStatus::Pending => true,
                MediaStatus::Generating => session
                    .media
                    .started_at
                    .and_then(|started| now.duration_since(started).ok())
                    .is_some_and(|age| age >= stuck_after),
                MediaStatus::Ready => false,
            };
            if !retryable {
                return Err(ServiceError::InvalidState(
                    "media generation is not stuck or failed".into(),
                ));
            }
            session.media.status = MediaStatus::Generating;
            session.media.started_at = Some(now);
            session.media.run_id = Some(run_id);
            Ok(Mutation::Commit(()))
        },
        |session, _| session.media.run_id == Some(run_id),
    )
    .await?;

    info!(code, %run_id, "media generation restarted");
    dispatch(state, code, vec![FollowUp::Media { run_id }]);
    Ok(run_id)
}

/// Re-request a player's portrait, optionally from a new description.
pub async fn regenerate_character(
    state: &SharedState,
    code: &str,
    player_id: &str,
    character_description: Option<&str>,
) -> Result<(), ServiceError> {
    update_with_retry(
        state,
        code,
        |session| {
            let player = session
                .players
                .get_mut(player_id)
                .ok_or_else(|| player_not_found(player_id))?;
            match character_description {
                Some(description) if player.character_description.as_deref() != Some(description) => {
                    player.character_description = Some(description.to_string());
                    player.character_image_url = None;
                    Ok(Mutation::Commit(()))
                }
                Some(_) => Ok(Mutation::Skip(())),
                None if player.character_description.is_some() => Ok(Mutation::Skip(())),
                None => Err(ServiceError::InvalidInput(
                    "no character description to portray".into(),
                )),
            }
        },
        |session, _| {
            session.players.get(player_id).is_some_and(|p| {
                character_description.is_none_or(|d| p.character_description.as_deref() == Some(d))
            })
        },
    )
    .await?;

    dispatch(
        state,
        code,
        vec![FollowUp::Portrait {
            player_id: player_id.to_string(),
        }],
    );
    Ok(())
}

fn require_admin(session: &Session, admin_id: &str) -> Result<(), ServiceError> {
    if !session.players.contains_key(admin_id) {
        return Err(player_not_found(admin_id));
    }
    if session.is_admin(admin_id) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized("only the admin can do this".into()))
    }
}

fn player_not_found(player_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("player `{player_id}` not found"))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        services::round_service,
        test_support::{self, Scripted},
    };

    async fn lobby(names: &[&str]) -> (SharedState, String, Vec<PlayerId>) {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let session = create(
            &state,
            CreateOptions {
                max_rounds: Some(2),
                round_sequence: Some(vec![RoundType::Survival]),
            },
        )
        .await
        .unwrap();
        let mut ids = Vec::new();
        for name in names {
            let player = join(&state, &session.code, name, None).await.unwrap();
            enter_lobby(&state, &session.code, &player.id).await.unwrap();
            ids.push(player.id);
        }
        (state, session.code, ids)
    }

    #[tokio::test]
    async fn create_validates_options() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let err = create(
            &state,
            CreateOptions {
                max_rounds: Some(11),
                round_sequence: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let session = create(&state, CreateOptions::default()).await.unwrap();
        assert_eq!(session.code.len(), 4);
        assert!(session.code.chars().all(|c| c.is_ascii_uppercase()));
        assert_eq!(session.status, SessionStatus::Lobby);
    }

    #[tokio::test]
    async fn concurrent_joins_keep_every_player_and_one_admin() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let code = create(&state, CreateOptions::default()).await.unwrap().code;

        let (a, b, c, d) = tokio::join!(
            join(&state, &code, "ada", None),
            join(&state, &code, "bob", None),
            join(&state, &code, "cy", None),
            join(&state, &code, "dee", None),
        );
        for joined in [a, b, c, d] {
            joined.unwrap();
        }

        let session = optimistic::load(&state, &code).await.unwrap();
        assert_eq!(session.players.len(), 4);
        assert_eq!(session.players.values().filter(|p| p.is_admin).count(), 1);
        assert!(session.players.values().all(|p| !p.in_lobby));
    }

    #[tokio::test]
    async fn only_the_admin_starts_and_needs_a_lobby() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let code = create(&state, CreateOptions::default()).await.unwrap().code;
        let admin = join(&state, &code, "ada", None).await.unwrap();
        let guest = join(&state, &code, "bob", None).await.unwrap();

        let err = start(&state, &code, &admin.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        enter_lobby(&state, &code, &guest.id).await.unwrap();
        let err = start(&state, &code, &guest.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let session = start(&state, &code, &admin.id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Playing);
        assert_eq!(session.current_round_idx, Some(0));
        state.tasks().idle().await;

        let late = join(&state, &code, "cy", None).await.unwrap_err();
        assert!(matches!(late, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn starting_twice_is_rejected_as_input() {
        let (state, code, ids) = lobby(&["ada", "bob"]).await;
        start(&state, &code, &ids[0]).await.unwrap();
        state.tasks().idle().await;

        let err = start(&state, &code, &ids[0]).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let session = optimistic::load(&state, &code).await.unwrap();
        assert_eq!(session.rounds.len(), 1);
    }

    #[tokio::test]
    async fn full_game_finishes_with_a_winner_and_media() {
        let (state, code, ids) = lobby(&["ada", "bob"]).await;
        let (ada, bob) = (&ids[0], &ids[1]);

        start(&state, &code, ada).await.unwrap();
        state.tasks().idle().await;

        for round in 1..=2u32 {
            let session = optimistic::load(&state, &code).await.unwrap();
            assert_eq!(session.current_round().unwrap().number, round);
            assert_eq!(session.current_round().unwrap().phase, RoundPhase::Strategy);

            round_service::submit_strategy(&state, &code, ada, "hide").await.unwrap();
            round_service::submit_strategy(&state, &code, bob, "run").await.unwrap();
            state.tasks().idle().await;

            let err = next_round(&state, &code, bob).await.unwrap_err();
            assert!(matches!(err, ServiceError::Unauthorized(_)));
            next_round(&state, &code, ada).await.unwrap();
            state.tasks().idle().await;
        }

        let session = optimistic::load(&state, &code).await.unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
        assert_eq!(session.rounds.len(), 2);
        assert_eq!(session.winner_id.as_deref(), Some(ada.as_str()));
        assert_eq!(session.media.status, MediaStatus::Ready);
        assert_eq!(session.media.videos.len(), 2);
    }

    #[tokio::test]
    async fn next_round_is_refused_before_results() {
        let (state, code, ids) = lobby(&["ada", "bob"]).await;
        start(&state, &code, &ids[0]).await.unwrap();
        state.tasks().idle().await;

        let err = next_round(&state, &code, &ids[0]).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        let session = optimistic::load(&state, &code).await.unwrap();
        assert_eq!(session.rounds.len(), 1);
    }

    #[tokio::test]
    async fn heartbeat_is_throttled() {
        let (state, clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let code = create(&state, CreateOptions::default()).await.unwrap().code;
        let player = join(&state, &code, "ada", None).await.unwrap();

        clock.advance(Duration::from_secs(1));
        get_state(&state, &code, Some(&player.id)).await.unwrap();
        let session = optimistic::load(&state, &code).await.unwrap();
        assert_eq!(session.players[&player.id].last_seen, Some(test_support::start()));

        clock.advance(state.config().timeouts.heartbeat_throttle);
        get_state(&state, &code, Some(&player.id)).await.unwrap();
        let session = optimistic::load(&state, &code).await.unwrap();
        assert_eq!(session.players[&player.id].last_seen, Some(state.now()));
    }

    #[tokio::test]
    async fn media_retry_requires_a_failed_run() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(RoundType::Survival, &["ada", "bob"], &[]);
        session.status = SessionStatus::Finished;
        session.media.status = MediaStatus::Generating;
        session.media.started_at = Some(state.now());
        session.media.run_id = Some(Uuid::new_v4());
        test_support::seed(&state, session).await;

        let err = retry_media(&state, "ABCD").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let mut session = optimistic::load(&state, "ABCD").await.unwrap();
        session.media.status = MediaStatus::Failed;
        test_support::seed(&state, session).await;

        let run_id = retry_media(&state, "ABCD").await.unwrap();
        state.tasks().idle().await;
        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.media.run_id, Some(run_id));
        assert_eq!(session.media.status, MediaStatus::Ready);
    }

    #[tokio::test]
    async fn joining_with_a_look_requests_a_portrait() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let code = create(&state, CreateOptions::default()).await.unwrap().code;
        let player = join(&state, &code, "ada", Some("tall, red scarf")).await.unwrap();
        state.tasks().idle().await;

        let session = optimistic::load(&state, &code).await.unwrap();
        assert!(session.players[&player.id].character_image_url.is_some());

        regenerate_character(&state, &code, &player.id, Some("short, blue hat"))
            .await
            .unwrap();
        state.tasks().idle().await;
        let session = optimistic::load(&state, &code).await.unwrap();
        let player = &session.players[&player.id];
        assert_eq!(player.character_description.as_deref(), Some("short, blue hat"));
        assert!(player.character_image_url.is_some());
    }
}
