//! Player and admin actions inside a round.
//!
//! Every action is an optimistic update whose mutator validates the request against the fresh
//! snapshot, records the input, then lets [`settle`] close whatever phase became complete. Repeating
//! an action that already landed is reported as [`ActionStatus::AlreadyApplied`] instead of an
//! error, so clients can retry blindly.

use tracing::info;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::{
        dispatch::{Committed, dispatch},
        optimistic::{Mutation, update_with_retry},
        progression::{FollowUp, Pace, settle},
    },
    state::{
        SharedState,
        round_machine::RoundPhase,
        session::{Player, PlayerId, Session, SessionStatus},
    },
};

/// Whether the action changed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// Recorded by this call.
    Applied,
    /// Identical input was already recorded.
    AlreadyApplied,
}

/// What a round action left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether this call changed anything.
    pub status: ActionStatus,
    /// Round the action applied to.
    pub round: u32,
    /// Phase of that round right after the action.
    pub phase: RoundPhase,
}

enum Act {
    Applied(Vec<FollowUp>),
    Already(Vec<FollowUp>),
}

/// Submit a strategy. Early-judged round types start judging right away.
pub async fn submit_strategy(
    state: &SharedState,
    code: &str,
    player_id: &str,
    text: &str,
) -> Result<ActionOutcome, ServiceError> {
    let outcome = act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let (number, phase, round_type) = (round.number, round.phase, round.round_type());
            let player = lobby_player(session, player_id)?;

            if player.strategy.as_deref() == Some(text) {
                // The first attempt may have lost its follow-up; the task registry dedups.
                let rejudge =
                    round_type.judges_early() && player.judgement_pending && !player.has_outcome();
                return Ok(Act::Already(if rejudge {
                    vec![FollowUp::JudgeEarly {
                        round: number,
                        player_id: player_id.to_string(),
                    }]
                } else {
                    Vec::new()
                }));
            }
            expect_phase(phase, RoundPhase::Strategy, "submit a strategy")?;
            require_alive(player)?;
            if player.strategy.is_some() {
                return Err(ServiceError::InvalidState(
                    "a different strategy was already submitted".into(),
                ));
            }

            let mut followups = Vec::new();
            let player = player_mut(session, player_id)?;
            player.strategy = Some(text.to_string());
            if round_type.judges_early() {
                player.judgement_pending = true;
                followups.push(FollowUp::JudgeEarly {
                    round: number,
                    player_id: player_id.to_string(),
                });
            }
            Ok(Act::Applied(followups))
        },
        |session| {
            session
                .players
                .get(player_id)
                .is_some_and(|p| p.strategy.as_deref() == Some(text))
        },
    )
    .await?;
    info!(code, player_id, round = outcome.round, status = ?outcome.status, "strategy submitted");
    Ok(outcome)
}

/// Propose a trap in a blind architect round.
pub async fn submit_trap(
    state: &SharedState,
    code: &str,
    player_id: &str,
    text: &str,
) -> Result<ActionOutcome, ServiceError> {
    act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let number = round.number;
            let Some(architect) = round.architect() else {
                return Err(wrong_round("propose a trap"));
            };
            if architect.proposals.get(player_id).map(String::as_str) == Some(text) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, RoundPhase::TrapCreation, "propose a trap")?;
            let already = architect.proposals.contains_key(player_id);
            require_alive(lobby_player(session, player_id)?)?;
            if already {
                return Err(ServiceError::InvalidState(
                    "a different trap was already proposed".into(),
                ));
            }

            if let Some(architect) = session.rounds[idx].architect_mut() {
                architect
                    .proposals
                    .insert(player_id.to_string(), text.to_string());
            }
            Ok(Act::Applied(vec![FollowUp::IllustrateTrap {
                round: number,
                player_id: player_id.to_string(),
            }]))
        },
        |session| {
            session
                .current_round()
                .and_then(|r| r.architect())
                .and_then(|a| a.proposals.get(player_id))
                .is_some_and(|proposal| proposal == text)
        },
    )
    .await
}

/// Vote for another player's trap.
pub async fn vote_trap(
    state: &SharedState,
    code: &str,
    voter_id: &str,
    target_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    reject_self_vote(voter_id, target_id)?;
    act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let Some(architect) = round.architect() else {
                return Err(wrong_round("vote for a trap"));
            };
            if architect.votes.get(voter_id).map(String::as_str) == Some(target_id) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, RoundPhase::TrapVoting, "vote for a trap")?;
            if !architect.proposals.contains_key(target_id) {
                return Err(ServiceError::InvalidInput("no such trap proposal".into()));
            }
            require_alive(lobby_player(session, voter_id)?)?;

            if let Some(architect) = session.rounds[idx].architect_mut() {
                architect
                    .votes
                    .insert(voter_id.to_string(), target_id.to_string());
            }
            Ok(Act::Applied(Vec::new()))
        },
        |session| {
            session
                .current_round()
                .and_then(|r| r.architect())
                .and_then(|a| a.votes.get(voter_id))
                .is_some_and(|target| target == target_id)
        },
    )
    .await
}

/// Rank another player's cooperative strategy first.
pub async fn vote_coop(
    state: &SharedState,
    code: &str,
    voter_id: &str,
    target_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    reject_self_vote(voter_id, target_id)?;
    act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let Some(coop) = round.coop() else {
                return Err(wrong_round("vote for a strategy"));
            };
            if coop.votes.get(voter_id).map(String::as_str) == Some(target_id) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, RoundPhase::CoopVoting, "vote for a strategy")?;
            let candidate = session
                .players
                .get(target_id)
                .is_some_and(|p| p.in_lobby && p.strategy.is_some());
            if !candidate {
                return Err(ServiceError::InvalidInput("no such strategy".into()));
            }
            require_alive(lobby_player(session, voter_id)?)?;

            if let Some(coop) = session.rounds[idx].coop_mut() {
                coop.votes
                    .insert(voter_id.to_string(), target_id.to_string());
            }
            Ok(Act::Applied(Vec::new()))
        },
        |session| {
            session
                .current_round()
                .and_then(|r| r.coop())
                .and_then(|c| c.votes.get(voter_id))
                .is_some_and(|target| target == target_id)
        },
    )
    .await
}

/// Volunteer as martyr.
pub async fn volunteer(
    state: &SharedState,
    code: &str,
    player_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let Some(sacrifice) = round.sacrifice() else {
                return Err(wrong_round("volunteer"));
            };
            if sacrifice.volunteers.contains(player_id) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, RoundPhase::SacrificeVolunteer, "volunteer")?;
            require_alive(lobby_player(session, player_id)?)?;

            if let Some(sacrifice) = session.rounds[idx].sacrifice_mut() {
                sacrifice.volunteers.insert(player_id.to_string());
            }
            Ok(Act::Applied(Vec::new()))
        },
        |session| {
            session
                .current_round()
                .and_then(|r| r.sacrifice())
                .is_some_and(|s| s.volunteers.contains(player_id))
        },
    )
    .await
}

/// Admin: close volunteering now.
pub async fn advance_volunteers(
    state: &SharedState,
    code: &str,
    admin_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    admin_advance(state, code, admin_id, RoundPhase::SacrificeVolunteer, "close volunteering").await
}

/// Vote for the martyr among the volunteers.
pub async fn vote_sacrifice(
    state: &SharedState,
    code: &str,
    voter_id: &str,
    target_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    reject_self_vote(voter_id, target_id)?;
    act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let Some(sacrifice) = round.sacrifice() else {
                return Err(wrong_round("vote for a martyr"));
            };
            if sacrifice.votes.get(voter_id).map(String::as_str) == Some(target_id) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, RoundPhase::SacrificeVoting, "vote for a martyr")?;
            if !sacrifice.volunteers.contains(target_id) {
                return Err(ServiceError::InvalidInput(
                    "only volunteers can be voted martyr".into(),
                ));
            }
            require_alive(lobby_player(session, voter_id)?)?;

            if let Some(sacrifice) = session.rounds[idx].sacrifice_mut() {
                sacrifice
                    .votes
                    .insert(voter_id.to_string(), target_id.to_string());
            }
            Ok(Act::Applied(Vec::new()))
        },
        |session| {
            session
                .current_round()
                .and_then(|r| r.sacrifice())
                .and_then(|s| s.votes.get(voter_id))
                .is_some_and(|target| target == target_id)
        },
    )
    .await
}

/// The martyr's final words.
pub async fn submit_speech(
    state: &SharedState,
    code: &str,
    player_id: &str,
    text: &str,
) -> Result<ActionOutcome, ServiceError> {
    act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let Some(sacrifice) = round.sacrifice() else {
                return Err(wrong_round("deliver final words"));
            };
            let is_martyr = sacrifice.martyr_id.as_deref() == Some(player_id);
            if is_martyr && sacrifice.speech.as_deref() == Some(text) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, RoundPhase::SacrificeSubmission, "deliver final words")?;
            if !is_martyr {
                return Err(ServiceError::Unauthorized(
                    "only the martyr delivers final words".into(),
                ));
            }
            if sacrifice.speech.is_some() {
                return Err(ServiceError::InvalidState(
                    "final words were already delivered".into(),
                ));
            }

            if let Some(sacrifice) = session.rounds[idx].sacrifice_mut() {
                sacrifice.speech = Some(text.to_string());
            }
            Ok(Act::Applied(Vec::new()))
        },
        |session| {
            session
                .current_round()
                .and_then(|r| r.sacrifice())
                .is_some_and(|s| s.speech.as_deref() == Some(text))
        },
    )
    .await
}

/// Survivors vote to bring one fallen player back.
pub async fn vote_revival(
    state: &SharedState,
    code: &str,
    voter_id: &str,
    target_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    reject_self_vote(voter_id, target_id)?;
    act(
        state,
        code,
        Pace::Natural,
        |session, idx, _| {
            let round = &session.rounds[idx];
            let Some(last_stand) = round.last_stand() else {
                return Err(wrong_round("vote for a revival"));
            };
            if last_stand.revival_votes.get(voter_id).map(String::as_str) == Some(target_id) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, RoundPhase::LastStandRevival, "vote for a revival")?;
            if !lobby_player(session, voter_id)?.is_alive {
                return Err(ServiceError::Unauthorized(
                    "only survivors vote on a revival".into(),
                ));
            }
            let fallen = session
                .players
                .get(target_id)
                .is_some_and(|p| p.in_lobby && !p.is_alive);
            if !fallen {
                return Err(ServiceError::InvalidInput(
                    "only a fallen player can be revived".into(),
                ));
            }

            if let Some(last_stand) = session.rounds[idx].last_stand_mut() {
                last_stand
                    .revival_votes
                    .insert(voter_id.to_string(), target_id.to_string());
            }
            Ok(Act::Applied(Vec::new()))
        },
        |session| {
            session
                .current_round()
                .and_then(|r| r.last_stand())
                .and_then(|l| l.revival_votes.get(voter_id))
                .is_some_and(|target| target == target_id)
        },
    )
    .await
}

/// Admin: close the revival vote now.
pub async fn advance_revival(
    state: &SharedState,
    code: &str,
    admin_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    admin_advance(state, code, admin_id, RoundPhase::LastStandRevival, "close the revival vote").await
}

async fn admin_advance(
    state: &SharedState,
    code: &str,
    admin_id: &str,
    phase: RoundPhase,
    action: &'static str,
) -> Result<ActionOutcome, ServiceError> {
    let outcome = act(
        state,
        code,
        Pace::Forced,
        |session, idx, token| {
            if !session.is_admin(admin_id) {
                return Err(ServiceError::Unauthorized(format!("only the admin can {action}")));
            }
            let round = &session.rounds[idx];
            if round.transition_token == Some(token) {
                return Ok(Act::Already(Vec::new()));
            }
            expect_phase(round.phase, phase, action)?;
            Ok(Act::Applied(Vec::new()))
        },
        |_| true,
    )
    .await?;
    info!(code, admin_id, action, phase = ?outcome.phase, "admin advanced the round");
    Ok(outcome)
}

/// Shared optimistic-update flow of every round action.
async fn act<A, V>(
    state: &SharedState,
    code: &str,
    pace: Pace,
    mut apply: A,
    recorded: V,
) -> Result<ActionOutcome, ServiceError>
where
    A: FnMut(&mut Session, usize, Uuid) -> Result<Act, ServiceError>,
    V: Fn(&Session) -> bool,
{
    let token = Uuid::new_v4();
    let now = state.now();
    let committed = update_with_retry(
        state,
        code,
        |session| {
            if session.status != SessionStatus::Playing {
                return Err(ServiceError::InvalidState("the game is not in progress".into()));
            }
            let idx = session
                .current_round_idx
                .filter(|idx| *idx < session.rounds.len())
                .ok_or_else(|| ServiceError::InvalidState("no round in progress".into()))?;
            let number = session.rounds[idx].number;

            let (status, transitioned, followups) = match apply(session, idx, token)? {
                Act::Already(followups) => (ActionStatus::AlreadyApplied, false, followups),
                Act::Applied(mut followups) => {
                    let settled = settle(session, now, token, pace)?;
                    let transitioned = settled.transitioned();
                    followups.extend(settled.followups);
                    (ActionStatus::Applied, transitioned, followups)
                }
            };
            let committed = Committed {
                value: ActionOutcome {
                    status,
                    round: number,
                    phase: session.rounds[idx].phase,
                },
                round: Some(number),
                token,
                transitioned,
                followups,
            };
            Ok(match status {
                ActionStatus::Applied => Mutation::Commit(committed),
                ActionStatus::AlreadyApplied => Mutation::Skip(committed),
            })
        },
        |session, committed| recorded(session) && committed.transition_visible(session),
    )
    .await?;

    dispatch(state, code, committed.followups);
    Ok(committed.value)
}

fn lobby_player<'a>(session: &'a Session, player_id: &str) -> Result<&'a Player, ServiceError> {
    let player = session
        .players
        .get(player_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;
    if !player.in_lobby {
        return Err(ServiceError::InvalidState(
            "player has not entered the lobby".into(),
        ));
    }
    Ok(player)
}

fn player_mut<'a>(session: &'a mut Session, player_id: &str) -> Result<&'a mut Player, ServiceError> {
    session
        .players
        .get_mut(player_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))
}

fn require_alive(player: &Player) -> Result<(), ServiceError> {
    if player.is_alive {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(
            "player is out for this round".into(),
        ))
    }
}

fn expect_phase(current: RoundPhase, expected: RoundPhase, action: &str) -> Result<(), ServiceError> {
    if current == expected {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "cannot {action} during the {current:?} phase"
        )))
    }
}

fn wrong_round(action: &str) -> ServiceError {
    ServiceError::InvalidState(format!("cannot {action} in this round type"))
}

fn reject_self_vote(voter_id: &str, target_id: &str) -> Result<(), ServiceError> {
    if voter_id == target_id {
        Err(ServiceError::InvalidInput("you cannot vote for yourself".into()))
    } else {
        Ok(())
    }
}

/// Ids of players a given player may vote for in the current round.
pub fn vote_candidates(session: &Session, voter_id: &str) -> Vec<PlayerId> {
    let Some(round) = session.current_round() else {
        return Vec::new();
    };
    let candidates: Vec<PlayerId> = match round.phase {
        RoundPhase::TrapVoting => round
            .architect()
            .map(|a| a.proposals.keys().cloned().collect())
            .unwrap_or_default(),
        RoundPhase::CoopVoting => session
            .participants()
            .filter(|p| p.strategy.is_some())
            .map(|p| p.id.clone())
            .collect(),
        RoundPhase::SacrificeVoting => round
            .sacrifice()
            .map(|s| s.volunteers.iter().cloned().collect())
            .unwrap_or_default(),
        RoundPhase::LastStandRevival => session
            .participants()
            .filter(|p| !p.is_alive)
            .map(|p| p.id.clone())
            .collect(),
        _ => Vec::new(),
    };
    candidates.into_iter().filter(|id| id != voter_id).collect()
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        dao::session_store::memory::MemorySessionStore,
        services::{judgement, optimistic},
        state::{round_machine::RoundEvent, session::RoundType},
        test_support::{self, Scripted},
    };

    async fn seeded(scripted: Arc<Scripted>, session: Session) -> SharedState {
        let (state, _clock) = test_support::state_with(scripted).await;
        test_support::seed(&state, session).await;
        state
    }

    #[tokio::test]
    async fn two_player_survival_round_plays_out() {
        let scripted = Arc::new(Scripted::default());
        scripted.survives("climb the shelves");
        scripted.dies("pet the beast");
        let state = seeded(
            scripted,
            test_support::playing(RoundType::Survival, &["ada", "bob"], &[RoundEvent::ScenarioReady]),
        )
        .await;

        let first = submit_strategy(&state, "ABCD", "ada", "climb the shelves").await.unwrap();
        assert_eq!(first.phase, RoundPhase::Strategy);
        let second = submit_strategy(&state, "ABCD", "bob", "pet the beast").await.unwrap();
        assert_eq!(second.phase, RoundPhase::Judgement);
        state.tasks().idle().await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.current_round().unwrap().phase, RoundPhase::Results);
        let ada = &session.players["ada"];
        assert!(ada.is_alive);
        assert_eq!(ada.score, judgement::SURVIVAL_POINTS);
        assert!(ada.result_image_url.is_some());
        let bob = &session.players["bob"];
        assert!(!bob.is_alive);
        assert_eq!(bob.score, 0);
    }

    #[tokio::test]
    async fn identical_resubmission_is_a_no_op() {
        let scripted = Arc::new(Scripted::default());
        let state = seeded(
            scripted.clone(),
            test_support::playing(RoundType::Survival, &["ada", "bob"], &[RoundEvent::ScenarioReady]),
        )
        .await;

        submit_strategy(&state, "ABCD", "ada", "hide").await.unwrap();
        state.tasks().idle().await;
        let again = submit_strategy(&state, "ABCD", "ada", "hide").await.unwrap();
        state.tasks().idle().await;

        assert_eq!(again.status, ActionStatus::AlreadyApplied);
        assert_eq!(scripted.judge_calls(), 1);
        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.players["ada"].score, judgement::SURVIVAL_POINTS);

        let err = submit_strategy(&state, "ABCD", "ada", "run").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn concurrent_strategies_survive_stale_reads() {
        let scripted = Arc::new(Scripted::default());
        let (state, _clock) = test_support::state_with_store(
            scripted,
            MemorySessionStore::with_read_delay(Duration::from_millis(5)),
        )
        .await;
        let session =
            test_support::playing(RoundType::Survival, &["ada", "bob"], &[RoundEvent::ScenarioReady]);
        let opened_at = session.rounds[0].phase_version;
        test_support::seed(&state, session).await;

        let (ada, bob) = tokio::join!(
            submit_strategy(&state, "ABCD", "ada", "climb the shelves"),
            submit_strategy(&state, "ABCD", "bob", "hold the door"),
        );
        ada.unwrap();
        bob.unwrap();
        state.tasks().idle().await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.players["ada"].strategy.as_deref(), Some("climb the shelves"));
        assert_eq!(session.players["bob"].strategy.as_deref(), Some("hold the door"));
        let round = session.current_round().unwrap();
        assert_eq!(round.phase, RoundPhase::Results);
        // Strategy closed into judgement once, judgement closed into results once.
        assert_eq!(round.phase_version, opened_at + 2);
        assert_eq!(session.players["ada"].score, judgement::SURVIVAL_POINTS);
        assert_eq!(session.players["bob"].score, judgement::SURVIVAL_POINTS);
    }

    #[tokio::test]
    async fn coop_votes_split_two_one_zero() {
        let state = seeded(
            Arc::new(Scripted::default()),
            test_support::playing(
                RoundType::Cooperative,
                &["ada", "bob", "cy"],
                &[RoundEvent::ScenarioReady],
            ),
        )
        .await;

        for (id, plan) in [("ada", "plan a"), ("bob", "plan b"), ("cy", "plan c")] {
            submit_strategy(&state, "ABCD", id, plan).await.unwrap();
        }
        vote_coop(&state, "ABCD", "ada", "cy").await.unwrap();
        vote_coop(&state, "ABCD", "bob", "cy").await.unwrap();
        let last = vote_coop(&state, "ABCD", "cy", "bob").await.unwrap();
        assert_eq!(last.phase, RoundPhase::CoopJudgement);
        state.tasks().idle().await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let coop = session.current_round().unwrap().coop().unwrap();
        assert_eq!(coop.winning_strategy_id.as_deref(), Some("cy"));
        assert_eq!(coop.points["cy"], 200);
        assert_eq!(coop.points["bob"], 100);
        assert_eq!(coop.points["ada"], -100);
    }

    #[tokio::test]
    async fn votes_are_validated() {
        let state = seeded(
            Arc::new(Scripted::default()),
            test_support::playing(
                RoundType::Sacrifice,
                &["ada", "bob", "cy"],
                &[
                    RoundEvent::ScenarioReady,
                    RoundEvent::VolunteersClosed { volunteers: 2 },
                ],
            ),
        )
        .await;

        let err = vote_sacrifice(&state, "ABCD", "ada", "ada").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = vote_sacrifice(&state, "ABCD", "ada", "bob").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = vote_trap(&state, "ABCD", "ada", "bob").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn only_the_martyr_speaks() {
        let mut session = test_support::playing(
            RoundType::Sacrifice,
            &["ada", "bob"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::VolunteersClosed { volunteers: 1 },
            ],
        );
        session.rounds[0].sacrifice_mut().unwrap().martyr_id = Some("bob".into());
        let state = seeded(Arc::new(Scripted::default()), session).await;

        let err = submit_speech(&state, "ABCD", "ada", "farewell").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let outcome = submit_speech(&state, "ABCD", "bob", "farewell").await.unwrap();
        assert_eq!(outcome.phase, RoundPhase::SacrificeJudgement);
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn admin_closes_volunteering_with_a_draft() {
        let state = seeded(
            Arc::new(Scripted::default()),
            test_support::playing(
                RoundType::Sacrifice,
                &["ada", "bob"],
                &[RoundEvent::ScenarioReady],
            ),
        )
        .await;

        let err = advance_volunteers(&state, "ABCD", "bob").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let outcome = advance_volunteers(&state, "ABCD", "ada").await.unwrap();
        assert_eq!(outcome.phase, RoundPhase::SacrificeSubmission);
        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert!(session.current_round().unwrap().sacrifice().unwrap().martyr_id.is_some());
    }

    #[test]
    fn candidates_exclude_the_voter() {
        let mut session = test_support::playing(
            RoundType::Cooperative,
            &["ada", "bob"],
            &[RoundEvent::ScenarioReady, RoundEvent::StrategiesSubmitted],
        );
        session.players["ada"].strategy = Some("a".into());
        session.players["bob"].strategy = Some("b".into());
        assert_eq!(vote_candidates(&session, "ada"), vec!["bob".to_string()]);
    }
}
