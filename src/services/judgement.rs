//! Judgement pipeline: calls the judge outside any lock, then merges verdicts into a fresh read.
//!
//! Every write here is an "apply if not already applied" merge keyed on a terminal-state predicate
//! (a player holding an outcome, a team verdict being set, ranks being recorded). A pipeline that
//! runs twice, or races the timeout scheduler, therefore never awards points twice.

use futures::future::join_all;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    providers::{JudgeRequest, JudgeStyle, RankRequest, Ranking, Verdict, fallback},
    services::{
        dispatch::{self, Committed},
        optimistic::{self, Mutation, update_with_retry},
        progression::{FollowUp, Pace, settle},
    },
    state::{
        SharedState,
        round_machine::RoundPhase,
        session::{PlayerId, Round, RoundType, Session},
    },
};

/// Points for surviving a regular round.
pub const SURVIVAL_POINTS: i64 = 100;
/// Points for surviving the boss round.
pub const LAST_STAND_POINTS: i64 = 200;
/// Points for surviving a revival re-judgement.
pub const REVIVAL_POINTS: i64 = 100;
/// Bonus granted to one random survivor of a successful cooperative round.
pub const COOP_SURVIVOR_BONUS: i64 = 100;
/// Penalty taken by everyone when the cooperative strategy fails.
pub const COOP_FAILURE_PENALTY: i64 = 50;
/// Bonus granted to a martyr whose speech was judged epic.
pub const MARTYR_BONUS: i64 = 500;
/// Points for everyone saved by an epic sacrifice.
pub const SAVED_POINTS: i64 = 100;

const EARLY_PHASES: &[RoundPhase] = &[RoundPhase::Strategy, RoundPhase::Judgement];

/// Points awarded for surviving a round of this type.
pub fn survival_points(round_type: RoundType) -> i64 {
    match round_type {
        RoundType::LastStand => LAST_STAND_POINTS,
        _ => SURVIVAL_POINTS,
    }
}

/// Points per rank for a ranked field of `field` players.
pub fn ranked_points(field: usize) -> Vec<i64> {
    let table: &[i64] = match field {
        0 => &[],
        1 => &[100],
        2 => &[200, 50],
        3 => &[250, 150, 50],
        4 => &[300, 200, 100, 50],
        _ => &[400, 300, 200, 100, 50],
    };
    (0..field)
        .map(|idx| table.get(idx).copied().unwrap_or(25))
        .collect()
}

/// Record `verdict` for `player_id` unless the player already holds an outcome.
pub fn apply_verdict(session: &mut Session, player_id: &str, verdict: &Verdict, points: i64) -> bool {
    let Some(player) = session.players.get_mut(player_id) else {
        return false;
    };
    if player.has_outcome() {
        return false;
    }
    if verdict.survived {
        player.survive(verdict.reason.clone(), points);
    } else {
        player.die(verdict.reason.clone());
    }
    true
}

/// Turn whatever the ranked judge answered into exactly one entry per submission, ranks 1..n.
///
/// Unknown and duplicated players are dropped; submissions the judge forgot are appended in
/// submission order.
pub fn normalize_rankings(rankings: Vec<Ranking>, submissions: &[(PlayerId, String)]) -> Vec<Ranking> {
    let position = |id: &str| submissions.iter().position(|(player, _)| player == id);

    let mut kept: Vec<Ranking> = Vec::with_capacity(submissions.len());
    for ranking in rankings {
        let known = position(&ranking.player_id).is_some();
        if known && !kept.iter().any(|k| k.player_id == ranking.player_id) {
            kept.push(ranking);
        }
    }
    kept.sort_by_key(|ranking| (ranking.rank, position(&ranking.player_id)));

    let forgotten: Vec<Ranking> = fallback::rankings(submissions)
        .into_iter()
        .filter(|ranking| !kept.iter().any(|k| k.player_id == ranking.player_id))
        .collect();
    kept.extend(forgotten);

    for (idx, ranking) in kept.iter_mut().enumerate() {
        ranking.rank = idx as u32 + 1;
    }
    kept
}

fn judge_style(round_type: RoundType) -> JudgeStyle {
    match round_type {
        RoundType::LastStand => JudgeStyle::LastStand,
        _ => JudgeStyle::Survival,
    }
}

fn request(round: &Round, submission: String, style: JudgeStyle) -> JudgeRequest {
    JudgeRequest {
        scenario: round.scenario_text.clone(),
        submission,
        style,
        theme: round.style_theme.clone(),
    }
}

fn judged_round(session: &Session, round: u32, phases: &[RoundPhase]) -> Option<usize> {
    session
        .current_round_idx
        .filter(|idx| {
            session
                .rounds
                .get(*idx)
                .is_some_and(|r| r.number == round && phases.contains(&r.phase))
        })
}

/// Judge one player right after their submission.
pub async fn judge_early(state: SharedState, code: String, round: u32, player_id: PlayerId) {
    let session = match optimistic::load(&state, &code).await {
        Ok(session) => session,
        Err(err) => {
            warn!(code, round, error = %err, "cannot load session for early judgement");
            return;
        }
    };
    let Some(current) = session.current_round().filter(|r| r.number == round) else {
        return;
    };
    let Some(submission) = session
        .players
        .get(&player_id)
        .filter(|player| !player.has_outcome())
        .and_then(|player| player.strategy.clone())
    else {
        debug!(code, round, player_id, "early judgement no longer needed");
        return;
    };

    let points = survival_points(current.round_type());
    let style = judge_style(current.round_type());
    let verdict = state
        .providers()
        .judge(request(current, submission, style))
        .await;

    commit_verdicts(&state, &code, round, EARLY_PHASES, vec![(player_id, verdict)], points).await;
}

/// Drive the judgement phase round `round` is in.
pub async fn judge_round(state: SharedState, code: String, round: u32) {
    let session = match optimistic::load(&state, &code).await {
        Ok(session) => session,
        Err(err) => {
            warn!(code, round, error = %err, "cannot load session for judgement");
            return;
        }
    };
    let Some(current) = session.current_round().filter(|r| r.number == round) else {
        return;
    };

    match current.phase {
        RoundPhase::Judgement => judge_batch(&state, &code, &session, current).await,
        RoundPhase::CoopJudgement => judge_team(&state, &code, &session, current).await,
        RoundPhase::SacrificeJudgement => judge_sacrifice(&state, &code, &session, current).await,
        RoundPhase::RankedJudgement => judge_ranked(&state, &code, &session, current).await,
        RoundPhase::RevivalJudgement => judge_revival(&state, &code, &session, current).await,
        phase => debug!(code, round, ?phase, "round is not being judged"),
    }
}

/// Judge every remaining player in one parallel fan-out.
async fn judge_batch(state: &SharedState, code: &str, session: &Session, round: &Round) {
    let style = judge_style(round.round_type());
    let providers = state.providers();
    let pending = session
        .participants()
        .filter(|p| !p.has_outcome() && !p.judgement_pending)
        .map(|p| (p.id.clone(), p.strategy.clone()));

    let verdicts = join_all(pending.map(|(player_id, strategy)| {
        let style = style.clone();
        async move {
            let verdict = match strategy {
                Some(submission) => providers.judge(request(round, submission, style)).await,
                None => Verdict {
                    survived: false,
                    reason: fallback::timeout_narrative(),
                    visual_prompt: fallback::timeout_image_prompt(),
                },
            };
            (player_id, verdict)
        }
    }))
    .await;

    info!(code, round = round.number, judged = verdicts.len(), "batch judgement finished");
    let points = survival_points(round.round_type());
    commit_verdicts(state, code, round.number, &[RoundPhase::Judgement], verdicts, points).await;
}

async fn commit_verdicts(
    state: &SharedState,
    code: &str,
    round: u32,
    phases: &[RoundPhase],
    verdicts: Vec<(PlayerId, Verdict)>,
    points: i64,
) {
    let ids: Vec<PlayerId> = verdicts.iter().map(|(id, _)| id.clone()).collect();
    commit_judgement(
        state,
        code,
        round,
        phases,
        |session, _| {
            let mut illustrations = Vec::new();
            for (player_id, verdict) in &verdicts {
                if apply_verdict(session, player_id, verdict, points) {
                    illustrations.push(FollowUp::IllustrateOutcome {
                        round,
                        player_ids: vec![player_id.clone()],
                        prompt: verdict.visual_prompt.clone(),
                    });
                }
            }
            (!illustrations.is_empty()).then_some(illustrations)
        },
        |session| {
            ids.iter()
                .all(|id| session.players.get(id).is_some_and(|p| p.has_outcome()))
        },
    )
    .await;
}

/// The winning cooperative strategy decides for the whole team.
async fn judge_team(state: &SharedState, code: &str, session: &Session, round: &Round) {
    let Some(winner) = round.coop().and_then(|coop| coop.winning_strategy_id.clone()) else {
        warn!(code, round = round.number, "cooperative judgement without a winning strategy");
        return;
    };
    let submission = session
        .players
        .get(&winner)
        .and_then(|p| p.strategy.clone())
        .unwrap_or_default();
    let verdict = state
        .providers()
        .judge(request(round, submission, JudgeStyle::Cooperative))
        .await;
    let number = round.number;

    commit_judgement(
        state,
        code,
        number,
        &[RoundPhase::CoopJudgement],
        |session, idx| {
            let coop = session.rounds[idx].coop_mut()?;
            if coop.team_survived.is_some() {
                return None;
            }
            coop.team_survived = Some(verdict.survived);

            let team = session.active_ids();
            let lucky = team.choose(&mut rand::rng()).cloned();
            for player_id in &team {
                let Some(player) = session.players.get_mut(player_id) else {
                    continue;
                };
                if verdict.survived {
                    let bonus = if lucky.as_ref() == Some(player_id) {
                        COOP_SURVIVOR_BONUS
                    } else {
                        0
                    };
                    player.survive(verdict.reason.clone(), bonus);
                } else {
                    player.die(verdict.reason.clone());
                    player.score -= COOP_FAILURE_PENALTY;
                }
            }
            Some(vec![FollowUp::IllustrateOutcome {
                round: number,
                player_ids: team,
                prompt: verdict.visual_prompt.clone(),
            }])
        },
        |session| {
            session
                .rounds
                .iter()
                .find(|r| r.number == number)
                .and_then(Round::coop)
                .is_some_and(|coop| coop.team_survived.is_some())
        },
    )
    .await;
}

/// The martyr's speech decides for everybody.
async fn judge_sacrifice(state: &SharedState, code: &str, session: &Session, round: &Round) {
    let Some(sacrifice) = round.sacrifice() else {
        return;
    };
    let (Some(martyr_id), Some(speech)) = (sacrifice.martyr_id.clone(), sacrifice.speech.clone())
    else {
        warn!(code, round = round.number, "sacrifice judgement without martyr or speech");
        return;
    };
    let martyr_name = session
        .players
        .get(&martyr_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let style = JudgeStyle::Sacrifice {
        martyr_name: martyr_name.clone(),
    };
    let verdict = state.providers().judge(request(round, speech, style)).await;
    let epic = verdict.survived;
    let number = round.number;

    commit_judgement(
        state,
        code,
        number,
        &[RoundPhase::SacrificeJudgement],
        |session, idx| {
            let sacrifice = session.rounds[idx].sacrifice_mut()?;
            if sacrifice.epic.is_some() {
                return None;
            }
            sacrifice.epic = Some(epic);

            let team = session.active_ids();
            for player_id in &team {
                let Some(player) = session.players.get_mut(player_id) else {
                    continue;
                };
                if *player_id == martyr_id {
                    player.die(verdict.reason.clone());
                    if epic {
                        player.score += MARTYR_BONUS;
                    }
                } else if epic {
                    player.survive(fallback::saved_by_martyr(&martyr_name), SAVED_POINTS);
                } else {
                    player.die(fallback::doomed_by_martyr(&martyr_name));
                }
            }
            Some(vec![FollowUp::IllustrateOutcome {
                round: number,
                player_ids: team,
                prompt: verdict.visual_prompt.clone(),
            }])
        },
        |session| {
            session
                .rounds
                .iter()
                .find(|r| r.number == number)
                .and_then(Round::sacrifice)
                .is_some_and(|sacrifice| sacrifice.epic.is_some())
        },
    )
    .await;
}

/// Rank every strategy against the others; only the best one survives.
async fn judge_ranked(state: &SharedState, code: &str, session: &Session, round: &Round) {
    let submissions: Vec<(PlayerId, String)> = session
        .participants()
        .filter(|p| p.is_alive && !p.has_outcome())
        .filter_map(|p| p.strategy.clone().map(|s| (p.id.clone(), s)))
        .collect();
    let answered = if submissions.is_empty() {
        Vec::new()
    } else {
        state
            .providers()
            .rank(RankRequest {
                scenario: round.scenario_text.clone(),
                submissions: submissions.clone(),
                theme: round.style_theme.clone(),
            })
            .await
    };
    let rankings = normalize_rankings(answered, &submissions);
    let points = ranked_points(rankings.len());
    let number = round.number;

    commit_judgement(
        state,
        code,
        number,
        &[RoundPhase::RankedJudgement],
        |session, idx| {
            let ranked = session.rounds[idx].ranked_mut()?;
            if !ranked.ranks.is_empty() || rankings.is_empty() {
                return None;
            }

            let mut illustrations = Vec::new();
            for (ranking, award) in rankings.iter().zip(&points) {
                ranked.ranks.insert(ranking.player_id.clone(), ranking.rank);
                ranked.points.insert(ranking.player_id.clone(), *award);
                ranked
                    .commentary
                    .insert(ranking.player_id.clone(), ranking.commentary.clone());

                let Some(player) = session.players.get_mut(&ranking.player_id) else {
                    continue;
                };
                if ranking.rank == 1 {
                    player.survive(ranking.commentary.clone(), *award);
                } else {
                    player.die(ranking.commentary.clone());
                    player.score += award;
                }
                let prompt = if ranking.visual_prompt.is_empty() {
                    ranking.commentary.clone()
                } else {
                    ranking.visual_prompt.clone()
                };
                illustrations.push(FollowUp::IllustrateOutcome {
                    round: number,
                    player_ids: vec![ranking.player_id.clone()],
                    prompt,
                });
            }
            Some(illustrations)
        },
        |session| {
            session
                .rounds
                .iter()
                .find(|r| r.number == number)
                .and_then(Round::ranked)
                .is_some_and(|ranked| !ranked.ranks.is_empty())
        },
    )
    .await;
}

/// Give the revival target a second judgement of their original strategy.
async fn judge_revival(state: &SharedState, code: &str, session: &Session, round: &Round) {
    let Some(target) = round.last_stand().and_then(|ls| ls.revival_target.clone()) else {
        return;
    };
    let submission = session.players.get(&target).and_then(|p| p.strategy.clone());
    let verdict = match submission {
        Some(submission) => {
            state
                .providers()
                .judge(request(round, submission, JudgeStyle::Revival))
                .await
        }
        None => {
            debug!(code, round = round.number, player_id = %target, "revival target never submitted");
            Verdict {
                survived: false,
                reason: fallback::timeout_narrative(),
                visual_prompt: fallback::timeout_image_prompt(),
            }
        }
    };
    let number = round.number;
    let check = target.clone();

    commit_judgement(
        state,
        code,
        number,
        &[RoundPhase::RevivalJudgement],
        |session, idx| {
            if !apply_verdict(session, &target, &verdict, REVIVAL_POINTS) {
                return None;
            }
            if verdict.survived {
                if let Some(last_stand) = session.rounds[idx].last_stand_mut() {
                    last_stand.revived_id = Some(target.clone());
                }
            }
            Some(vec![FollowUp::IllustrateOutcome {
                round: number,
                player_ids: vec![target.clone()],
                prompt: verdict.visual_prompt.clone(),
            }])
        },
        |session| session.players.get(&check).is_some_and(|p| p.has_outcome()),
    )
    .await;
}

/// Merge a judgement into a fresh read, settle the round and dispatch the winner's follow-ups.
///
/// `apply` returns `None` when the judgement is already recorded.
async fn commit_judgement<A, V>(
    state: &SharedState,
    code: &str,
    round: u32,
    phases: &[RoundPhase],
    mut apply: A,
    recorded: V,
) where
    A: FnMut(&mut Session, usize) -> Option<Vec<FollowUp>>,
    V: Fn(&Session) -> bool,
{
    let token = Uuid::new_v4();
    let now = state.now();
    let result = update_with_retry(
        state,
        code,
        |session| {
            let Some(idx) = judged_round(session, round, phases) else {
                return Ok(Mutation::Skip(None));
            };
            let applied = apply(session, idx);
            let settled = settle(session, now, token, Pace::Natural)?;
            if applied.is_none() && !settled.transitioned() {
                return Ok(Mutation::Skip(None));
            }

            let transitioned = settled.transitioned();
            let mut followups = applied.unwrap_or_default();
            followups.extend(settled.followups);
            Ok(Mutation::Commit(Some(Committed {
                value: (),
                round: Some(round),
                token,
                transitioned,
                followups,
            })))
        },
        |session, committed| {
            committed
                .as_ref()
                .is_none_or(|c| recorded(session) && c.transition_visible(session))
        },
    )
    .await;
    dispatch::complete(state, code, "judgement", result);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        state::round_machine::RoundEvent,
        test_support::{self, Scripted},
    };

    fn ranking(player_id: &str, rank: u32) -> Ranking {
        Ranking {
            player_id: player_id.into(),
            rank,
            commentary: format!("{player_id} placed {rank}"),
            visual_prompt: String::new(),
        }
    }

    fn submissions(ids: &[&str]) -> Vec<(PlayerId, String)> {
        ids.iter().map(|id| (id.to_string(), format!("{id} plan"))).collect()
    }

    #[test]
    fn ranked_points_scale_with_the_field() {
        assert_eq!(ranked_points(1), vec![100]);
        assert_eq!(ranked_points(3), vec![250, 150, 50]);
        assert_eq!(ranked_points(4), vec![300, 200, 100, 50]);
        assert_eq!(ranked_points(7), vec![400, 300, 200, 100, 50, 25, 25]);
    }

    #[test]
    fn rankings_are_repaired() {
        let answered = vec![
            ranking("c", 1),
            ranking("ghost", 2),
            ranking("a", 2),
            ranking("c", 3),
        ];
        let fixed = normalize_rankings(answered, &submissions(&["a", "b", "c"]));

        let order: Vec<(&str, u32)> = fixed.iter().map(|r| (r.player_id.as_str(), r.rank)).collect();
        assert_eq!(order, vec![("c", 1), ("a", 2), ("b", 3)]);
    }

    #[test]
    fn verdicts_are_applied_once() {
        let mut session = test_support::playing(RoundType::Survival, &["ada"], &[]);
        let verdict = Verdict {
            survived: true,
            reason: "ok".into(),
            visual_prompt: String::new(),
        };

        assert!(apply_verdict(&mut session, "ada", &verdict, 100));
        assert!(!apply_verdict(&mut session, "ada", &verdict, 100));
        assert_eq!(session.players["ada"].score, 100);
    }

    #[tokio::test]
    async fn ranked_round_awards_points_by_rank() {
        let scripted = Arc::new(Scripted::default());
        scripted.ranks(vec![
            ranking("dee", 1),
            ranking("cy", 2),
            ranking("bob", 3),
            ranking("ada", 4),
        ]);
        let (state, _clock) = test_support::state_with(scripted).await;
        let mut session = test_support::playing(
            RoundType::Ranked,
            &["ada", "bob", "cy", "dee"],
            &[RoundEvent::ScenarioReady, RoundEvent::StrategiesSubmitted],
        );
        for player in session.players.values_mut() {
            player.strategy = Some(format!("{} plan", player.id));
        }
        test_support::seed(&state, session).await;

        judge_round(state.clone(), "ABCD".into(), 1).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let scores: Vec<i64> = session.players.values().map(|p| p.score).collect();
        assert_eq!(scores, vec![50, 100, 200, 300]);
        let alive: Vec<&str> = session
            .participants()
            .filter(|p| p.is_alive)
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(alive, vec!["dee"]);
        assert_eq!(session.current_round().unwrap().phase, RoundPhase::Results);
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn judging_twice_does_not_double_score() {
        let scripted = Arc::new(Scripted::default());
        let (state, _clock) = test_support::state_with(scripted.clone()).await;
        let mut session = test_support::playing(
            RoundType::Survival,
            &["ada", "bob"],
            &[RoundEvent::ScenarioReady, RoundEvent::StrategiesSubmitted],
        );
        session.players["ada"].strategy = Some("run".into());
        session.players["bob"].strategy = Some("hide".into());
        test_support::seed(&state, session).await;

        judge_round(state.clone(), "ABCD".into(), 1).await;
        judge_round(state.clone(), "ABCD".into(), 1).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.players["ada"].score, SURVIVAL_POINTS);
        assert_eq!(session.players["bob"].score, SURVIVAL_POINTS);
        assert_eq!(scripted.judge_calls(), 2);
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn failed_team_strategy_costs_everyone() {
        let scripted = Arc::new(Scripted::default());
        scripted.dies("group hug");
        let (state, _clock) = test_support::state_with(scripted).await;
        let mut session = test_support::playing(
            RoundType::Cooperative,
            &["ada", "bob", "cy"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::CoopVotesTallied,
            ],
        );
        session.players["ada"].strategy = Some("group hug".into());
        session.rounds[0].coop_mut().unwrap().winning_strategy_id = Some("ada".into());
        test_support::seed(&state, session).await;

        judge_round(state.clone(), "ABCD".into(), 1).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert!(session.players.values().all(|p| !p.is_alive && p.score == -50));
        assert_eq!(session.current_round().unwrap().coop().unwrap().team_survived, Some(false));
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn successful_team_strategy_rewards_one_survivor() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(
            RoundType::Cooperative,
            &["ada", "bob", "cy"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::CoopVotesTallied,
            ],
        );
        session.players["bob"].strategy = Some("barricade".into());
        session.rounds[0].coop_mut().unwrap().winning_strategy_id = Some("bob".into());
        test_support::seed(&state, session).await;

        judge_round(state.clone(), "ABCD".into(), 1).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert!(session.players.values().all(|p| p.is_alive));
        let bonus: i64 = session.players.values().map(|p| p.score).sum();
        assert_eq!(bonus, COOP_SURVIVOR_BONUS);
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn epic_sacrifice_saves_the_others() {
        let scripted = Arc::new(Scripted::default());
        scripted.survives("for the crew");
        let (state, _clock) = test_support::state_with(scripted).await;
        let mut session = test_support::playing(
            RoundType::Sacrifice,
            &["ada", "bob", "cy"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::VolunteersClosed { volunteers: 1 },
                RoundEvent::SpeechSubmitted,
            ],
        );
        let sacrifice = session.rounds[0].sacrifice_mut().unwrap();
        sacrifice.martyr_id = Some("bob".into());
        sacrifice.speech = Some("for the crew".into());
        test_support::seed(&state, session).await;

        judge_round(state.clone(), "ABCD".into(), 1).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let bob = &session.players["bob"];
        assert!(!bob.is_alive);
        assert_eq!(bob.score, MARTYR_BONUS);
        for id in ["ada", "cy"] {
            assert!(session.players[id].is_alive);
            assert_eq!(session.players[id].score, SAVED_POINTS);
        }
        assert_eq!(session.current_round().unwrap().phase, RoundPhase::Results);
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn revived_player_survives_with_points() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let mut session = test_support::playing(
            RoundType::LastStand,
            &["ada", "bob"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::JudgementComplete { mixed: true },
                RoundEvent::RevivalGranted,
            ],
        );
        session.players["ada"].survive("fine".into(), LAST_STAND_POINTS);
        let bob = &mut session.players["bob"];
        bob.strategy = Some("play dead".into());
        bob.is_alive = false;
        bob.judgement_pending = true;
        session.rounds[0].last_stand_mut().unwrap().revival_target = Some("bob".into());
        test_support::seed(&state, session).await;

        judge_round(state.clone(), "ABCD".into(), 1).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert!(session.players["bob"].is_alive);
        assert_eq!(session.players["bob"].score, REVIVAL_POINTS);
        let round = session.current_round().unwrap();
        assert_eq!(round.last_stand().unwrap().revived_id.as_deref(), Some("bob"));
        assert_eq!(round.phase, RoundPhase::Results);
        state.tasks().idle().await;
    }

    #[tokio::test]
    async fn silent_revival_target_is_not_sent_to_the_judge() {
        let scripted = Arc::new(Scripted::default());
        let (state, _clock) = test_support::state_with(scripted.clone()).await;
        let mut session = test_support::playing(
            RoundType::LastStand,
            &["ada", "bob"],
            &[
                RoundEvent::ScenarioReady,
                RoundEvent::StrategiesSubmitted,
                RoundEvent::JudgementComplete { mixed: true },
                RoundEvent::RevivalGranted,
            ],
        );
        session.players["ada"].survive("fine".into(), LAST_STAND_POINTS);
        let bob = &mut session.players["bob"];
        bob.is_alive = false;
        bob.judgement_pending = true;
        let round = &mut session.rounds[0];
        round.timed_out.insert("bob".into());
        round.last_stand_mut().unwrap().revival_target = Some("bob".into());
        test_support::seed(&state, session).await;

        judge_round(state.clone(), "ABCD".into(), 1).await;

        assert_eq!(scripted.judge_calls(), 0);
        let session = optimistic::load(&state, "ABCD").await.unwrap();
        let bob = &session.players["bob"];
        assert!(!bob.is_alive);
        assert_eq!(bob.score, 0);
        assert!(bob.death_reason.is_some());
        let round = session.current_round().unwrap();
        assert!(round.last_stand().unwrap().revived_id.is_none());
        assert_eq!(round.phase, RoundPhase::Results);
        state.tasks().idle().await;
    }
}
