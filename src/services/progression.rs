//! Completeness rules: decide when the current round leaves its phase and what background work
//! the transition requires.
//!
//! [`settle`] is pure and synchronous. It runs inside an optimistic-update mutator, so it may be
//! evaluated several times on different snapshots; only the attempt whose write is verified gets
//! its [`FollowUp`]s dispatched. Every transition is stamped with the writer's token, which is how
//! the writer later recognises that *its* transition won.

use std::time::SystemTime;

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    providers::fallback,
    state::{
        round_machine::{RoundEvent, RoundPhase},
        session::{PlayerId, RoundType, Session},
    },
};

/// Bonus granted to the author of the trap that became the scenario.
pub const ARCHITECT_BONUS: i64 = 500;

/// Whether the phase deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Only close the phase once every expected player acted.
    Natural,
    /// Deadline passed: close the current phase with whatever input exists.
    Forced,
}

/// Background work requested by a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Judge one player right after their submission.
    JudgeEarly {
        /// Round number.
        round: u32,
        /// Submitting player.
        player_id: PlayerId,
    },
    /// Drive the judgement phase the round is in.
    JudgeRound {
        /// Round number.
        round: u32,
    },
    /// Write the scenario of a round waiting in the scenario phase.
    WriteScenario {
        /// Round number.
        round: u32,
    },
    /// Illustrate the round's scenario.
    IllustrateScenario {
        /// Round number.
        round: u32,
    },
    /// Illustrate one trap proposal.
    IllustrateTrap {
        /// Round number.
        round: u32,
        /// Trap author.
        player_id: PlayerId,
    },
    /// Illustrate every cooperative strategy up for vote.
    IllustrateStrategies {
        /// Round number.
        round: u32,
    },
    /// Illustrate an outcome from its visual prompt; every listed player shares the image.
    IllustrateOutcome {
        /// Round number.
        round: u32,
        /// Judged players.
        player_ids: Vec<PlayerId>,
        /// Scene description.
        prompt: String,
    },
    /// Illustrate a player's death by inaction.
    IllustrateTimeout {
        /// Round number.
        round: u32,
        /// Silent player.
        player_id: PlayerId,
    },
    /// Generate a player portrait.
    Portrait {
        /// Portrayed player.
        player_id: PlayerId,
    },
    /// Fill the scenario cache for every configured round.
    PrewarmScenarios,
    /// Run the end-of-game media pipeline.
    Media {
        /// Run allowed to write results.
        run_id: Uuid,
    },
}

/// Result of [`settle`].
#[derive(Debug, Default)]
pub struct Settled {
    /// Work to dispatch once the write is verified.
    pub followups: Vec<FollowUp>,
    /// Number of phase changes performed.
    pub transitions: u32,
}

impl Settled {
    /// Whether the round changed phase.
    pub fn transitioned(&self) -> bool {
        self.transitions > 0
    }
}

/// Advance the current round through every phase whose completeness condition holds.
///
/// `Forced` only applies to the phase the round is in when called; phases entered afterwards
/// close naturally.
pub fn settle(
    session: &mut Session,
    now: SystemTime,
    token: Uuid,
    pace: Pace,
) -> Result<Settled, ServiceError> {
    let mut settled = Settled::default();
    let Some(idx) = session.current_round_idx.filter(|idx| *idx < session.rounds.len()) else {
        return Ok(settled);
    };

    let mut pace = pace;
    while let Some(followups) = step(session, idx, pace, now, token)? {
        settled.followups.extend(followups);
        settled.transitions += 1;
        pace = Pace::Natural;
    }
    Ok(settled)
}

type Step = Result<Option<Vec<FollowUp>>, ServiceError>;

fn step(session: &mut Session, idx: usize, pace: Pace, now: SystemTime, token: Uuid) -> Step {
    match session.rounds[idx].phase {
        RoundPhase::Scenario | RoundPhase::Results => Ok(None),
        RoundPhase::Strategy => close_strategies(session, idx, pace, now, token),
        RoundPhase::TrapCreation => close_traps(session, idx, pace, now, token),
        RoundPhase::TrapVoting => tally_traps(session, idx, pace, now, token),
        RoundPhase::CoopVoting => tally_coop(session, idx, pace, now, token),
        RoundPhase::SacrificeVolunteer => close_volunteers(session, idx, pace, now, token),
        RoundPhase::SacrificeVoting => tally_martyr(session, idx, pace, now, token),
        RoundPhase::SacrificeSubmission => close_speech(session, idx, pace, now, token),
        RoundPhase::LastStandRevival => tally_revival(session, idx, pace, now, token),
        RoundPhase::Judgement
        | RoundPhase::CoopJudgement
        | RoundPhase::SacrificeJudgement
        | RoundPhase::RankedJudgement
        | RoundPhase::RevivalJudgement => close_judgement(session, idx, now, token),
    }
}

/// Alive lobby players with nothing submitted and no judgement in flight.
fn silent_players(session: &Session) -> Vec<PlayerId> {
    session
        .participants()
        .filter(|p| p.is_alive && p.strategy.is_none() && !p.judgement_pending && !p.has_outcome())
        .map(|p| p.id.clone())
        .collect()
}

fn close_strategies(
    session: &mut Session,
    idx: usize,
    pace: Pace,
    now: SystemTime,
    token: Uuid,
) -> Step {
    let silent = silent_players(session);
    if !silent.is_empty() && pace == Pace::Natural {
        return Ok(None);
    }

    let number = session.rounds[idx].number;
    let mut followups = Vec::new();
    for player_id in silent {
        if let Some(player) = session.players.get_mut(&player_id) {
            player.die(fallback::timeout_narrative());
        }
        session.rounds[idx].timed_out.insert(player_id.clone());
        followups.push(FollowUp::IllustrateTimeout {
            round: number,
            player_id,
        });
    }

    let round_type = session.rounds[idx].round_type();
    session.rounds[idx].apply(RoundEvent::StrategiesSubmitted, now, token)?;

    match round_type {
        RoundType::Cooperative => followups.push(FollowUp::IllustrateStrategies { round: number }),
        _ if needs_judging(session) => followups.push(FollowUp::JudgeRound { round: number }),
        _ => {}
    }
    Ok(Some(followups))
}

/// Some lobby player still lacks an outcome and nobody is judging them.
fn needs_judging(session: &Session) -> bool {
    session
        .participants()
        .any(|p| !p.has_outcome() && !p.judgement_pending)
}

fn close_traps(session: &mut Session, idx: usize, pace: Pace, now: SystemTime, token: Uuid) -> Step {
    let active = session.active_ids();
    let Some(architect) = session.rounds[idx].architect() else {
        return Ok(None);
    };
    let all_in = active.iter().all(|id| architect.proposals.contains_key(id));
    if !all_in && pace == Pace::Natural {
        return Ok(None);
    }

    let authors: Vec<PlayerId> = architect.proposals.keys().cloned().collect();
    match authors.as_slice() {
        [] => choose_trap(session, idx, None, now, token),
        [only] => choose_trap(session, idx, Some(only.clone()), now, token),
        _ => {
            session.rounds[idx].apply(RoundEvent::TrapsSubmitted, now, token)?;
            Ok(Some(Vec::new()))
        }
    }
}

fn tally_traps(session: &mut Session, idx: usize, pace: Pace, now: SystemTime, token: Uuid) -> Step {
    let Some(architect) = session.rounds[idx].architect() else {
        return Ok(None);
    };
    let candidates: Vec<PlayerId> = architect.proposals.keys().cloned().collect();
    if !voting_closed(session, &candidates, &architect.votes, pace) {
        return Ok(None);
    }

    let winner = plurality(architect.votes.values(), &candidates).or_else(|| random(&candidates));
    choose_trap(session, idx, winner, now, token)
}

/// Make `author`'s trap (or the built-in one) the scenario and start the strategy phase.
fn choose_trap(
    session: &mut Session,
    idx: usize,
    author: Option<PlayerId>,
    now: SystemTime,
    token: Uuid,
) -> Step {
    let round = &mut session.rounds[idx];
    let number = round.number;
    let Some(architect) = round.architect_mut() else {
        return Ok(None);
    };

    let chosen = author.as_ref().and_then(|id| {
        architect
            .proposals
            .get(id)
            .map(|text| (text.clone(), architect.proposal_images.get(id).cloned()))
    });
    let (text, image) = chosen.clone().unwrap_or_else(|| (fallback::trap(), None));
    architect.architect_id = chosen.is_some().then(|| author.clone()).flatten();
    round.scenario_text = text;
    round.scenario_image_url = image;
    round.apply(RoundEvent::TrapChosen, now, token)?;

    let mut followups = Vec::new();
    match round.architect().and_then(|a| a.architect_id.clone()) {
        Some(architect_id) => {
            if let Some(player) = session.players.get_mut(&architect_id) {
                player.score += ARCHITECT_BONUS;
            }
        }
        None => followups.push(FollowUp::IllustrateScenario { round: number }),
    }
    Ok(Some(followups))
}

/// Cooperative rank rewards: first +200, second +100, last -100, everyone in between 0.
pub fn coop_rewards(candidates: usize) -> Vec<i64> {
    match candidates {
        0 => Vec::new(),
        1 => vec![200],
        2 => vec![200, -100],
        n => {
            let mut rewards = vec![0; n];
            rewards[0] = 200;
            rewards[1] = 100;
            rewards[n - 1] = -100;
            rewards
        }
    }
}

fn tally_coop(session: &mut Session, idx: usize, pace: Pace, now: SystemTime, token: Uuid) -> Step {
    let candidates: Vec<PlayerId> = session
        .participants()
        .filter(|p| p.strategy.is_some())
        .map(|p| p.id.clone())
        .collect();
    let number = session.rounds[idx].number;
    let Some(coop) = session.rounds[idx].coop() else {
        return Ok(None);
    };
    if !voting_closed(session, &candidates, &coop.votes, pace) {
        return Ok(None);
    }

    let mut counts: IndexMap<PlayerId, usize> =
        candidates.iter().map(|id| (id.clone(), 0)).collect();
    for target in coop.votes.values() {
        if let Some(count) = counts.get_mut(target) {
            *count += 1;
        }
    }
    if counts.values().all(|count| *count == 0) {
        if let Some(pick) = random(&candidates) {
            counts.insert(pick, 1);
        }
    }

    let mut order: Vec<(PlayerId, usize)> = counts.into_iter().collect();
    // Stable: equal counts keep join order.
    order.sort_by(|a, b| b.1.cmp(&a.1));
    let rewards = coop_rewards(order.len());

    let round = &mut session.rounds[idx];
    let Some(coop) = round.coop_mut() else {
        return Ok(None);
    };
    for ((player_id, _), points) in order.iter().zip(rewards) {
        coop.points.insert(player_id.clone(), points);
        if let Some(player) = session.players.get_mut(player_id) {
            player.score += points;
        }
    }
    coop.winning_strategy_id = order.first().map(|(id, _)| id.clone());
    let has_winner = coop.winning_strategy_id.is_some();
    round.apply(RoundEvent::CoopVotesTallied, now, token)?;

    Ok(Some(if has_winner {
        vec![FollowUp::JudgeRound { round: number }]
    } else {
        Vec::new()
    }))
}

fn close_volunteers(
    session: &mut Session,
    idx: usize,
    pace: Pace,
    now: SystemTime,
    token: Uuid,
) -> Step {
    let active = session.active_ids();
    let Some(sacrifice) = session.rounds[idx].sacrifice() else {
        return Ok(None);
    };
    let volunteers: Vec<PlayerId> = sacrifice
        .volunteers
        .iter()
        .filter(|id| active.contains(id))
        .cloned()
        .collect();
    let everyone = !active.is_empty() && volunteers.len() == active.len();
    if !everyone && pace == Pace::Natural {
        return Ok(None);
    }

    // Cowards get drafted.
    let martyr = match volunteers.as_slice() {
        [] => match random(&active) {
            Some(drafted) => Some(drafted),
            None => return Ok(None),
        },
        [only] => Some(only.clone()),
        _ => None,
    };

    let round = &mut session.rounds[idx];
    if let Some(sacrifice) = round.sacrifice_mut() {
        sacrifice.martyr_id = martyr;
    }
    round.apply(
        RoundEvent::VolunteersClosed {
            volunteers: volunteers.len(),
        },
        now,
        token,
    )?;
    Ok(Some(Vec::new()))
}

fn tally_martyr(session: &mut Session, idx: usize, pace: Pace, now: SystemTime, token: Uuid) -> Step {
    let active = session.active_ids();
    let Some(sacrifice) = session.rounds[idx].sacrifice() else {
        return Ok(None);
    };
    let candidates: Vec<PlayerId> = sacrifice
        .volunteers
        .iter()
        .filter(|id| active.contains(id))
        .cloned()
        .collect();
    if !voting_closed(session, &candidates, &sacrifice.votes, pace) {
        return Ok(None);
    }

    let martyr = plurality(sacrifice.votes.values(), &candidates)
        .or_else(|| random(&candidates))
        .or_else(|| random(&active));
    let round = &mut session.rounds[idx];
    if let Some(sacrifice) = round.sacrifice_mut() {
        sacrifice.martyr_id = martyr;
    }
    round.apply(RoundEvent::MartyrChosen, now, token)?;
    Ok(Some(Vec::new()))
}

fn close_speech(session: &mut Session, idx: usize, pace: Pace, now: SystemTime, token: Uuid) -> Step {
    let number = session.rounds[idx].number;
    let Some(sacrifice) = session.rounds[idx].sacrifice() else {
        return Ok(None);
    };

    if sacrifice.speech.is_some() {
        session.rounds[idx].apply(RoundEvent::SpeechSubmitted, now, token)?;
        return Ok(Some(vec![FollowUp::JudgeRound { round: number }]));
    }
    if pace == Pace::Natural {
        return Ok(None);
    }

    let martyr_name = sacrifice
        .martyr_id
        .as_ref()
        .and_then(|id| session.players.get(id))
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "The martyr".to_string());

    let mut followups = Vec::new();
    for player_id in session.active_ids() {
        if let Some(player) = session.players.get_mut(&player_id) {
            player.die(fallback::silent_martyr_narrative(&martyr_name));
        }
        session.rounds[idx].timed_out.insert(player_id.clone());
        followups.push(FollowUp::IllustrateTimeout {
            round: number,
            player_id,
        });
    }
    session.rounds[idx].apply(RoundEvent::SpeechTimedOut, now, token)?;
    Ok(Some(followups))
}

fn tally_revival(
    session: &mut Session,
    idx: usize,
    pace: Pace,
    now: SystemTime,
    token: Uuid,
) -> Step {
    let voters = session.active_ids();
    let casualties: Vec<PlayerId> = session
        .participants()
        .filter(|p| !p.is_alive)
        .map(|p| p.id.clone())
        .collect();
    let number = session.rounds[idx].number;
    let Some(last_stand) = session.rounds[idx].last_stand() else {
        return Ok(None);
    };

    let all_voted = voters.iter().all(|id| last_stand.revival_votes.contains_key(id));
    if !all_voted && pace == Pace::Natural {
        return Ok(None);
    }

    let mut targets = voters
        .iter()
        .filter_map(|id| last_stand.revival_votes.get(id));
    let unanimous = match (all_voted, targets.next()) {
        (true, Some(first)) if targets.all(|t| t == first) && casualties.contains(first) => {
            Some(first.clone())
        }
        _ => None,
    };

    let round = &mut session.rounds[idx];
    let Some(target) = unanimous else {
        round.apply(RoundEvent::RevivalDeclined, now, token)?;
        return Ok(Some(Vec::new()));
    };

    if let Some(last_stand) = round.last_stand_mut() {
        last_stand.revival_target = Some(target.clone());
    }
    round.apply(RoundEvent::RevivalGranted, now, token)?;
    if let Some(player) = session.players.get_mut(&target) {
        player.death_reason = None;
        player.result_image_url = None;
        player.judgement_pending = true;
    }
    Ok(Some(vec![FollowUp::JudgeRound { round: number }]))
}

fn close_judgement(session: &mut Session, idx: usize, now: SystemTime, token: Uuid) -> Step {
    let done = session
        .participants()
        .all(|p| p.has_outcome() && !p.judgement_pending);
    if !done {
        return Ok(None);
    }

    let survivors = session.participants().filter(|p| p.is_alive).count();
    let casualties = session.participants().filter(|p| !p.is_alive).count();
    session.rounds[idx].apply(
        RoundEvent::JudgementComplete {
            mixed: survivors > 0 && casualties > 0,
        },
        now,
        token,
    )?;
    Ok(Some(Vec::new()))
}

/// Active players who have at least one candidate other than themselves to vote for.
pub fn eligible_voters(session: &Session, candidates: &[PlayerId]) -> Vec<PlayerId> {
    session
        .active_ids()
        .into_iter()
        .filter(|voter| candidates.iter().any(|candidate| candidate != voter))
        .collect()
}

fn voting_closed(
    session: &Session,
    candidates: &[PlayerId],
    votes: &IndexMap<PlayerId, PlayerId>,
    pace: Pace,
) -> bool {
    pace == Pace::Forced
        || eligible_voters(session, candidates)
            .iter()
            .all(|voter| votes.contains_key(voter))
}

/// Most voted candidate; ties go to the candidate that received a vote first.
pub fn plurality<'a>(
    votes: impl IntoIterator<Item = &'a PlayerId>,
    candidates: &[PlayerId],
) -> Option<PlayerId> {
    let mut counts: IndexMap<&PlayerId, usize> = IndexMap::new();
    for target in votes {
        if candidates.contains(target) {
            *counts.entry(target).or_default() += 1;
        }
    }

    let mut best: Option<(&PlayerId, usize)> = None;
    for (target, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((target, count));
        }
    }
    best.map(|(target, _)| target.clone())
}

fn random(ids: &[PlayerId]) -> Option<PlayerId> {
    ids.choose(&mut rand::rng()).cloned()
}
