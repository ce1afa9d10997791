//! In-theme substitutes used whenever a collaborator fails, so every phase can still settle.

use rand::seq::IndexedRandom;

use crate::state::session::{PlayerId, RoundType};

use super::{JudgeStyle, Ranking, ScriptTone, Verdict, VideoScript};

const SCENARIOS: &[&str] = &[
    "The floor of the server room gives way and you drop into a flooded cable vault. Something large brushes past your leg.",
    "A swarm of delivery drones has decided you are the package. They are very insistent about the signature.",
    "You wake up strapped to a conveyor belt heading into an industrial cheese grater. The alarm clock next to you reads 6:59.",
    "The elevator stops between floors, the lights go red, and a calm voice announces the oxygen recycling has been cancelled.",
];

const TIMEOUT_NARRATIVES: &[&str] = &[
    "Froze on the spot and became part of the scenery.",
    "Was still drafting a plan when the threat finished its own.",
    "Stood perfectly still hoping it only sees movement. It does not.",
    "Opened their mouth to speak and nothing came out, then nothing else ever did.",
];

const TIMEOUT_IMAGE_PROMPTS: &[&str] = &[
    "a figure frozen mid-step, covered in cobwebs, while chaos unfolds around them",
    "a lone person staring blankly at a blinking cursor as the ceiling collapses",
    "a statue-still character with a speech bubble containing only three dots, seconds before disaster",
];

/// Verdict used when the judge cannot answer.
pub fn verdict(style: &JudgeStyle) -> Verdict {
    let (reason, visual_prompt) = match style {
        JudgeStyle::Survival | JudgeStyle::Cooperative => (
            "The judge's terminal sparked, rebooted and declared the result void. The void was fatal.",
            "a smoking computer terminal showing a red error screen over a dark battlefield",
        ),
        JudgeStyle::LastStand => (
            "The boss did not even need the judge's help. Nobody walks away from this one.",
            "a towering shadow looming over a tiny figure in a ruined arena",
        ),
        JudgeStyle::Revival => (
            "The second chance slipped through the cracks of a crashing server.",
            "a ghostly hand reaching for a closing door of light",
        ),
        JudgeStyle::Sacrifice { .. } => (
            "The final words were lost in static. History will not remember them.",
            "a microphone on an empty stage, feedback lines filling the air",
        ),
    };

    Verdict {
        survived: false,
        reason: reason.to_string(),
        visual_prompt: visual_prompt.to_string(),
    }
}

/// Rankings used when the comparative judge cannot answer: submission order is kept.
pub fn rankings(submissions: &[(PlayerId, String)]) -> Vec<Ranking> {
    submissions
        .iter()
        .enumerate()
        .map(|(idx, (player_id, _))| Ranking {
            player_id: player_id.clone(),
            rank: idx as u32 + 1,
            commentary: "The ranking machine malfunctioned and sorted everyone by arrival time."
                .to_string(),
            visual_prompt: "a broken scoreboard flickering with random numbers".to_string(),
        })
        .collect()
}

/// Scenario used when the writer cannot answer.
pub fn scenario(round_type: RoundType, round_number: u32) -> String {
    let base = SCENARIOS[(round_number as usize).saturating_sub(1) % SCENARIOS.len()];
    match round_type {
        RoundType::LastStand => format!("{base} This time it is personal, and it is enormous."),
        _ => base.to_string(),
    }
}

/// Trap used when a blind architect round ends without any proposal.
pub fn trap() -> String {
    "Nobody designed a trap, so the arena designed one itself: the walls are closing in and they are on fire.".to_string()
}

/// Death narrative for a player who let the deadline pass.
pub fn timeout_narrative() -> String {
    pick(TIMEOUT_NARRATIVES)
}

/// Image prompt for a player who let the deadline pass.
pub fn timeout_image_prompt() -> String {
    pick(TIMEOUT_IMAGE_PROMPTS)
}

/// Narrative for everyone when the martyr never delivered their final words.
pub fn silent_martyr_narrative(martyr_name: &str) -> String {
    format!("{martyr_name} hesitated at the edge. The moment passed, and so did everyone.")
}

/// Narrative for the survivors of an epic sacrifice.
pub fn saved_by_martyr(martyr_name: &str) -> String {
    format!("Saved by {martyr_name}'s sacrifice.")
}

/// Narrative for everyone after a lame sacrifice.
pub fn doomed_by_martyr(martyr_name: &str) -> String {
    format!("{martyr_name}'s last words fell flat and the threat took everyone.")
}

/// Script used when the writer cannot answer.
pub fn video_script(player_name: &str, tone: ScriptTone) -> VideoScript {
    let (scene, dialogue) = match tone {
        ScriptTone::Winner => (
            format!("{player_name} stands on a pile of defeated hazards, confetti raining down"),
            "I planned every single part of that. Mostly.".to_string(),
        ),
        ScriptTone::LastPlace => (
            format!("{player_name} sits in a hospital bed wrapped head to toe in bandages"),
            "Next time I'm reading the rules first.".to_string(),
        ),
        ScriptTone::Middle => (
            format!("{player_name} limps out of the arena holding a participation trophy"),
            "Not first, not last. I'll take it.".to_string(),
        ),
    };
    VideoScript { scene, dialogue }
}

fn pick(options: &[&str]) -> String {
    options
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_verdicts_never_grant_survival() {
        for style in [
            JudgeStyle::Survival,
            JudgeStyle::LastStand,
            JudgeStyle::Revival,
            JudgeStyle::Cooperative,
            JudgeStyle::Sacrifice {
                martyr_name: "ada".into(),
            },
        ] {
            let verdict = verdict(&style);
            assert!(!verdict.survived);
            assert!(!verdict.reason.is_empty());
        }
    }

    #[test]
    fn scenarios_rotate_by_round() {
        assert_ne!(
            scenario(RoundType::Survival, 1),
            scenario(RoundType::Survival, 2)
        );
        assert_eq!(
            scenario(RoundType::Survival, 1),
            scenario(RoundType::Survival, 1 + SCENARIOS.len() as u32)
        );
    }
}
