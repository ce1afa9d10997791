//! Prompt assembly for the text and image collaborators.

use crate::state::session::RoundType;

use super::{ImageKind, JudgeRequest, JudgeStyle, RankRequest, ScenarioRequest, ScriptRequest, VideoScript};

const JSON_VERDICT: &str = r#"Answer with JSON only: {"survived": boolean, "reason": "one or two punchy sentences", "visual_prompt": "one sentence describing the scene for an illustration"}"#;

/// Prompt asking the judge for a single verdict.
pub fn judge(request: &JudgeRequest) -> String {
    let stance = match &request.style {
        JudgeStyle::Survival => {
            "You judge a survival party game. Reward creativity and plausibility, punish lazy or generic answers.".to_string()
        }
        JudgeStyle::LastStand => {
            "You judge the boss round of a survival party game. Be merciless: only a truly brilliant plan survives.".to_string()
        }
        JudgeStyle::Revival => {
            "You judge a second chance in a survival party game. The other survivors vouched for this player; lean slightly towards mercy.".to_string()
        }
        JudgeStyle::Sacrifice { martyr_name } => format!(
            "{martyr_name} volunteered to die so the others may live. Judge whether their final words are epic (survived = true) or lame (survived = false)."
        ),
        JudgeStyle::Cooperative => {
            "You judge a team strategy chosen by vote. If it works, the whole team survives; if it fails, everyone suffers.".to_string()
        }
    };

    format!(
        "{stance}\n\nThreat: {}\nPlayer answer: {}\n\n{JSON_VERDICT}",
        request.scenario, request.submission
    )
}

/// Prompt asking the judge to rank every submission at once.
pub fn rank(request: &RankRequest) -> String {
    let listing = request
        .submissions
        .iter()
        .map(|(player_id, text)| format!("- {player_id}: {text}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You rank survival plans against each other. Only the best plan survives.\n\nThreat: {}\nPlans by player id:\n{listing}\n\n\
         Answer with JSON only: {{\"rankings\": [{{\"player_id\": string, \"rank\": integer starting at 1, \"commentary\": string, \"visual_prompt\": string}}]}} \
         with exactly one entry per player and no shared ranks.",
        request.scenario
    )
}

/// Prompt asking the writer for a round threat.
pub fn scenario(request: &ScenarioRequest) -> String {
    let flavour = match request.round_type {
        RoundType::LastStand => "It is the final boss: huge, personal and nearly unbeatable.",
        RoundType::Cooperative => "The whole group faces it together.",
        RoundType::Sacrifice => "Only someone giving their life can stop it.",
        RoundType::Ranked => "Several escape routes exist but only one can work.",
        RoundType::Survival | RoundType::BlindArchitect => "Anything goes.",
    };
    format!(
        "Write a short, deadly and absurd survival scenario for round {} of a party game, two sentences at most, addressed to the players as \"you\". {flavour} Reply with the scenario text only.",
        request.round_number
    )
}

/// Prompt asking the writer for an end-of-game video script.
pub fn video_script(request: &ScriptRequest) -> String {
    let look = request
        .character_description
        .as_deref()
        .unwrap_or("an ordinary-looking contestant");
    format!(
        "A party game just ended. {} ({look}) finished #{} of {} with {} points; tone: {:?}. \
         Write a ten-second comedic video beat. Answer with JSON only: {{\"scene\": \"visual description of the opening frame\", \"dialogue\": \"one line the character says\"}}",
        request.player_name, request.rank, request.field_size, request.score, request.tone
    )
}

/// Decorate an image description with framing hints and the round theme.
pub fn image(description: &str, kind: ImageKind, theme: &str) -> String {
    let framing = match kind {
        ImageKind::Scenario => "wide establishing shot of an imminent threat",
        ImageKind::Outcome => "dramatic moment of the outcome",
        ImageKind::Trap => "schematic yet menacing view of a trap",
        ImageKind::Strategy => "action shot of a plan being executed",
        ImageKind::Character => "character portrait, centered, plain background",
        ImageKind::VideoFrame => "cinematic still, 16:9, character in frame",
    };
    if theme.is_empty() {
        format!("{description}, {framing}")
    } else {
        format!("{description}, {framing}, {theme} style")
    }
}

/// Text prompt handed to the video renderer.
pub fn video(script: &VideoScript) -> String {
    format!(
        "{}. The character looks into the camera and says: \"{}\"",
        script.scene, script.dialogue
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_prompt_carries_theme() {
        let prompt = image("a shark in a bathtub", ImageKind::Scenario, "claymation diorama");
        assert!(prompt.starts_with("a shark in a bathtub"));
        assert!(prompt.ends_with("claymation diorama style"));
    }

    #[test]
    fn sacrifice_prompt_names_the_martyr() {
        let prompt = judge(&JudgeRequest {
            scenario: "meteor".into(),
            submission: "tell my cat".into(),
            style: JudgeStyle::Sacrifice {
                martyr_name: "Ada".into(),
            },
            theme: String::new(),
        });
        assert!(prompt.contains("Ada volunteered"));
        assert!(prompt.contains("tell my cat"));
    }
}
