//! Application-level configuration loading: game rules, phase timeouts, retry tuning and
//! collaborator time budgets.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::session::RoundType;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SURVAIVE_BACK_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
///
/// Every section falls back to its built-in defaults when omitted from the file, so a partial
/// JSON document only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session shape: round count, player cap, round-type rotation and visual themes.
    pub game: GameConfig,
    /// Phase timeouts enforced by the timeout scheduler.
    pub timeouts: TimeoutConfig,
    /// Tuning of the optimistic update engine.
    pub retry: RetryConfig,
    /// Time budgets granted to external collaborators.
    pub providers: ProviderConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        max_rounds = config.game.max_rounds,
                        round_types = config.game.round_sequence.len(),
                        "loaded application config"
                    );
                    config.sanitized()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Replace values that would make the game unplayable with their defaults.
    fn sanitized(mut self) -> Self {
        let defaults = GameConfig::default();
        if self.game.round_sequence.is_empty() {
            warn!("configured round sequence is empty; using default rotation");
            self.game.round_sequence = defaults.round_sequence;
        }
        if self.game.style_themes.is_empty() {
            self.game.style_themes = defaults.style_themes;
        }
        if self.game.max_rounds == 0 {
            self.game.max_rounds = defaults.max_rounds;
        }
        if self.retry.max_attempts == 0 {
            self.retry.max_attempts = RetryConfig::default().max_attempts;
        }
        self
    }
}

/// Session-shape settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of rounds played before the session finishes.
    pub max_rounds: usize,
    /// Maximum number of players allowed to join one session.
    pub max_players: usize,
    /// Round types played in order; cycled when shorter than `max_rounds`.
    pub round_sequence: Vec<RoundType>,
    /// Visual themes drawn once per round and applied to every image prompt of that round.
    pub style_themes: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rounds: 6,
            max_players: 8,
            round_sequence: vec![
                RoundType::Survival,
                RoundType::BlindArchitect,
                RoundType::Cooperative,
                RoundType::Sacrifice,
                RoundType::Ranked,
                RoundType::LastStand,
            ],
            style_themes: [
                "pixel art, 16-bit palette",
                "retro anime cel shading",
                "gritty graphic novel ink",
                "claymation diorama",
                "neon synthwave",
                "watercolor storybook",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Per-phase timeouts, all expressed in seconds in the JSON file.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Strategy and trap submissions.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "submission_seconds")]
    pub submission: Duration,
    /// Sacrifice volunteering window.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "volunteer_seconds")]
    pub volunteer: Duration,
    /// Martyr's final words.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "sacrifice_submission_seconds")]
    pub sacrifice_speech: Duration,
    /// Every voting phase (trap, cooperative, sacrifice, revival).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "voting_seconds")]
    pub voting: Duration,
    /// Age after which a judgement phase with no running task is considered abandoned.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "stuck_judgement_seconds")]
    pub stuck_judgement: Duration,
    /// Minimum interval between two persisted heartbeats of the same player.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "heartbeat_throttle_seconds")]
    pub heartbeat_throttle: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            submission: Duration::from_secs(90),
            volunteer: Duration::from_secs(30),
            sacrifice_speech: Duration::from_secs(45),
            voting: Duration::from_secs(45),
            stuck_judgement: Duration::from_secs(90),
            heartbeat_throttle: Duration::from_secs(10),
        }
    }
}

/// Optimistic update engine tuning, delays expressed in milliseconds.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts before surfacing a concurrent-modification failure.
    pub max_attempts: u32,
    /// Base backoff, doubled on every failed verification.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "base_delay_ms")]
    pub base_delay: Duration,
    /// Backoff ceiling.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Lower bound of the randomized pause between write and verification read.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "verify_delay_min_ms")]
    pub verify_delay_min: Duration,
    /// Upper bound of the randomized pause between write and verification read.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "verify_delay_max_ms")]
    pub verify_delay_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            verify_delay_min: Duration::from_millis(20),
            verify_delay_max: Duration::from_millis(80),
        }
    }
}

/// Time budgets for external collaborators, expressed in seconds.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Judge calls (single and ranked).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "judge_timeout_seconds")]
    pub judge_timeout: Duration,
    /// Scenario and video-script generation.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "text_timeout_seconds")]
    pub text_timeout: Duration,
    /// Image generation.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "image_timeout_seconds")]
    pub image_timeout: Duration,
    /// Video job submission and each status poll.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "video_request_timeout_seconds")]
    pub video_request_timeout: Duration,
    /// Interval between two polls of the same video job.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "video_poll_interval_ms")]
    pub video_poll_interval: Duration,
    /// Maximum time spent waiting for one video job.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "video_max_wait_seconds")]
    pub video_max_wait: Duration,
    /// Age after which a `generating` media run may be restarted by a client.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "media_stuck_after_seconds")]
    pub media_stuck_after: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            judge_timeout: Duration::from_secs(45),
            text_timeout: Duration::from_secs(20),
            image_timeout: Duration::from_secs(60),
            video_request_timeout: Duration::from_secs(30),
            video_poll_interval: Duration::from_secs(5),
            video_max_wait: Duration::from_secs(300),
            media_stuck_after: Duration::from_secs(20 * 60),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_other_defaults() {
        let raw = r#"{ "timeouts": { "submission_seconds": 30 }, "game": { "max_rounds": 3 } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.timeouts.submission, Duration::from_secs(30));
        assert_eq!(config.timeouts.sacrifice_speech, Duration::from_secs(45));
        assert_eq!(config.game.max_rounds, 3);
        assert_eq!(config.game.max_players, 8);
        assert_eq!(config.retry.max_attempts, 10);
    }

    #[test]
    fn millisecond_fields_are_parsed() {
        let raw = r#"{ "retry": { "base_delay_ms": 5, "verify_delay_max_ms": 7 } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.retry.base_delay, Duration::from_millis(5));
        assert_eq!(config.retry.verify_delay_max, Duration::from_millis(7));
    }

    #[test]
    fn empty_rotation_is_replaced() {
        let raw = r#"{ "game": { "round_sequence": [], "max_rounds": 0 } }"#;
        let config = serde_json::from_str::<AppConfig>(raw).unwrap().sanitized();

        assert_eq!(config.game.round_sequence.len(), 6);
        assert_eq!(config.game.max_rounds, 6);
    }
}
