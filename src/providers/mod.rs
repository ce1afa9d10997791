//! External collaborators: judge, text writer, image generator and video service.
//!
//! The core only sees the traits below. [`Providers`] wraps them with the configured time budgets
//! and substitutes an in-theme fallback whenever a call fails, so callers never handle provider
//! errors themselves.

pub mod disabled;
#[cfg(feature = "http-providers")]
pub mod fal;
pub mod fallback;
#[cfg(feature = "http-providers")]
pub mod openai;
pub mod prompts;

use std::{error::Error, future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::{
    config::ProviderConfig,
    state::session::{PlayerId, RoundType},
};

use self::disabled::DisabledProvider;

/// Result alias for collaborator calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure of a collaborator call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No implementation is configured for this collaborator.
    #[error("{0} provider is not configured")]
    Disabled(&'static str),
    /// The request could not be sent or its body could not be read.
    #[error("request to `{endpoint}` failed")]
    Http {
        /// Called endpoint.
        endpoint: String,
        /// Transport failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The collaborator answered with a non-success status.
    #[error("`{endpoint}` answered with status {status}")]
    Status {
        /// Called endpoint.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },
    /// The answer did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
    /// The call exceeded its time budget.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

/// Judge tone for a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeStyle {
    /// Regular survival judgement.
    Survival,
    /// Boss round: most submissions should fail.
    LastStand,
    /// Second chance after a unanimous revival vote: slightly lenient.
    Revival,
    /// Final words of a martyr: survived means "epic".
    Sacrifice {
        /// Martyr display name.
        martyr_name: String,
    },
    /// Winning cooperative strategy judged for the whole team.
    Cooperative,
}

/// Single submission to evaluate.
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    /// Threat of the round.
    pub scenario: String,
    /// Player text.
    pub submission: String,
    /// Judge tone.
    pub style: JudgeStyle,
    /// Visual theme of the round.
    pub theme: String,
}

/// Outcome of a single judgement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verdict {
    /// Whether the player made it.
    pub survived: bool,
    /// Narrative shown to players.
    pub reason: String,
    /// Scene description for the outcome illustration.
    #[serde(default)]
    pub visual_prompt: String,
}

/// Every strategy of a ranked round, judged comparatively in one call.
#[derive(Debug, Clone)]
pub struct RankRequest {
    /// Threat of the round.
    pub scenario: String,
    /// Submissions in player order.
    pub submissions: Vec<(PlayerId, String)>,
    /// Visual theme of the round.
    pub theme: String,
}

/// One line of a comparative judgement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ranking {
    /// Ranked player.
    pub player_id: PlayerId,
    /// Position, 1 being the best.
    pub rank: u32,
    /// Narrative shown to players.
    pub commentary: String,
    /// Scene description for the outcome illustration.
    #[serde(default)]
    pub visual_prompt: String,
}

/// Scenario to write ahead of a round.
#[derive(Debug, Clone)]
pub struct ScenarioRequest {
    /// Round number.
    pub round_number: u32,
    /// Round type.
    pub round_type: RoundType,
}

/// Tone of a player's end-of-game video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptTone {
    /// Highest final score.
    Winner,
    /// Lowest final score.
    LastPlace,
    /// Everyone else.
    Middle,
}

/// Input of the end-of-game script writer.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    /// Player display name.
    pub player_name: String,
    /// Free-text look of the player, if any.
    pub character_description: Option<String>,
    /// Final position, 1 being the winner.
    pub rank: usize,
    /// Number of ranked players.
    pub field_size: usize,
    /// Final score.
    pub score: i64,
    /// Tone derived from the rank.
    pub tone: ScriptTone,
}

/// Scene and line of dialogue for one end-of-game video.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoScript {
    /// Visual description of the opening frame.
    pub scene: String,
    /// What the character says.
    pub dialogue: String,
}

/// What an image is for; decides framing hints in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Round threat.
    Scenario,
    /// Player outcome (survival, death, timeout).
    Outcome,
    /// Trap proposal.
    Trap,
    /// Cooperative strategy proposal.
    Strategy,
    /// Player portrait.
    Character,
    /// First frame of an end-of-game video.
    VideoFrame,
}

/// State of a render job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Still queued or rendering.
    Pending,
    /// Finished; carries the media reference.
    Done(String),
    /// Rendering failed.
    Failed,
}

/// Judges single submissions and ranks batches.
pub trait Judge: Send + Sync {
    /// Judge one submission on its own.
    fn judge(&self, request: JudgeRequest) -> BoxFuture<'static, ProviderResult<Verdict>>;
    /// Rank every submission of a ranked round.
    fn rank(&self, request: RankRequest) -> BoxFuture<'static, ProviderResult<Vec<Ranking>>>;
}

/// Fast text model used for scenarios and video scripts.
pub trait TextWriter: Send + Sync {
    /// Write the threat of a round.
    fn scenario(&self, request: ScenarioRequest) -> BoxFuture<'static, ProviderResult<String>>;
    /// Write the script of a player's end-of-game video.
    fn video_script(
        &self,
        request: ScriptRequest,
    ) -> BoxFuture<'static, ProviderResult<VideoScript>>;
}

/// Synchronous image generation.
pub trait MediaGenerator: Send + Sync {
    /// Generate an image and return its URL.
    fn image(&self, prompt: String, kind: ImageKind) -> BoxFuture<'static, ProviderResult<String>>;
}

/// Queue-based video rendering.
pub trait VideoService: Send + Sync {
    /// Submit a render job and return its handle.
    fn submit(&self, prompt: String, image_url: String)
    -> BoxFuture<'static, ProviderResult<String>>;
    /// Query the state of a render job.
    fn poll(&self, job_id: String) -> BoxFuture<'static, ProviderResult<JobStatus>>;
}

/// Collaborators wrapped with time budgets and fallbacks.
#[derive(Clone)]
pub struct Providers {
    judge: Arc<dyn Judge>,
    writer: Arc<dyn TextWriter>,
    media: Arc<dyn MediaGenerator>,
    video: Arc<dyn VideoService>,
    budgets: ProviderConfig,
}

impl Providers {
    /// Assemble explicit collaborators.
    pub fn new(
        judge: Arc<dyn Judge>,
        writer: Arc<dyn TextWriter>,
        media: Arc<dyn MediaGenerator>,
        video: Arc<dyn VideoService>,
        budgets: ProviderConfig,
    ) -> Self {
        Self {
            judge,
            writer,
            media,
            video,
            budgets,
        }
    }

    /// Every call fails immediately and resolves to its fallback.
    pub fn disabled(budgets: ProviderConfig) -> Self {
        let disabled = Arc::new(DisabledProvider);
        Self::new(
            disabled.clone(),
            disabled.clone(),
            disabled.clone(),
            disabled,
            budgets,
        )
    }

    /// Build HTTP collaborators from the environment, disabling the ones without credentials.
    pub fn from_env(budgets: ProviderConfig) -> Self {
        #[allow(unused_mut)]
        let mut providers = Self::disabled(budgets);

        #[cfg(feature = "http-providers")]
        {
            match openai::OpenAiClient::from_env() {
                Ok(Some(client)) => {
                    info!(model = client.model(), "text collaborator enabled");
                    let client = Arc::new(client);
                    providers.judge = client.clone();
                    providers.writer = client;
                }
                Ok(None) => info!("LLM_API_KEY not set; judge and writer run on fallbacks"),
                Err(err) => warn!(error = %err, "failed to build text collaborator"),
            }
            match fal::FalClient::from_env() {
                Ok(Some(client)) => {
                    info!("media collaborator enabled");
                    let client = Arc::new(client);
                    providers.media = client.clone();
                    providers.video = client;
                }
                Ok(None) => info!("FAL_KEY not set; images and videos are disabled"),
                Err(err) => warn!(error = %err, "failed to build media collaborator"),
            }
        }

        #[cfg(not(feature = "http-providers"))]
        info!("built without http-providers; every collaborator runs on fallbacks");

        providers
    }

    /// Configured time budgets.
    pub fn budgets(&self) -> &ProviderConfig {
        &self.budgets
    }

    /// Judge one submission; never fails.
    pub async fn judge(&self, request: JudgeRequest) -> Verdict {
        let style = request.style.clone();
        match guarded(self.budgets.judge_timeout, self.judge.judge(request)).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(error = %err, style = ?style, "judge failed; using fallback verdict");
                fallback::verdict(&style)
            }
        }
    }

    /// Rank a batch; an empty result means the caller must fall back.
    pub async fn rank(&self, request: RankRequest) -> Vec<Ranking> {
        let submissions = request.submissions.clone();
        match guarded(self.budgets.judge_timeout, self.judge.rank(request)).await {
            Ok(rankings) => rankings,
            Err(err) => {
                warn!(error = %err, "ranked judge failed; keeping submission order");
                fallback::rankings(&submissions)
            }
        }
    }

    /// Write a scenario; never fails.
    pub async fn scenario(&self, request: ScenarioRequest) -> String {
        let (number, round_type) = (request.round_number, request.round_type);
        match guarded(self.budgets.text_timeout, self.writer.scenario(request)).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(round = number, "scenario writer returned nothing; using fallback");
                fallback::scenario(round_type, number)
            }
            Err(err) => {
                warn!(round = number, error = %err, "scenario writer failed; using fallback");
                fallback::scenario(round_type, number)
            }
        }
    }

    /// Write a video script; `None` when the writer failed.
    pub async fn video_script(&self, request: ScriptRequest) -> Option<VideoScript> {
        let player = request.player_name.clone();
        match guarded(self.budgets.text_timeout, self.writer.video_script(request)).await {
            Ok(script) => Some(script),
            Err(err) => {
                warn!(player = %player, error = %err, "script writer failed");
                None
            }
        }
    }

    /// Generate an image; `None` when the generator failed.
    pub async fn image(&self, prompt: String, kind: ImageKind) -> Option<String> {
        match guarded(self.budgets.image_timeout, self.media.image(prompt, kind)).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(kind = ?kind, error = %err, "image generation failed");
                None
            }
        }
    }

    /// Submit a render job; `None` when the submission failed.
    pub async fn submit_video(&self, prompt: String, image_url: String) -> Option<String> {
        match guarded(
            self.budgets.video_request_timeout,
            self.video.submit(prompt, image_url),
        )
        .await
        {
            Ok(job_id) => Some(job_id),
            Err(err) => {
                warn!(error = %err, "video submission failed");
                None
            }
        }
    }

    /// Poll a render job; transport failures count as "still pending".
    pub async fn poll_video(&self, job_id: String) -> JobStatus {
        match guarded(self.budgets.video_request_timeout, self.video.poll(job_id.clone())).await {
            Ok(status) => status,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "video poll failed; will retry");
                JobStatus::Pending
            }
        }
    }
}

async fn guarded<T>(
    budget: Duration,
    call: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    match timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(budget)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowJudge;

    impl Judge for SlowJudge {
        fn judge(&self, _request: JudgeRequest) -> BoxFuture<'static, ProviderResult<Verdict>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Verdict {
                    survived: true,
                    reason: "too late".into(),
                    visual_prompt: String::new(),
                })
            })
        }

        fn rank(&self, _request: RankRequest) -> BoxFuture<'static, ProviderResult<Vec<Ranking>>> {
            Box::pin(async { Err(ProviderError::Decode("no".into())) })
        }
    }

    fn budgets() -> ProviderConfig {
        ProviderConfig {
            judge_timeout: Duration::from_millis(20),
            ..ProviderConfig::default()
        }
    }

    #[tokio::test]
    async fn slow_judge_resolves_to_fallback() {
        let disabled = Arc::new(DisabledProvider);
        let providers = Providers::new(
            Arc::new(SlowJudge),
            disabled.clone(),
            disabled.clone(),
            disabled,
            budgets(),
        );

        let verdict = providers
            .judge(JudgeRequest {
                scenario: "lava".into(),
                submission: "jump".into(),
                style: JudgeStyle::Survival,
                theme: "ink".into(),
            })
            .await;

        assert_eq!(verdict, fallback::verdict(&JudgeStyle::Survival));
    }

    #[tokio::test]
    async fn failed_ranking_keeps_submission_order() {
        let disabled = Arc::new(DisabledProvider);
        let providers = Providers::new(
            Arc::new(SlowJudge),
            disabled.clone(),
            disabled.clone(),
            disabled,
            budgets(),
        );

        let rankings = providers
            .rank(RankRequest {
                scenario: "lava".into(),
                submissions: vec![("a".into(), "x".into()), ("b".into(), "y".into())],
                theme: "ink".into(),
            })
            .await;

        let order: Vec<_> = rankings.iter().map(|r| (r.player_id.as_str(), r.rank)).collect();
        assert_eq!(order, vec![("a", 1), ("b", 2)]);
    }

    #[tokio::test]
    async fn disabled_collaborators_fall_back() {
        let providers = Providers::disabled(budgets());

        assert!(providers.image("x".into(), ImageKind::Outcome).await.is_none());
        assert!(providers.submit_video("x".into(), "y".into()).await.is_none());
        assert_eq!(providers.poll_video("job".into()).await, JobStatus::Pending);
        let text = providers
            .scenario(ScenarioRequest {
                round_number: 2,
                round_type: RoundType::Survival,
            })
            .await;
        assert!(!text.is_empty());
    }
}
