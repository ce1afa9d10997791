//! Shared fixtures for service tests: a controllable clock, scripted collaborators and a state
//! wired to an in-memory store with millisecond retry tuning.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    config::{AppConfig, ProviderConfig, RetryConfig},
    dao::session_store::{SessionStore, memory::MemorySessionStore},
    providers::{
        ImageKind, JobStatus, Judge, JudgeRequest, MediaGenerator, ProviderError, ProviderResult,
        Providers, RankRequest, Ranking, ScenarioRequest, ScriptRequest, TextWriter, Verdict,
        VideoScript, VideoService,
    },
    state::{
        AppState, SharedState,
        clock::Clock,
        round_machine::RoundEvent,
        session::{Player, Round, RoundType, Session, SessionStatus},
    },
};

/// Instant the manual clock starts at.
pub fn start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// Collaborator double answering every call from a script.
///
/// Submissions without a scripted verdict survive. Images and videos succeed unless told
/// otherwise.
#[derive(Default)]
pub struct Scripted {
    verdicts: Mutex<HashMap<String, Verdict>>,
    rankings: Mutex<Option<Vec<Ranking>>>,
    failing_submits: AtomicU32,
    judge_calls: AtomicU32,
    images: AtomicU32,
    jobs: AtomicU32,
}

impl Scripted {
    pub fn survives(&self, submission: &str) {
        self.script(submission, true);
    }

    pub fn dies(&self, submission: &str) {
        self.script(submission, false);
    }

    fn script(&self, submission: &str, survived: bool) {
        let verdict = Verdict {
            survived,
            reason: format!("{submission}: {}", if survived { "made it" } else { "did not" }),
            visual_prompt: format!("scene of {submission}"),
        };
        self.verdicts
            .lock()
            .unwrap()
            .insert(submission.to_string(), verdict);
    }

    pub fn ranks(&self, rankings: Vec<Ranking>) {
        *self.rankings.lock().unwrap() = Some(rankings);
    }

    pub fn fail_video_submits(&self, count: u32) {
        self.failing_submits.store(count, Ordering::SeqCst);
    }

    pub fn judge_calls(&self) -> u32 {
        self.judge_calls.load(Ordering::SeqCst)
    }
}

impl Judge for Scripted {
    fn judge(&self, request: JudgeRequest) -> BoxFuture<'static, ProviderResult<Verdict>> {
        self.judge_calls.fetch_add(1, Ordering::SeqCst);
        let verdict = self
            .verdicts
            .lock()
            .unwrap()
            .get(&request.submission)
            .cloned()
            .unwrap_or_else(|| Verdict {
                survived: true,
                reason: "Outlasted the threat.".into(),
                visual_prompt: "a survivor catching their breath".into(),
            });
        Box::pin(async move { Ok(verdict) })
    }

    fn rank(&self, _request: RankRequest) -> BoxFuture<'static, ProviderResult<Vec<Ranking>>> {
        let rankings = self.rankings.lock().unwrap().clone();
        Box::pin(async move { rankings.ok_or(ProviderError::Disabled("ranked judge")) })
    }
}

impl TextWriter for Scripted {
    fn scenario(&self, request: ScenarioRequest) -> BoxFuture<'static, ProviderResult<String>> {
        Box::pin(async move { Ok(format!("Scenario for round {}", request.round_number)) })
    }

    fn video_script(
        &self,
        request: ScriptRequest,
    ) -> BoxFuture<'static, ProviderResult<VideoScript>> {
        Box::pin(async move {
            Ok(VideoScript {
                scene: format!("{} on a podium", request.player_name),
                dialogue: format!("Rank {} of {}.", request.rank, request.field_size),
            })
        })
    }
}

impl MediaGenerator for Scripted {
    fn image(&self, _prompt: String, kind: ImageKind) -> BoxFuture<'static, ProviderResult<String>> {
        let n = self.images.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(format!("https://img.test/{kind:?}/{n}")) })
    }
}

impl VideoService for Scripted {
    fn submit(
        &self,
        _prompt: String,
        _image_url: String,
    ) -> BoxFuture<'static, ProviderResult<String>> {
        let failing = self
            .failing_submits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let n = self.jobs.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if failing {
                Err(ProviderError::Status {
                    endpoint: "submit".into(),
                    status: 503,
                })
            } else {
                Ok(format!("job-{n}"))
            }
        })
    }

    fn poll(&self, job_id: String) -> BoxFuture<'static, ProviderResult<JobStatus>> {
        Box::pin(async move { Ok(JobStatus::Done(format!("https://video.test/{job_id}"))) })
    }
}

/// Configuration with millisecond retry and polling delays.
pub fn fast_config() -> AppConfig {
    AppConfig {
        retry: RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
            verify_delay_min: Duration::from_millis(2),
            verify_delay_max: Duration::from_millis(4),
        },
        providers: ProviderConfig {
            video_poll_interval: Duration::from_millis(1),
            video_max_wait: Duration::from_millis(200),
            ..ProviderConfig::default()
        },
        ..AppConfig::default()
    }
}

/// State backed by `store`, with `scripted` behind every collaborator.
pub async fn state_with_store(
    scripted: Arc<Scripted>,
    store: MemorySessionStore,
) -> (SharedState, Arc<ManualClock>) {
    let config = fast_config();
    let clock = Arc::new(ManualClock::new(start()));
    let providers = Providers::new(
        scripted.clone(),
        scripted.clone(),
        scripted.clone(),
        scripted,
        config.providers.clone(),
    );
    let state = AppState::with_clock(config, providers, clock.clone());
    state.install_session_store(Arc::new(store)).await;
    (state, clock)
}

/// [`state_with_store`] on a fresh in-memory store.
pub async fn state_with(scripted: Arc<Scripted>) -> (SharedState, Arc<ManualClock>) {
    state_with_store(scripted, MemorySessionStore::new()).await
}

/// Write `session` straight to the store.
pub async fn seed(state: &AppState, session: Session) {
    let store = state.session_store().await.unwrap();
    let code = session.code.clone();
    store.put(&code, session.into()).await.unwrap();
}

/// Session `ABCD` playing round 1 of `round_type`, driven through `events`.
///
/// Player ids equal their names; everyone is in the lobby and the first one is admin.
pub fn playing(round_type: RoundType, names: &[&str], events: &[RoundEvent]) -> Session {
    let now = start();
    let mut session = Session::new("ABCD".into(), 3, vec![round_type], now);
    session.status = SessionStatus::Playing;
    for (idx, name) in names.iter().enumerate() {
        let mut player = Player::new(name.to_string(), name.to_string(), idx == 0, None, None, now);
        player.in_lobby = true;
        session.players.insert(name.to_string(), player);
    }
    let mut round = Round::new(1, round_type, "ink".into(), now);
    round.scenario_text = "A threat".into();
    for event in events {
        round.apply(*event, now, Uuid::new_v4()).unwrap();
    }
    session.rounds.push(round);
    session.current_round_idx = Some(0);
    session
}
