//! End-of-game media pipeline.
//!
//! Four sequential stages, each a parallel fan-out over the final standings: scripts, base images,
//! render submissions, then polling until every job settles or runs out of time. One player's
//! failure never sinks the batch. Results are written back only while the run that produced them
//! is still the session's current run, so a superseded run can never clobber a retry.

use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    providers::{ImageKind, JobStatus, Providers, ScriptRequest, ScriptTone, fallback, prompts},
    services::optimistic::{self, Mutation, update_with_retry},
    state::{
        SharedState,
        session::{MediaStatus, PlayerId, Session},
    },
};

/// One player's place in the final standings.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    /// Player.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Free-text look.
    pub character_description: Option<String>,
    /// 1-based final position.
    pub rank: usize,
    /// Final score.
    pub score: i64,
}

/// Final standings: score descending, join order on ties.
pub fn standings(session: &Session) -> Vec<Standing> {
    let mut players: Vec<_> = session.participants().collect();
    players.sort_by(|a, b| b.score.cmp(&a.score));
    players
        .into_iter()
        .enumerate()
        .map(|(idx, player)| Standing {
            player_id: player.id.clone(),
            name: player.name.clone(),
            character_description: player.character_description.clone(),
            rank: idx + 1,
            score: player.score,
        })
        .collect()
}

/// Tone of the video for `rank` in a field of `field` players.
pub fn tone(rank: usize, field: usize) -> ScriptTone {
    match rank {
        1 => ScriptTone::Winner,
        last if last == field => ScriptTone::LastPlace,
        _ => ScriptTone::Middle,
    }
}

/// Status of a run from how many of the expected videos it produced.
pub fn run_status(produced: usize, expected: usize) -> MediaStatus {
    if produced == 0 {
        MediaStatus::Failed
    } else if produced >= expected {
        MediaStatus::Ready
    } else {
        MediaStatus::Partial
    }
}

/// Run the pipeline for run `run_id` of session `code`.
pub async fn run(state: SharedState, code: String, run_id: Uuid) {
    let session = match optimistic::load(&state, &code).await {
        Ok(session) => session,
        Err(err) => {
            warn!(code, %run_id, error = %err, "cannot load session for media pipeline");
            return;
        }
    };
    if session.media.run_id != Some(run_id) || session.media.status != MediaStatus::Generating {
        debug!(code, %run_id, "media run superseded before it started");
        return;
    }

    let standings = standings(&session);
    let theme = session
        .current_round()
        .map(|round| round.style_theme.clone())
        .unwrap_or_default();
    let providers = state.providers();
    let budgets = providers.budgets();
    let (interval, max_wait) = (budgets.video_poll_interval, budgets.video_max_wait);
    let field = standings.len();
    info!(code, %run_id, players = field, "media pipeline started");

    let scripts = join_all(standings.iter().map(|standing| async move {
        let tone = tone(standing.rank, field);
        providers
            .video_script(ScriptRequest {
                player_name: standing.name.clone(),
                character_description: standing.character_description.clone(),
                rank: standing.rank,
                field_size: field,
                score: standing.score,
                tone,
            })
            .await
            .unwrap_or_else(|| fallback::video_script(&standing.name, tone))
    }))
    .await;

    let frames = join_all(standings.iter().zip(&scripts).map(|(standing, script)| {
        let description = match &standing.character_description {
            Some(look) => format!("{} ({look})", script.scene),
            None => script.scene.clone(),
        };
        let prompt = prompts::image(&description, ImageKind::VideoFrame, &theme);
        async move { providers.image(prompt, ImageKind::VideoFrame).await }
    }))
    .await;

    let jobs = join_all(scripts.iter().zip(frames).map(|(script, frame)| async move {
        match frame {
            Some(image_url) => providers.submit_video(prompts::video(script), image_url).await,
            None => None,
        }
    }))
    .await;

    let videos = join_all(jobs.into_iter().map(|job| async move {
        match job {
            Some(job_id) => wait_for(providers, job_id, interval, max_wait).await,
            None => None,
        }
    }))
    .await;

    let produced: IndexMap<PlayerId, String> = standings
        .iter()
        .zip(videos)
        .filter_map(|(standing, video)| video.map(|url| (standing.player_id.clone(), url)))
        .collect();
    let status = run_status(produced.len(), field);
    info!(code, %run_id, produced = produced.len(), expected = field, ?status, "media pipeline finished");

    let result = update_with_retry(
        &state,
        &code,
        |session| {
            if session.media.run_id != Some(run_id) {
                return Ok(Mutation::Skip(false));
            }
            session.media.status = status;
            session.media.videos = produced.clone();
            Ok(Mutation::Commit(true))
        },
        |session, _| session.media.run_id == Some(run_id) && session.media.status == status,
    )
    .await;
    match result {
        Ok(true) => {}
        Ok(false) => debug!(code, %run_id, "media run superseded; results dropped"),
        Err(err) => warn!(code, %run_id, error = %err, "failed to store media results"),
    }
}

/// Poll `job_id` until it settles or `max_wait` elapses.
async fn wait_for(
    providers: &Providers,
    job_id: String,
    interval: Duration,
    max_wait: Duration,
) -> Option<String> {
    let started = Instant::now();
    loop {
        match providers.poll_video(job_id.clone()).await {
            JobStatus::Done(url) => return Some(url),
            JobStatus::Failed => {
                warn!(job_id, "video render failed");
                return None;
            }
            JobStatus::Pending if started.elapsed() >= max_wait => {
                warn!(job_id, waited_ms = max_wait.as_millis() as u64, "video render timed out");
                return None;
            }
            JobStatus::Pending => sleep(interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        state::session::{RoundType, SessionStatus},
        test_support::{self, Scripted},
    };

    fn finished(names: &[&str], run_id: Uuid) -> Session {
        let mut session = test_support::playing(RoundType::Survival, names, &[]);
        session.status = SessionStatus::Finished;
        session.media.status = MediaStatus::Generating;
        session.media.run_id = Some(run_id);
        session
    }

    #[test]
    fn tones_follow_the_standings() {
        assert_eq!(tone(1, 3), ScriptTone::Winner);
        assert_eq!(tone(2, 3), ScriptTone::Middle);
        assert_eq!(tone(3, 3), ScriptTone::LastPlace);
        assert_eq!(tone(1, 1), ScriptTone::Winner);
    }

    #[test]
    fn standings_break_ties_by_join_order() {
        let mut session = finished(&["ada", "bob", "cy"], Uuid::new_v4());
        session.players["bob"].score = 300;
        session.players["cy"].score = 300;
        let order: Vec<(String, usize)> = standings(&session)
            .into_iter()
            .map(|s| (s.player_id, s.rank))
            .collect();
        assert_eq!(
            order,
            vec![("bob".into(), 1), ("cy".into(), 2), ("ada".into(), 3)]
        );
    }

    #[tokio::test]
    async fn failed_submissions_leave_a_partial_run() {
        let scripted = Arc::new(Scripted::default());
        scripted.fail_video_submits(3);
        let (state, _clock) = test_support::state_with(scripted).await;
        let run_id = Uuid::new_v4();
        test_support::seed(&state, finished(&["a", "b", "c", "d", "e"], run_id)).await;

        run(state.clone(), "ABCD".into(), run_id).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.media.status, MediaStatus::Partial);
        // Submissions go out in standings order, so the first three players lose their videos.
        let videos: Vec<(&str, &str)> = session
            .media
            .videos
            .iter()
            .map(|(id, url)| (id.as_str(), url.as_str()))
            .collect();
        assert_eq!(
            videos,
            vec![
                ("d", "https://video.test/job-3"),
                ("e", "https://video.test/job-4"),
            ]
        );
    }

    #[test]
    fn run_status_counts_produced_videos() {
        assert_eq!(run_status(3, 3), MediaStatus::Ready);
        assert_eq!(run_status(1, 3), MediaStatus::Partial);
        assert_eq!(run_status(0, 3), MediaStatus::Failed);
        assert_eq!(run_status(0, 0), MediaStatus::Failed);
    }

    #[tokio::test]
    async fn run_without_participants_fails() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let run_id = Uuid::new_v4();
        let mut session = finished(&["a"], run_id);
        session.players["a"].in_lobby = false;
        test_support::seed(&state, session).await;

        run(state.clone(), "ABCD".into(), run_id).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.media.status, MediaStatus::Failed);
        assert!(session.media.videos.is_empty());
    }

    #[tokio::test]
    async fn superseded_run_does_not_write() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let current = Uuid::new_v4();
        test_support::seed(&state, finished(&["a", "b"], current)).await;

        run(state.clone(), "ABCD".into(), Uuid::new_v4()).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.media.status, MediaStatus::Generating);
        assert!(session.media.videos.is_empty());
    }

    #[tokio::test]
    async fn complete_run_is_ready() {
        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let run_id = Uuid::new_v4();
        test_support::seed(&state, finished(&["a", "b", "c"], run_id)).await;

        run(state.clone(), "ABCD".into(), run_id).await;

        let session = optimistic::load(&state, "ABCD").await.unwrap();
        assert_eq!(session.media.status, MediaStatus::Ready);
        assert_eq!(session.media.videos.len(), 3);
    }
}
