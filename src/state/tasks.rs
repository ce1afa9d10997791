//! Registry of detached background work.
//!
//! Background pipelines are never cancelled, but they are never trusted blindly either: each one
//! is registered under a [`TaskKey`] for as long as it runs, so callers can refuse to start a
//! duplicate and the stuck detectors can tell "still working" from "abandoned".

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::session::PlayerId;

/// What a background task is doing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Filling the scenario cache for upcoming rounds.
    ScenarioPrewarm,
    /// Writing the scenario of a round waiting in the scenario phase.
    RoundScenario {
        /// Round number.
        round: u32,
    },
    /// Judging one player right after submission.
    EarlyJudgement {
        /// Round number.
        round: u32,
        /// Judged player.
        player_id: PlayerId,
    },
    /// Settling a judgement phase (batch, cooperative, sacrifice, ranked or revival).
    RoundJudgement {
        /// Round number.
        round: u32,
    },
    /// Requesting illustrations that do not gate progression.
    Illustration {
        /// Round number.
        round: u32,
        /// What is being illustrated.
        subject: String,
    },
    /// Generating a player portrait.
    CharacterPortrait {
        /// Portrayed player.
        player_id: PlayerId,
    },
    /// End-of-game media pipeline.
    MediaPipeline {
        /// Run allowed to write results.
        run_id: Uuid,
    },
}

/// Registry key: one task kind per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    /// Session code.
    pub code: String,
    /// Work performed.
    pub kind: TaskKind,
}

impl TaskKey {
    /// Build a key for `kind` on session `code`.
    pub fn new(code: &str, kind: TaskKind) -> Self {
        Self {
            code: code.to_string(),
            kind,
        }
    }
}

/// Tracks running background tasks.
#[derive(Debug, Default)]
pub struct TaskSupervisor {
    running: Arc<DashMap<TaskKey, Instant>>,
}

/// Removes the registry entry when the task finishes, panics included.
struct Registration {
    running: Arc<DashMap<TaskKey, Instant>>,
    key: TaskKey,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.running.remove(&self.key);
    }
}

impl TaskSupervisor {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` unless a task with the same key is already running.
    ///
    /// Returns `false` when the spawn was skipped.
    pub fn spawn<F>(&self, key: TaskKey, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.running.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(code = %key.code, kind = ?key.kind, "task already running; skipping spawn");
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
            }
        }

        let registration = Registration {
            running: Arc::clone(&self.running),
            key,
        };

        tokio::spawn(async move {
            let registration = registration;
            let started = Instant::now();
            work.await;
            let elapsed = started.elapsed();
            if elapsed > Duration::from_secs(120) {
                warn!(
                    code = %registration.key.code,
                    kind = ?registration.key.kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "background task finished late"
                );
            }
        });

        true
    }

    /// Whether a task with this key is running.
    pub fn is_running(&self, key: &TaskKey) -> bool {
        self.running.contains_key(key)
    }

    /// How long the task with this key has been running.
    pub fn running_for(&self, key: &TaskKey) -> Option<Duration> {
        self.running.get(key).map(|started| started.elapsed())
    }

    /// Whether any task of session `code` matches `predicate`.
    pub fn any_running(&self, code: &str, predicate: impl Fn(&TaskKind) -> bool) -> bool {
        self.running
            .iter()
            .any(|entry| entry.key().code == code && predicate(&entry.key().kind))
    }

    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Whether nothing is running.
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Wait until every registered task (including the ones they spawn) has finished.
    pub async fn idle(&self) {
        while !self.running.is_empty() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}
