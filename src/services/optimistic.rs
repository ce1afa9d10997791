//! Retry-verify wrapper turning whole-record store access into durable multi-writer updates.
//!
//! Every attempt starts from a fresh read: the mutator is re-run from scratch on the unmutated
//! snapshot, so it must not carry state across calls. After a write the engine pauses for a short
//! random delay, re-reads and asks the verifier whether its change is visible. A concurrent writer
//! that overwrote it makes the check fail and the whole cycle starts over with exponential backoff.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::RetryConfig,
    error::ServiceError,
    state::{AppState, session::Session},
};

/// Decision taken by a mutator on the snapshot it was handed.
#[derive(Debug)]
pub enum Mutation<T> {
    /// Write the mutated snapshot, then verify it.
    Commit(T),
    /// Nothing to write (action already applied); return immediately.
    Skip(T),
}

/// Read the session stored under `code`.
pub async fn load(state: &AppState, code: &str) -> Result<Session, ServiceError> {
    let store = state.require_session_store().await?;
    store
        .get(code)
        .await?
        .map(Session::from)
        .ok_or_else(|| not_found(code))
}

/// Apply `mutate` to the session stored under `code` until `verify` observes the result.
///
/// Fails with [`ServiceError::ConcurrentModification`] once the retry budget is exhausted and
/// propagates any error returned by the mutator untouched (validation errors are never retried).
pub async fn update_with_retry<T, M, V>(
    state: &AppState,
    code: &str,
    mut mutate: M,
    verify: V,
) -> Result<T, ServiceError>
where
    M: FnMut(&mut Session) -> Result<Mutation<T>, ServiceError>,
    V: Fn(&Session, &T) -> bool,
{
    let retry = &state.config().retry;
    let store = state.require_session_store().await?;

    for attempt in 0..retry.max_attempts {
        let mut session = store
            .get(code)
            .await?
            .map(Session::from)
            .ok_or_else(|| not_found(code))?;

        let outcome = match mutate(&mut session)? {
            Mutation::Skip(outcome) => {
                debug!(code, attempt, "mutation already applied; skipping write");
                return Ok(outcome);
            }
            Mutation::Commit(outcome) => outcome,
        };

        session.updated_at = state.now();
        match store.put(code, session.into()).await {
            Ok(()) => {}
            Err(err) if err.is_conflict() => {
                debug!(code, attempt, error = %err, "store rejected write; retrying");
                sleep(backoff(retry, attempt)).await;
                continue;
            }
            Err(err) => return Err(err.into()),
        }

        sleep(verify_delay(retry)).await;

        let observed = store.get(code).await?.map(Session::from);
        if observed.is_some_and(|snapshot| verify(&snapshot, &outcome)) {
            if attempt > 0 {
                debug!(code, attempt, "write verified after retry");
            }
            return Ok(outcome);
        }

        warn!(code, attempt, "write not visible after verification; retrying");
        sleep(backoff(retry, attempt)).await;
    }

    warn!(code, attempts = retry.max_attempts, "giving up on concurrent modification");
    Err(ServiceError::ConcurrentModification {
        attempts: retry.max_attempts,
    })
}

fn not_found(code: &str) -> ServiceError {
    ServiceError::NotFound(format!("session `{code}` not found"))
}

/// `base * 2^attempt`, capped, plus up to one base delay of jitter.
fn backoff(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponential = retry
        .base_delay
        .saturating_mul(1u32 << attempt.min(16))
        .min(retry.max_delay);
    exponential + jitter(Duration::ZERO, retry.base_delay)
}

fn verify_delay(retry: &RetryConfig) -> Duration {
    jitter(retry.verify_delay_min, retry.verify_delay_max)
}

fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span = (max - min).as_micros() as u64;
    min + Duration::from_micros(rand::rng().random_range(0..=span))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::{
        dao::session_store::memory::MemorySessionStore,
        state::session::{Player, RoundType},
        test_support::{self, Scripted},
    };

    async fn seeded(store: MemorySessionStore) -> crate::state::SharedState {
        let (state, _clock) =
            test_support::state_with_store(Arc::new(Scripted::default()), store).await;
        let session = Session::new("ABCD".into(), 3, vec![RoundType::Survival], state.now());
        let store = state.session_store().await.unwrap();
        store.put("ABCD", session.into()).await.unwrap();
        state
    }

    fn join(name: &'static str) -> impl FnMut(&mut Session) -> Result<Mutation<()>, ServiceError> {
        move |session: &mut Session| {
            if session.players.contains_key(name) {
                return Ok(Mutation::Skip(()));
            }
            let player = Player::new(name.into(), name.into(), false, None, None, session.updated_at);
            session.players.insert(name.into(), player);
            Ok(Mutation::Commit(()))
        }
    }

    #[test]
    fn backoff_is_capped() {
        let retry = RetryConfig {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            ..RetryConfig::default()
        };

        assert!(backoff(&retry, 0) < Duration::from_millis(21));
        assert!(backoff(&retry, 10) <= Duration::from_millis(50));
        assert!(backoff(&retry, 10) >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn concurrent_writers_both_land_despite_stale_reads() {
        let state = seeded(MemorySessionStore::with_read_delay(Duration::from_millis(5))).await;

        let (first, second) = tokio::join!(
            update_with_retry(&state, "ABCD", join("ada"), |s, _| s.players.contains_key("ada")),
            update_with_retry(&state, "ABCD", join("bob"), |s, _| s.players.contains_key("bob")),
        );
        first.unwrap();
        second.unwrap();

        let session = load(&state, "ABCD").await.unwrap();
        assert!(session.players.contains_key("ada"));
        assert!(session.players.contains_key("bob"));
    }

    #[tokio::test]
    async fn skip_does_not_write() {
        let state = seeded(MemorySessionStore::new()).await;
        let before = load(&state, "ABCD").await.unwrap();

        let calls = AtomicU32::new(0);
        update_with_retry(
            &state,
            "ABCD",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Mutation::Skip(()))
            },
            |_, _| false,
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(load(&state, "ABCD").await.unwrap(), before);
    }

    #[tokio::test]
    async fn unverifiable_write_exhausts_the_budget() {
        let state = seeded(MemorySessionStore::new()).await;
        let calls = AtomicU32::new(0);

        let err = update_with_retry(
            &state,
            "ABCD",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Mutation::Commit(()))
            },
            |_, _| false,
        )
        .await
        .unwrap_err();

        let attempts = state.config().retry.max_attempts;
        assert!(matches!(err, ServiceError::ConcurrentModification { attempts: n } if n == attempts));
        assert_eq!(calls.load(Ordering::SeqCst), attempts);
    }

    #[tokio::test]
    async fn mutator_errors_are_not_retried() {
        let state = seeded(MemorySessionStore::new()).await;

        let err = update_with_retry(
            &state,
            "ABCD",
            |_| Err::<Mutation<()>, _>(ServiceError::InvalidInput("too long".into())),
            |_, _| true,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let state = seeded(MemorySessionStore::new()).await;
        let err = update_with_retry(&state, "ZZZZ", join("ada"), |_, _| true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
