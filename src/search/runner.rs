//! Background directory search runs.
//!
//! A run wraps one [`DirectorySearcher`] invocation with the slow-search
//! timer. It never blocks the caller: the work happens on a spawned task and
//! the outcome comes back as a single terminal [`SearchEvent::Finished`] on
//! the event channel. If the threshold elapses first a
//! [`SearchEvent::BecameSlow`] is sent before it.

use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::types::Candidate;

/// Identifies one run within a session
pub type RunId = u64;

/// Why a run produced nothing to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct RunFailure {
    pub reason: String,
}

impl RunFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type RunOutcome = std::result::Result<Vec<Candidate>, RunFailure>;

/// Messages from background runs to the session
#[derive(Debug)]
pub enum SearchEvent {
    /// The run is still going after the slow threshold
    BecameSlow { run: RunId, directory: String },
    /// The run is over; sent exactly once per run
    Finished {
        run: RunId,
        directory: String,
        became_slow: bool,
        outcome: RunOutcome,
    },
}

/// A way of searching a directory tree for keywords.
pub trait DirectorySearcher: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Search `directory`, resolving once the search is over.
    fn search(&self, directory: PathBuf) -> BoxFuture<'static, RunOutcome>;
}

/// Start a run on the current tokio runtime and return immediately.
pub fn spawn_run(
    searcher: Arc<dyn DirectorySearcher>,
    run: RunId,
    directory: String,
    threshold: Duration,
    events: UnboundedSender<SearchEvent>,
) -> JoinHandle<()> {
    tracing::info!(run, %directory, backend = searcher.name(), "starting directory search");
    tokio::spawn(async move {
        let started = Instant::now();
        let mut work = searcher.search(PathBuf::from(&directory));
        let mut became_slow = false;

        let outcome = tokio::select! {
            biased;
            outcome = &mut work => outcome,
            () = tokio::time::sleep(threshold) => {
                became_slow = true;
                tracing::info!(run, %directory, ?threshold, "directory search is slow");
                let _ = events.send(SearchEvent::BecameSlow {
                    run,
                    directory: directory.clone(),
                });
                work.await
            }
        };

        tracing::debug!(
            run,
            %directory,
            elapsed_ms = started.elapsed().as_millis() as u64,
            became_slow,
            ok = outcome.is_ok(),
            "directory search finished"
        );
        if events
            .send(SearchEvent::Finished {
                run,
                directory,
                became_slow,
                outcome,
            })
            .is_err()
        {
            tracing::debug!(run, "session closed before the search finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct Sleeper {
        delay: Duration,
        outcome: RunOutcome,
    }

    impl DirectorySearcher for Sleeper {
        fn name(&self) -> &'static str {
            "sleeper"
        }

        fn search(&self, _directory: PathBuf) -> BoxFuture<'static, RunOutcome> {
            let delay = self.delay;
            let outcome = self.outcome.clone();
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                outcome
            })
        }
    }

    fn sleeper(delay_secs: u64, outcome: RunOutcome) -> Arc<dyn DirectorySearcher> {
        Arc::new(Sleeper {
            delay: Duration::from_secs(delay_secs),
            outcome,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_run_sends_only_finished() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_run(sleeper(1, Ok(vec![])), 1, "/d".into(), Duration::from_secs(3), tx)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            SearchEvent::Finished {
                run,
                directory,
                became_slow,
                outcome,
            } => {
                assert_eq!(run, 1);
                assert_eq!(directory, "/d");
                assert!(!became_slow);
                assert_eq!(outcome, Ok(vec![]));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_run_sends_notice_then_finished() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_run(sleeper(5, Ok(vec![])), 7, "/d".into(), Duration::from_secs(3), tx);

        assert!(matches!(
            rx.recv().await.unwrap(),
            SearchEvent::BecameSlow { run: 7, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SearchEvent::Finished {
                became_slow: true,
                ..
            }
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_run(
            sleeper(0, Err(RunFailure::new("exit status 2"))),
            2,
            "/d".into(),
            Duration::from_secs(3),
            tx,
        );
        match rx.recv().await.unwrap() {
            SearchEvent::Finished { outcome, .. } => {
                assert_eq!(outcome.unwrap_err().to_string(), "exit status 2");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }
}
