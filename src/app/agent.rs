use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;

/// Terminal failure of one agent build.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The build observed its cancellation token and stopped early. Never
    /// surfaced to the user; the agent simply publishes nothing.
    #[error("build cancelled")]
    Cancelled,
    /// The builder explicitly refused to produce a value.
    #[error("{0}")]
    Rejected(String),
}

/// Cooperative cancellation flag handed to every builder. Builders poll it
/// at safe points; setting it never interrupts synchronous work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of one build, tagged with the submission generation so the agent
/// can discard stale completions.
#[derive(Debug)]
pub struct Outcome<T> {
    pub generation: u64,
    pub result: Result<T, BuildError>,
}

/// What `accept` did with an outcome.
#[derive(Debug)]
pub enum Accepted<T> {
    /// A new value was published; the superseded value is returned so the
    /// caller can release any buffers it owns.
    Published { previous: Option<T> },
    /// The build failed with a reason worth showing.
    Rejected(String),
    /// Cancelled build, or a completion from an older submission. Silent.
    Discarded,
}

/// Wraps one cancellable, single-flight asynchronous build and publishes
/// monotonic results.
///
/// `submit` spawns the builder and immediately supersedes any in-flight
/// build; completions are routed back through the app's event channel and
/// fed to `accept`, which publishes only the newest generation. A slow,
/// stale build can therefore never overwrite a fresher value, regardless of
/// completion order.
#[derive(Debug)]
pub struct Agent<T> {
    generation: u64,
    published: Option<T>,
    inflight: Option<CancelToken>,
}

impl<T> Default for Agent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Agent<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation: 0,
            published: None,
            inflight: None,
        }
    }

    /// Last successfully published value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.published.as_ref()
    }

    #[must_use]
    pub fn value_mut(&mut self) -> Option<&mut T> {
        self.published.as_mut()
    }

    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.inflight.is_some()
    }

    /// Requests cancellation of the in-flight build, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
    }

    /// Starts a new build, cancelling any in-flight one. The completion is
    /// wrapped into an app event and sent over `tx`; a dropped receiver is
    /// benign (the app is shutting down).
    pub fn submit<E, F, Fut, W>(&mut self, tx: mpsc::Sender<E>, wrap: W, build: F)
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = Result<T, BuildError>> + Send + 'static,
        W: FnOnce(Outcome<T>) -> E + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let token = CancelToken::new();
        self.inflight = Some(token.clone());
        let fut = build(token);
        tokio::spawn(async move {
            let result = fut.await;
            let _ = tx.send(wrap(Outcome { generation, result })).await;
        });
    }

    /// Applies a completed build. Only the outcome of the most recent
    /// submission may publish; everything else is discarded.
    pub fn accept(&mut self, outcome: Outcome<T>) -> Accepted<T> {
        if outcome.generation != self.generation {
            return Accepted::Discarded;
        }
        self.inflight = None;
        match outcome.result {
            Ok(value) => {
                let previous = self.published.replace(value);
                Accepted::Published { previous }
            }
            Err(BuildError::Cancelled) => Accepted::Discarded,
            Err(BuildError::Rejected(reason)) => Accepted::Rejected(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_publishes_latest_generation() {
        let mut agent: Agent<u32> = Agent::new();
        agent.generation = 2;
        let accepted = agent.accept(Outcome {
            generation: 2,
            result: Ok(7),
        });
        assert!(matches!(accepted, Accepted::Published { previous: None }));
        assert_eq!(agent.value(), Some(&7));
    }

    #[test]
    fn test_stale_outcome_discarded() {
        let mut agent: Agent<u32> = Agent::new();
        agent.generation = 2;
        agent.published = Some(9);
        let accepted = agent.accept(Outcome {
            generation: 1,
            result: Ok(7),
        });
        assert!(matches!(accepted, Accepted::Discarded));
        assert_eq!(agent.value(), Some(&9));
    }

    #[test]
    fn test_cancelled_outcome_keeps_previous_value() {
        let mut agent: Agent<u32> = Agent::new();
        agent.generation = 3;
        agent.published = Some(9);
        let accepted = agent.accept(Outcome {
            generation: 3,
            result: Err(BuildError::Cancelled),
        });
        assert!(matches!(accepted, Accepted::Discarded));
        assert_eq!(agent.value(), Some(&9));
    }

    #[test]
    fn test_rejection_reports_reason_and_keeps_value() {
        let mut agent: Agent<u32> = Agent::new();
        agent.generation = 1;
        agent.published = Some(4);
        let accepted = agent.accept(Outcome {
            generation: 1,
            result: Err(BuildError::Rejected("bad input".into())),
        });
        match accepted {
            Accepted::Rejected(reason) => assert_eq!(reason, "bad input"),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(agent.value(), Some(&4));
    }

    #[test]
    fn test_published_returns_superseded_value() {
        let mut agent: Agent<u32> = Agent::new();
        agent.generation = 1;
        agent.published = Some(4);
        let accepted = agent.accept(Outcome {
            generation: 1,
            result: Ok(5),
        });
        match accepted {
            Accepted::Published { previous } => assert_eq!(previous, Some(4)),
            other => panic!("expected publish, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_token_flag() {
        let token = CancelToken::new();
        assert!(!token.requested());
        token.cancel();
        assert!(token.requested());
    }
}
