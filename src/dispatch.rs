//! Bounded dispatch pool
//!
//! Admits an unbounded sequence of independent async operations while
//! holding at most `max_concurrent` of them in flight. The first failure
//! observed from any completed operation is re-raised at the next admission
//! or at drain; after that the pool refuses new work. Operations already in
//! flight are never cancelled.

use std::future::Future;

use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// First failure from a completed operation, re-raised exactly once.
    #[error("dispatched operation failed: {0}")]
    OperationFailed(E),

    /// Admission refused because an earlier failure was already reported.
    #[error("dispatch pool aborted by an earlier failure")]
    Aborted,
}

/// Bounded-concurrency driver for independent operations.
///
/// State machine: admitting -> draining -> done, with an absorbing failed
/// state once a stored failure has been reported; from there only
/// [`drain`](Self::drain) is useful.
///
/// Dropping a pool without draining aborts whatever tokio still has
/// running; call [`drain`](Self::drain) to let in-flight work finish.
pub struct DispatchPool<E> {
    tasks: JoinSet<Result<(), E>>,
    max_concurrent: usize,
    failure: Option<E>,
    aborted: bool,
}

impl<E: Send + 'static> DispatchPool<E> {
    /// Create a pool holding at most `max_concurrent` operations in flight.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is zero.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be at least 1");

        Self {
            tasks: JoinSet::new(),
            max_concurrent,
            failure: None,
            aborted: false,
        }
    }

    /// Number of operations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Admit one operation, waiting for a slot when at capacity.
    ///
    /// Back-pressure, not rejection: at capacity the caller suspends until
    /// an in-flight operation completes. If a reaped completion carried the
    /// first failure, that failure is returned and the operation is NOT
    /// admitted; every later admission returns [`DispatchError::Aborted`].
    pub async fn add_task<F>(&mut self, op: F) -> Result<(), DispatchError<E>>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        if self.aborted || self.failure.is_some() {
            return Err(self.report_failure());
        }

        while self.tasks.len() >= self.max_concurrent {
            self.reap_one().await;
            if self.failure.is_some() {
                return Err(self.report_failure());
            }
        }

        self.tasks.spawn(op);
        Ok(())
    }

    /// Wait for every admitted operation to finish, then surface the stored
    /// failure unless it was already reported by [`add_task`](Self::add_task)
    /// (in that case drain only waits and returns `Ok`).
    pub async fn drain(mut self) -> Result<(), DispatchError<E>> {
        while !self.tasks.is_empty() {
            self.reap_one().await;
        }

        match self.failure.take() {
            Some(e) => Err(DispatchError::OperationFailed(e)),
            None => Ok(()),
        }
    }

    /// Await one completion and record its outcome. Failures after the
    /// first are logged and discarded.
    async fn reap_one(&mut self) {
        let Some(result) = self.tasks.join_next().await else {
            return;
        };

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if self.failure.is_none() && !self.aborted {
                    self.failure = Some(e);
                } else {
                    tracing::debug!("Dropping operation failure after the first");
                }
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
            }
        }
    }

    fn report_failure(&mut self) -> DispatchError<E> {
        match self.failure.take() {
            Some(e) => {
                self.aborted = true;
                DispatchError::OperationFailed(e)
            }
            None => DispatchError::Aborted,
        }
    }
}
