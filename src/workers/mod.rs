//! Bounded task scheduler.
//!
//! Runs a batch of deferred futures with at most `limit` of them in flight and
//! hands the results back in submission order. Every per-file task holds one
//! open handle per requested metric, so the limit is what keeps a large
//! package from exhausting the process's file descriptors.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Concurrency ceiling used when the caller does not choose one.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Boxed unit of work accepted by [`BoundedScheduler::run`] when a batch mixes
/// futures of different concrete types.
pub type Task<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

/// Shared stop signal for blocking work spawned by a batch.
///
/// Tasks cannot abort a `spawn_blocking` closure from the outside, so the
/// closures poll this flag instead (see [`crate::compress::Cancellable`]).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err` once the flag is set.
    pub fn check(&self) -> io::Result<()> {
        if self.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, "measurement cancelled"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BoundedScheduler {
    limit: usize,
    cancel: CancelFlag,
}

impl BoundedScheduler {
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            cancel: CancelFlag::default(),
        }
    }

    /// Flag tripped when the batch fails. Hand clones to the tasks' blocking work.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Runs every task, never more than `limit` at once.
    ///
    /// Futures are only polled once admitted, so work inside them (opening
    /// files included) does not start early. On the first failure nothing new
    /// is admitted, the cancel flag is set and the tasks already in flight are
    /// awaited before that failure is returned, so no task outlives the call.
    /// There are no partial results.
    pub async fn run<T, E, F>(&self, tasks: Vec<F>) -> Result<Vec<T>, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<JoinError> + Send + 'static,
    {
        let total = tasks.len();
        let mut queue: VecDeque<(usize, F)> = tasks.into_iter().enumerate().collect();
        let mut running = JoinSet::new();
        // Completions arrive in any order; slot them back by submission index.
        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();

        admit(&mut queue, &mut running, self.limit);
        while let Some(joined) = running.join_next().await {
            let failure = match joined {
                Ok((index, Ok(value))) => {
                    debug!(index, "task finished");
                    slots[index] = Some(value);
                    admit(&mut queue, &mut running, self.limit);
                    continue;
                }
                Ok((index, Err(err))) => {
                    debug!(index, in_flight = running.len(), "task failed, cancelling batch");
                    err
                }
                Err(err) => {
                    warn!(error = %err, "task did not complete, cancelling batch");
                    E::from(err)
                }
            };
            self.cancel.cancel();
            drain(&mut running).await;
            return Err(failure);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

impl Default for BoundedScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

fn admit<T, E, F>(
    queue: &mut VecDeque<(usize, F)>,
    running: &mut JoinSet<(usize, Result<T, E>)>,
    limit: usize,
) where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    while running.len() < limit {
        let Some((index, task)) = queue.pop_front() else { break };
        running.spawn(async move { (index, task.await) });
    }
}

/// Waits out the tasks still in flight, discarding their results.
async fn drain<T: 'static>(running: &mut JoinSet<T>) {
    let mut discarded = 0usize;
    while running.join_next().await.is_some() {
        discarded += 1;
    }
    debug!(discarded, "drained in-flight tasks");
}
