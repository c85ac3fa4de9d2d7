//! Bounded concurrent dispatch of candidate resolutions.
//!
//! One [`Semaphore`] per [`Dispatcher`] caps in-flight work for every page
//! resolved through it. Each task takes a permit before its timeout starts,
//! so queueing time never counts against a candidate. Permits are owned by
//! the task and released on completion, timeout, error or panic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::hop::HopError;

pub struct Dispatcher {
    limiter: Arc<Semaphore>,
    limit: usize,
    timeout: Duration,
}

impl Dispatcher {
    /// `limit` is clamped to at least one.
    pub fn new(limit: usize, timeout: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            limiter: Arc::new(Semaphore::new(limit)),
            limit,
            timeout,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `task` once per item and return the successes in input order.
    ///
    /// Failed, timed-out and panicked tasks contribute nothing. Dropping the
    /// returned future aborts every task still running.
    pub async fn run<T, O, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<O>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<O, HopError>> + Send + 'static,
        O: Send + 'static,
    {
        let total = items.len();
        let mut set = JoinSet::new();

        for (slot, item) in items.into_iter().enumerate() {
            let limiter = Arc::clone(&self.limiter);
            let timeout = self.timeout;
            let work = task(item);
            set.spawn(async move {
                let result: Result<O, HopError> = async {
                    let _permit = limiter
                        .acquire_owned()
                        .await
                        .map_err(|_| HopError::LimiterClosed)?;
                    tokio::time::timeout(timeout, work)
                        .await
                        .map_err(|_| HopError::Timeout(timeout))?
                }
                .await;
                (slot, result)
            });
        }

        let mut slots: Vec<Option<O>> = std::iter::repeat_with(|| None).take(total).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, Ok(outcome))) => slots[slot] = Some(outcome),
                Ok((slot, Err(e))) => debug!(slot, error = %e, "Candidate produced no outcome"),
                Err(e) => warn!(error = %e, "Candidate task aborted"),
            }
        }

        let outcomes: Vec<O> = slots.into_iter().flatten().collect();
        debug!(total, resolved = outcomes.len(), "Dispatch finished");
        outcomes
    }
}
