use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::sleep;
use tracing::{debug, error};

use super::job::{JobFailure, JobResult};

/// Aggregated outcome of one run. Nothing here is persisted.
#[derive(Debug)]
pub struct RunSummary<R> {
    pub results: Vec<R>,
    pub failures: Vec<JobFailure>,
}

impl<R> Default for RunSummary<R> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<R> RunSummary<R> {
    fn record(&mut self, result: JobResult<R>) {
        match result {
            JobResult::Success(r) => self.results.push(r),
            JobResult::Failure(f) => self.failures.push(f),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Every dispatched job lands in exactly one of the two lists.
    pub fn total(&self) -> usize {
        self.succeeded() + self.failed()
    }
}

// A failed job is logged and kept out of the results; it never propagates.
fn settle<R, E: fmt::Display>(job: String, outcome: Result<R, E>) -> JobResult<R> {
    match outcome {
        Ok(r) => {
            debug!(job = %job, "job succeeded");
            JobResult::Success(r)
        }
        Err(e) => {
            error!(job = %job, error = %e, "job failed");
            JobResult::Failure(JobFailure {
                job,
                reason: e.to_string(),
            })
        }
    }
}

/// Run `worker` over `jobs` with at most `limit` jobs in flight.
///
/// Jobs are pulled from a shared queue: as soon as one settles the next one is
/// dispatched, there are no fixed-size waves. Results come back in completion
/// order. `limit` is clamped to at least 1.
pub async fn run_with_concurrency<T, R, E, F, Fut>(
    jobs: Vec<T>,
    limit: usize,
    worker: F,
) -> RunSummary<R>
where
    T: fmt::Display,
    E: fmt::Display,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut summary = RunSummary::default();
    if jobs.is_empty() {
        return summary;
    }

    let limit = limit.max(1);
    let mut queue = VecDeque::from(jobs);
    let dispatch = |job: T| {
        let label = job.to_string();
        let fut = worker(job);
        async move { (label, fut.await) }
    };

    let mut running = FuturesUnordered::new();
    while running.len() < limit {
        let Some(job) = queue.pop_front() else { break };
        running.push(dispatch(job));
    }

    while let Some((label, outcome)) = running.next().await {
        summary.record(settle(label, outcome));
        if let Some(job) = queue.pop_front() {
            running.push(dispatch(job));
        }
    }

    summary
}

/// Run `worker` over `jobs` one at a time, in order, waiting `gap` between
/// consecutive jobs. Failures are isolated the same way as
/// [`run_with_concurrency`].
pub async fn run_sequential<T, R, E, F, Fut>(
    jobs: Vec<T>,
    gap: Duration,
    worker: F,
) -> RunSummary<R>
where
    T: fmt::Display,
    E: fmt::Display,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut summary = RunSummary::default();
    let total = jobs.len();

    for (i, job) in jobs.into_iter().enumerate() {
        let label = job.to_string();
        debug!(job = %label, position = i + 1, total, "dispatching");
        summary.record(settle(label, worker(job).await));

        if i + 1 < total && !gap.is_zero() {
            sleep(gap).await;
        }
    }

    summary
}
