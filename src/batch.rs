//! Day batch: list the day's completed appointments, fetch each report and
//! deliver it.
//!
//! Print mode goes one document at a time, in listing order, with a gap
//! between jobs so the spooler keeps the order. The other modes fan out
//! through the bounded runner.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::{ListingQuery, ReportSource};
use crate::delivery::{Delivered, Delivery, OutputMode};
use crate::error::AutoprintError;
use crate::runner::{Job, JobFailure, RunSummary, jobs_from_listing, run_sequential, run_with_concurrency};
use crate::ui::BatchProgress;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub date: NaiveDate,
    pub mode: OutputMode,
    pub concurrency: usize,
    pub print_gap: Duration,
    pub staff_id: u64,
    pub facility_id: u64,
    pub page_size: u32,
    pub done_marker: String,
}

impl BatchOptions {
    pub fn listing_query(&self) -> ListingQuery {
        ListingQuery {
            date: self.date,
            staff_id: self.staff_id,
            facility_id: self.facility_id,
            page_size: self.page_size,
            done_marker: self.done_marker.clone(),
        }
    }
}

/// One job and how its document was delivered.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveredJob {
    pub job: Job,
    pub delivered: Delivered,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub mode: OutputMode,
    pub total: usize,
    pub delivered: Vec<DeliveredJob>,
    pub failures: Vec<JobFailure>,
}

impl BatchReport {
    fn new(run_id: Uuid, options: &BatchOptions, total: usize, summary: RunSummary<DeliveredJob>) -> Self {
        let mut delivered = summary.results;
        delivered.sort_by_key(|d| d.job.sequence_index);
        Self {
            run_id,
            date: options.date,
            mode: options.mode,
            total,
            delivered,
            failures: summary.failures,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.delivered.len()
    }
}

pub struct BatchRunner<S> {
    source: S,
    delivery: Delivery,
}

impl<S: ReportSource> BatchRunner<S> {
    pub fn new(source: S, delivery: Delivery) -> Self {
        Self { source, delivery }
    }

    /// Run one batch. Only batch preconditions (an empty listing, or a failed
    /// listing request) return `Err`; per-job failures end up in the report.
    #[instrument(skip_all, fields(date = %options.date, mode = %options.mode))]
    pub async fn run(
        &self,
        options: &BatchOptions,
        progress: &BatchProgress,
    ) -> Result<BatchReport, AutoprintError> {
        let run_id = Uuid::new_v4();
        let query = options.listing_query();
        let listing = self.source.list_completed(&query).await?;
        if listing.is_empty() {
            return Err(AutoprintError::NothingToDo {
                date: query.api_date(),
            });
        }

        let jobs = jobs_from_listing(&listing);
        let total = jobs.len();
        info!(%run_id, total, "batch started");
        progress.set_total(total);

        let source = &self.source;
        let delivery = &self.delivery;
        let mode = options.mode;
        let worker = |job: Job| async move {
            let result = deliver_one(source, delivery, mode, &job).await;
            progress.job_settled(&job, &result);
            result.map(|delivered| DeliveredJob { job, delivered })
        };

        let summary = match mode {
            OutputMode::Print => run_sequential(jobs, options.print_gap, worker).await,
            OutputMode::Open | OutputMode::Download => {
                run_with_concurrency(jobs, options.concurrency, worker).await
            }
        };

        let report = BatchReport::new(run_id, options, total, summary);
        info!(
            %run_id,
            succeeded = report.succeeded(),
            failed = report.failures.len(),
            "batch finished"
        );
        Ok(report)
    }
}

async fn deliver_one<S: ReportSource>(
    source: &S,
    delivery: &Delivery,
    mode: OutputMode,
    job: &Job,
) -> Result<Delivered, AutoprintError> {
    let bytes = source.fetch_document(&job.record_id).await?;
    let delivered = delivery.deliver(mode, &bytes, &job.artifact_name()).await?;
    Ok(delivered)
}
