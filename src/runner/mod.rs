mod job;
mod pool;

pub use job::{Job, JobFailure, JobResult, jobs_from_listing, safe_file_name};
pub use pool::{RunSummary, run_sequential, run_with_concurrency};
