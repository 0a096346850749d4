pub mod client;
pub mod error;
pub mod types;

pub use client::{CodeLookup, ReportSource, SidimClient};
pub use error::ApiError;
pub use types::{AppointmentSummary, Citizen, ListingQuery};
