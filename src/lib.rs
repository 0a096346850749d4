//! Batch retrieval and printing of SIDIM appointment reports, plus the
//! route-driven screen automation for the electronic records application.

pub mod api;
pub mod automation;
pub mod batch;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod delivery;
pub mod error;
pub mod runner;
pub mod ui;
