//! Route-driven automation of the records application.
//!
//! [`engine::ReactiveEngine`] listens for change notifications, classifies the
//! current path with [`route::RouteMatcher`] and runs the idempotent
//! [`actions::ScreenActions`] for the screen it landed on. Timing decisions
//! (debounce, cooldown, bounded retries) live in [`scheduler::Scheduler`].

pub mod actions;
pub mod engine;
pub mod page;
pub mod route;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod fake;

pub use actions::{ActionOutcome, ActionSettings, ScreenActions, option_pattern_for};
pub use engine::{ChangeSource, EngineHandle, ReactiveEngine, Trigger};
pub use page::{ElementId, Key, Page, PageError, Query};
pub use route::{RouteMatcher, Screen};
pub use scheduler::EngineSettings;
