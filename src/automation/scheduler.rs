//! Pure timing bookkeeping for the reactive engine.
//!
//! The [`Scheduler`] never sleeps or spawns: every method takes `now`
//! explicitly and only answers "what is due" and "when to wake next". The
//! engine owns the timer and feeds the answers back in.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::actions::ActionOutcome;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Quiet period that coalesces a burst of triggers into one pass.
    pub debounce: Duration,
    /// Minimum time between two passes for the same record.
    pub cooldown: Duration,
    /// Delay before re-attempting an incomplete pass.
    pub retry_delay: Duration,
    /// Consecutive re-attempts allowed before waiting for a natural trigger.
    pub max_retries: u32,
    /// Safety tick for hosts that change screens without any notification.
    pub poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            cooldown: Duration::from_millis(1200),
            retry_delay: Duration::from_millis(800),
            max_retries: 3,
            poll_interval: Duration::from_millis(2500),
        }
    }
}

/// Why the engine woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The debounce window after one or more triggers closed.
    Debounced,
    /// A scheduled re-attempt of an incomplete pass.
    Retry,
}

#[derive(Debug)]
pub struct Scheduler {
    settings: EngineSettings,
    debounce_at: Option<Instant>,
    retry_at: Option<Instant>,
    retries: u32,
    last_pass: HashMap<String, Instant>,
}

impl Scheduler {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            debounce_at: None,
            retry_at: None,
            retries: 0,
            last_pass: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Record a trigger. Each trigger pushes the debounce deadline forward.
    pub fn notify(&mut self, now: Instant) {
        self.debounce_at = Some(now + self.settings.debounce);
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_at, self.retry_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Pop one wake-up that is due at `now`. Debounced passes go first.
    pub fn take_due(&mut self, now: Instant) -> Option<Wake> {
        if self.debounce_at.is_some_and(|at| at <= now) {
            self.debounce_at = None;
            return Some(Wake::Debounced);
        }
        if self.retry_at.is_some_and(|at| at <= now) {
            self.retry_at = None;
            return Some(Wake::Retry);
        }
        None
    }

    /// Check-then-set the cooldown for `record`.
    ///
    /// Returns `false` when the record had a pass less than `cooldown` ago.
    /// Paths without a record id have no cooldown. Re-attempts bypass the
    /// check but still refresh the entry.
    pub fn admit(&mut self, record: Option<&str>, now: Instant, wake: Wake) -> bool {
        let Some(record) = record else {
            return true;
        };
        if wake == Wake::Debounced
            && let Some(last) = self.last_pass.get(record)
            && now.saturating_duration_since(*last) < self.settings.cooldown
        {
            return false;
        }
        self.last_pass.insert(record.to_string(), now);
        true
    }

    /// Feed back the outcome of a pass. Returns when a re-attempt is due, if
    /// one was scheduled.
    pub fn settle(&mut self, outcome: ActionOutcome, now: Instant) -> Option<Instant> {
        if outcome != ActionOutcome::Incomplete {
            self.retries = 0;
            return None;
        }
        if self.retries >= self.settings.max_retries {
            self.retries = 0;
            return None;
        }
        self.retries += 1;
        let at = now + self.settings.retry_delay;
        self.retry_at = Some(at);
        Some(at)
    }
}
