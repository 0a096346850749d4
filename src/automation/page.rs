//! Page primitives the automation runs on top of.
//!
//! [`Page`] is the seam between the engine and whatever hosts the records
//! application (a browser bridge, a WebDriver session, a test double). It only
//! exposes the handful of atomic operations the screen actions need.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::trace;

/// Opaque handle to an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to look for. Only visible elements match.
#[derive(Debug, Clone)]
pub enum Query {
    /// A form-group label whose text matches.
    LabelText(Regex),
    /// The text input that belongs to the same form group as the label.
    InputForLabel(ElementId),
    /// An element by its DOM id.
    ById(String),
    /// The `<label for=...>` of the element with this DOM id.
    LabelFor(String),
    /// An option of the currently open autocomplete list whose text matches.
    OptionText(Regex),
    /// A navigation link whose `href` matches.
    NavLink(Regex),
}

/// Keys the actions synthesize. Each press is a keydown/keypress/keyup triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    ArrowDown,
    Enter,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Backspace => write!(f, "Backspace"),
            Key::ArrowDown => write!(f, "ArrowDown"),
            Key::Enter => write!(f, "Enter"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("element {0} is no longer attached")]
    Detached(ElementId),

    #[error("page bridge error: {0}")]
    Bridge(String),
}

#[async_trait]
pub trait Page: Send + Sync {
    /// Current virtual path of the host application (no query or fragment).
    async fn current_path(&self) -> Result<String, PageError>;

    /// Single lookup, no waiting.
    async fn query(&self, query: &Query) -> Result<Option<ElementId>, PageError>;

    async fn value(&self, el: &ElementId) -> Result<String, PageError>;

    async fn is_checked(&self, el: &ElementId) -> Result<bool, PageError>;

    async fn focus(&self, el: &ElementId) -> Result<(), PageError>;

    /// Set an input's value so the host's own bindings observe the change
    /// (native setter followed by a bubbling `input` event).
    async fn set_value(&self, el: &ElementId, value: &str) -> Result<(), PageError>;

    async fn press_key(&self, el: &ElementId, key: Key) -> Result<(), PageError>;

    /// Click the element.
    async fn activate(&self, el: &ElementId) -> Result<(), PageError>;
}

/// How often [`wait_for`] re-queries the page.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Poll `query` until it matches or `timeout` elapses. A timeout is `Ok(None)`.
pub async fn wait_for(
    page: &dyn Page,
    query: &Query,
    timeout: Duration,
) -> Result<Option<ElementId>, PageError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(el) = page.query(query).await? {
            return Ok(Some(el));
        }
        if Instant::now() >= deadline {
            trace!(?query, "wait_for timed out");
            return Ok(None);
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Like [`wait_for`], but resolves as soon as any of `queries` matches.
pub async fn wait_for_any(
    page: &dyn Page,
    queries: &[Query],
    timeout: Duration,
) -> Result<Option<ElementId>, PageError> {
    let deadline = Instant::now() + timeout;
    loop {
        for query in queries {
            if let Some(el) = page.query(query).await? {
                return Ok(Some(el));
            }
        }
        if Instant::now() >= deadline {
            trace!(count = queries.len(), "wait_for_any timed out");
            return Ok(None);
        }
        sleep(POLL_INTERVAL).await;
    }
}
