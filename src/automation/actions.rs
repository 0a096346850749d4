use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::page::{ElementId, Key, Page, PageError, Query, wait_for, wait_for_any};
use super::route::{RouteMatcher, Screen};

/// Tri-state result of running a screen's action sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Every sub-action for the screen reached the desired state.
    Completed,
    /// Something was found but not finished; worth a re-attempt.
    Incomplete,
    /// The screen's targets never showed up.
    NotApplicable,
}

#[derive(Debug, Clone)]
pub struct ActionSettings {
    /// Ceiling for each element lookup.
    pub element_timeout: Duration,
    /// How long to wait for the autocomplete option list.
    pub option_timeout: Duration,
    /// Pause before confirming a keyboard-driven selection.
    pub fallback_settle: Duration,
    /// Text of the label that marks the diagnosis code field.
    pub label_marker: String,
    /// What gets typed to trigger the host's search.
    pub query: String,
    /// Code the field must end up holding.
    pub target_code: String,
    /// Pattern the wanted option's text must match.
    pub option_pattern: String,
    /// DOM ids of the disposition controls on the finalize screen.
    pub disposition_controls: Vec<String>,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(12),
            option_timeout: Duration::from_secs(4),
            fallback_settle: Duration::from_millis(800),
            label_marker: "CID10-01".to_string(),
            query: "Z00".to_string(),
            target_code: DEFAULT_TARGET.to_string(),
            option_pattern: option_pattern_for(DEFAULT_TARGET),
            disposition_controls: vec!["_cbConduta_1".to_string(), "desfecho0".to_string()],
        }
    }
}

const DEFAULT_TARGET: &str = "Z00.0";

/// Option pattern for `target_code`. The default code also has to carry its
/// description, since the host lists several `Z00.0` variants.
pub fn option_pattern_for(target_code: &str) -> String {
    let code = regex::escape(target_code.trim());
    if target_code.trim().eq_ignore_ascii_case(DEFAULT_TARGET) {
        format!(r"(?i)(^|\s){code}\b.*exame.*medico.*geral")
    } else {
        format!(r"(?i)(^|\s){code}(\b|\s|$)")
    }
}

/// Per-screen action sequences. Every sequence inspects the current control
/// state first, so running it against a satisfied screen mutates nothing.
pub struct ScreenActions {
    page: Arc<dyn Page>,
    routes: RouteMatcher,
    settings: ActionSettings,
    label: Regex,
    option: Regex,
    navigated: HashSet<String>,
}

impl ScreenActions {
    pub fn new(
        page: Arc<dyn Page>,
        routes: RouteMatcher,
        settings: ActionSettings,
    ) -> Result<Self, regex::Error> {
        let label = Regex::new(&format!("(?i){}", regex::escape(&settings.label_marker)))?;
        let option = Regex::new(&settings.option_pattern)?;
        Ok(Self {
            page,
            routes,
            settings,
            label,
            option,
            navigated: HashSet::new(),
        })
    }

    /// Run the sequence registered for `screen`. Page errors are logged and
    /// reported as [`ActionOutcome::Incomplete`].
    pub async fn apply_actions(&mut self, screen: Screen, record_id: &str) -> ActionOutcome {
        let result = match screen {
            Screen::Primary => self.select_code().await,
            Screen::Finalize => self.check_disposition().await,
            Screen::Summary => self.navigate_forward(record_id).await,
        };
        match result {
            Ok(outcome) => {
                debug!(%screen, record_id, ?outcome, "screen actions applied");
                outcome
            }
            Err(e) => {
                warn!(%screen, record_id, error = %e, "screen action failed");
                ActionOutcome::Incomplete
            }
        }
    }

    fn holds_target(&self, value: &str) -> bool {
        value
            .to_uppercase()
            .contains(&self.settings.target_code.to_uppercase())
    }

    async fn select_code(&self) -> Result<ActionOutcome, PageError> {
        let page = self.page.as_ref();
        let label_query = Query::LabelText(self.label.clone());
        let Some(label) = wait_for(page, &label_query, self.settings.element_timeout).await? else {
            debug!(marker = %self.settings.label_marker, "code label not found");
            return Ok(ActionOutcome::NotApplicable);
        };
        let Some(input) = page.query(&Query::InputForLabel(label)).await? else {
            debug!("code input not rendered yet");
            return Ok(ActionOutcome::Incomplete);
        };

        if self.holds_target(&page.value(&input).await?) {
            return Ok(ActionOutcome::Completed);
        }

        page.focus(&input).await?;
        page.press_key(&input, Key::Backspace).await?;
        page.set_value(&input, "").await?;
        let mut typed = String::new();
        for ch in self.settings.query.chars() {
            page.press_key(&input, Key::Char(ch)).await?;
            typed.push(ch);
            page.set_value(&input, &typed).await?;
        }

        let option_query = Query::OptionText(self.option.clone());
        if let Some(option) = wait_for(page, &option_query, self.settings.option_timeout).await? {
            page.activate(&option).await?;
            info!(code = %self.settings.target_code, "code selected from option list");
            return Ok(ActionOutcome::Completed);
        }

        page.press_key(&input, Key::ArrowDown).await?;
        page.press_key(&input, Key::Enter).await?;
        sleep(self.settings.fallback_settle).await;
        if self.holds_target(&page.value(&input).await?) {
            info!(code = %self.settings.target_code, "code selected via keyboard fallback");
            Ok(ActionOutcome::Completed)
        } else {
            warn!(code = %self.settings.target_code, "keyboard fallback did not confirm the code");
            Ok(ActionOutcome::Incomplete)
        }
    }

    async fn check_disposition(&self) -> Result<ActionOutcome, PageError> {
        let page = self.page.as_ref();
        let controls = &self.settings.disposition_controls;
        let queries: Vec<Query> = controls.iter().map(|id| Query::ById(id.clone())).collect();
        if wait_for_any(page, &queries, self.settings.element_timeout)
            .await?
            .is_none()
        {
            debug!("disposition controls not found");
            return Ok(ActionOutcome::NotApplicable);
        }

        let mut satisfied = true;
        for (id, query) in controls.iter().zip(&queries) {
            let Some(control) = page.query(query).await? else {
                debug!(control = %id, "control not present");
                continue;
            };
            if page.is_checked(&control).await? {
                continue;
            }
            // The host renders custom widgets; only the label click reaches
            // its handlers.
            let Some(label) = page.query(&Query::LabelFor(id.clone())).await? else {
                warn!(control = %id, "control has no label to click");
                satisfied = false;
                continue;
            };
            page.activate(&label).await?;
            info!(control = %id, "control checked via its label");
            if !page.is_checked(&control).await? {
                satisfied = false;
            }
        }

        Ok(if satisfied {
            ActionOutcome::Completed
        } else {
            ActionOutcome::Incomplete
        })
    }

    // One-way: once the link was clicked for a record it is never clicked again.
    async fn navigate_forward(&mut self, record_id: &str) -> Result<ActionOutcome, PageError> {
        if self.navigated.contains(record_id) {
            return Ok(ActionOutcome::Completed);
        }
        let pattern = match self.routes.link_to(Screen::Primary, record_id) {
            Ok(p) => p,
            Err(e) => {
                warn!(record_id, error = %e, "cannot build link pattern");
                return Ok(ActionOutcome::NotApplicable);
            }
        };

        let link: Option<ElementId> = wait_for(
            self.page.as_ref(),
            &Query::NavLink(pattern),
            self.settings.element_timeout,
        )
        .await?;
        let Some(link) = link else {
            debug!(record_id, "no link to the primary screen");
            return Ok(ActionOutcome::NotApplicable);
        };

        self.navigated.insert(record_id.to_string());
        self.page.activate(&link).await?;
        info!(record_id, "moved on to the primary screen");
        Ok(ActionOutcome::Completed)
    }
}
