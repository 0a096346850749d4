use std::fmt;

use regex::Regex;

/// Known screens of the records application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Summary / landing screen ("folha de rosto").
    Summary,
    /// Primary data-entry screen where the diagnosis code is filled in.
    Primary,
    /// Finalization screen with the disposition controls.
    Finalize,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Summary, Screen::Primary, Screen::Finalize];

    /// Path segment that follows the record id.
    pub fn suffix(self) -> &'static str {
        match self {
            Screen::Summary => "folhaderosto",
            Screen::Primary => "primaria",
            Screen::Finalize => "finalizar",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Summary => write!(f, "summary"),
            Screen::Primary => write!(f, "primary"),
            Screen::Finalize => write!(f, "finalize"),
        }
    }
}

/// Classifies virtual paths of the form `<app_base>/atendimento/<digits>/<suffix>`.
///
/// Rules are tried in order and anchored at both ends, so a primary path can
/// never be taken for a finalize one. The app base prefix is optional.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    rules: Vec<(Regex, Screen)>,
    record: Regex,
}

impl RouteMatcher {
    pub fn new(app_base: &str) -> Result<Self, regex::Error> {
        let base = regex::escape(app_base.trim_end_matches('/'));
        let rules = Screen::ALL
            .iter()
            .map(|&screen| {
                let pattern = format!(
                    r"(?i)^(?:{base})?/atendimento/(\d+)/{}/?$",
                    screen.suffix()
                );
                Regex::new(&pattern).map(|re| (re, screen))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let record = Regex::new(&format!(r"(?i)^(?:{base})?/atendimento/(\d+)(?:/|$)"))?;
        Ok(Self { rules, record })
    }

    /// First matching screen, or `None` for the (frequent) irrelevant paths.
    pub fn classify(&self, path: &str) -> Option<Screen> {
        let path = strip_query(path);
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(path))
            .map(|(_, screen)| *screen)
    }

    /// Record id of any path under `/atendimento/<digits>`.
    pub fn record_id<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.record
            .captures(strip_query(path))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Pattern for links (relative or absolute) to `screen` of `record_id`.
    pub fn link_to(&self, screen: Screen, record_id: &str) -> Result<Regex, regex::Error> {
        Regex::new(&format!(
            r"(?i)/atendimento/{}/{}/?$",
            regex::escape(record_id),
            screen.suffix()
        ))
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}
