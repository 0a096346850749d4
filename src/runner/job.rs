use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::AppointmentSummary;

/// Extension of every delivered artifact.
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Used when a display name sanitizes down to nothing.
const FALLBACK_FILE_STEM: &str = "ficha";

/// One record to retrieve and deliver.
///
/// `sequence_index` is assigned from the listing order before any dispatch, so
/// artifact names stay ordered regardless of completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub sequence_index: usize,
    pub record_id: String,
    pub display_name: String,
}

impl Job {
    /// `NN - <sanitized name>.pdf`
    pub fn artifact_name(&self) -> String {
        safe_file_name(&format!(
            "{:02} - {}",
            self.sequence_index, self.display_name
        ))
    }
}

/// Shows the artifact name, which is also what a failed job is reported as.
impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.artifact_name())
    }
}

/// Identifies a job that failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub job: String,
    pub reason: String,
}

/// The settled outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult<R> {
    Success(R),
    Failure(JobFailure),
}

/// Map a listing into jobs, numbering them from 1 in listing order.
pub fn jobs_from_listing(listing: &[AppointmentSummary]) -> Vec<Job> {
    listing
        .iter()
        .enumerate()
        .map(|(i, a)| Job {
            sequence_index: i + 1,
            record_id: a.id.clone(),
            display_name: a.display_name(),
        })
        .collect()
}

/// Build a portable file name: accents folded to ASCII, anything outside
/// `[A-Za-z0-9-_. ]` dropped, surrounding whitespace trimmed.
pub fn safe_file_name(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter_map(fold_accent)
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect();
    let stem = cleaned.trim();
    let stem = if stem.is_empty() { FALLBACK_FILE_STEM } else { stem };
    format!("{stem}.{DOCUMENT_EXTENSION}")
}

// Compatibility decomposition of the Latin-1 letters that show up in names;
// other non-ASCII characters are dropped.
fn fold_accent(c: char) -> Option<char> {
    if c.is_ascii() {
        return Some(c);
    }
    let folded = match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        _ => return None,
    };
    Some(folded)
}
