//! Diagnosis extraction from free-text oracle replies.
//!
//! The oracle is asked to answer in two sections headed `Diagnosis:` and
//! `Medicine Suggestions:`, but nothing enforces that shape. Parsing is
//! therefore total: every input yields a [`ParsedDiagnosis`], and the
//! [`ResponseShape`] records how much structure was actually found.

use serde::{Deserialize, Serialize};

/// Section marker introducing the diagnosis.
pub const DIAGNOSIS_MARKER: &str = "Diagnosis:";

/// Section marker introducing the medicine suggestions.
pub const MEDICINE_MARKER: &str = "Medicine Suggestions:";

/// Placeholder stored when no suggestions section could be found.
pub const MISSING_SUGGESTIONS: &str = "Could not retrieve medicine suggestions.";

/// How much of the expected section layout the reply contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseShape {
    /// Both markers present.
    Structured,
    /// Only the diagnosis marker present.
    DiagnosisOnly,
    /// No usable markers; the whole reply became the diagnosis.
    Unstructured,
}

impl ResponseShape {
    /// True when the reply drifted from the requested layout.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, ResponseShape::Structured)
    }
}

/// Diagnosis and medicine suggestions split out of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiagnosis {
    pub diagnosis: String,
    pub medicine_suggestions: String,
    pub shape: ResponseShape,
}

/// Split a raw oracle reply into diagnosis and medicine suggestions.
///
/// Only the first occurrence of each marker is split on; later occurrences
/// stay inside the captured text.
pub fn parse_diagnosis_response(raw: &str) -> ParsedDiagnosis {
    if raw.contains(DIAGNOSIS_MARKER) && raw.contains(MEDICINE_MARKER) {
        let (before, after) = split_once_on(raw, MEDICINE_MARKER);
        let medicine_suggestions = strip_emphasis(after).to_string();

        let diagnosis = match before.split_once(DIAGNOSIS_MARKER) {
            Some((_, diagnosis)) => diagnosis.trim(),
            None => before.trim(),
        };

        return ParsedDiagnosis {
            diagnosis: diagnosis.to_string(),
            medicine_suggestions,
            shape: ResponseShape::Structured,
        };
    }

    if let Some((_, diagnosis)) = raw.split_once(DIAGNOSIS_MARKER) {
        return ParsedDiagnosis {
            diagnosis: diagnosis.trim().to_string(),
            medicine_suggestions: MISSING_SUGGESTIONS.to_string(),
            shape: ResponseShape::DiagnosisOnly,
        };
    }

    ParsedDiagnosis {
        diagnosis: raw.to_string(),
        medicine_suggestions: MISSING_SUGGESTIONS.to_string(),
        shape: ResponseShape::Unstructured,
    }
}

fn split_once_on<'a>(text: &'a str, marker: &str) -> (&'a str, &'a str) {
    text.split_once(marker).unwrap_or((text, ""))
}

/// Trim whitespace and leftover markdown emphasis (`**`, `__`) from both ends.
fn strip_emphasis(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
}
