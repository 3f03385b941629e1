use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to obtain a raw payload from a source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Resource '{0}' was not found")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(StatusCode),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Request to '{0}' failed")]
    Request(String, #[source] reqwest::Error),

    #[error("Failed to read '{0}'")]
    Io(PathBuf, #[source] std::io::Error),
}

/// A structurally valid payload that is incomplete or inconsistent.
///
/// Variants are listed in the order the validator checks them.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Metadata (latitude/longitude) missing or invalid: {0}")]
    Metadata(String),

    #[error("Units missing or invalid: {0}")]
    Units(String),

    #[error("Hourly data missing: {0}")]
    HourlyMissing(String),

    #[error("Hourly array '{field}' has {found} entries, expected {expected}")]
    HourlyLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Daily array '{field}' has {found} entries, expected {expected}")]
    DailyLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

impl ValidationError {
    /// Name of the field group that failed.
    pub fn field_group(&self) -> &'static str {
        match self {
            ValidationError::Metadata(_) => "metadata",
            ValidationError::Units(_) => "units",
            ValidationError::HourlyMissing(_) => "hourly-array-presence",
            ValidationError::HourlyLength { .. } => "hourly-array-length-consistency",
            ValidationError::DailyLength { .. } => "daily-array-length-consistency",
        }
    }
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("City '{0}' not found")]
    NotFound(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),
}

#[derive(Debug, Error)]
pub enum MeteoError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Locate(#[from] LocateError),
}

const LOAD_STEPS: &[&str] = &[
    "Check that the configured data location exists and is reachable",
    "Check that the file content is valid for the selected source",
    "Try opening the location directly (browser, curl, or a text editor)",
    "Run with RUST_LOG=debug for more details",
];

const VALIDATION_STEPS: &[&str] = &[
    "Check that the document has metadata, units and hourly sections",
    "Check that every hourly array has as many entries as 'time'",
    "Run with RUST_LOG=debug for more details",
];

const LOCATE_STEPS: &[&str] = &[
    "Check the spelling of the city name",
    "Try a larger nearby city",
    "Check your network connection",
];

impl MeteoError {
    /// User-facing text: the proximate cause followed by remediation steps.
    pub fn diagnostic(&self) -> String {
        let steps = match self {
            MeteoError::Load(_) => LOAD_STEPS,
            MeteoError::Validation(_) => VALIDATION_STEPS,
            MeteoError::Locate(_) => LOCATE_STEPS,
        };

        let mut text = format!("Error: {}\n\nTroubleshooting:\n", self.cause_chain());
        for (i, step) in steps.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", i + 1, step));
        }
        text
    }

    fn cause_chain(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            text.push_str(&format!(": {err}"));
            source = err.source();
        }
        text
    }
}
