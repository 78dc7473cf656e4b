//! Failure taxonomy for the collaborator seams (listing, opener, sink).
//!
//! Malformed JSON lines never surface here: they are dropped and counted by the scan.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// Listing fetch or file download failed. Fatal to the category (or the run, for listing).
    #[error("transport failure for '{target}': {reason}")]
    Transport { target: String, reason: String },
    /// Batch write or startup query failed; the batch was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(String),
    /// Store connection could not be established or configuration is incomplete.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LoadError {
    pub fn transport(target: impl Into<String>, reason: impl ToString) -> Self {
        LoadError::Transport { target: target.into(), reason: reason.to_string() }
    }

    /// True for failures that must stop the whole run rather than one category.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Configuration(_))
    }
}
