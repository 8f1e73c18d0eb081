//! Fatal error taxonomy for batch processing.
//!
//! Only conditions that abort a whole batch (a non-conforming submission
//! document) or reveal a configuration gap (a key missing from a fixed
//! lookup table) surface as errors. Per-row and per-file problems are
//! reported through `log` and recovered locally at the call site.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    /// The batch document does not conform to the expected template
    /// layout and cannot be safely processed.
    #[error("malformed batch document: {reason}")]
    Format { reason: String },

    /// A fixed lookup table has no entry for the requested key. This is
    /// a configuration gap, not a data problem.
    #[error("no {what} entry for '{key}'")]
    Lookup { what: &'static str, key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    pub fn format(reason: impl Into<String>) -> Self {
        BatchError::Format {
            reason: reason.into(),
        }
    }

    pub fn lookup(what: &'static str, key: impl Into<String>) -> Self {
        BatchError::Lookup {
            what,
            key: key.into(),
        }
    }
}
