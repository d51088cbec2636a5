//! Error types for the replication reconciler

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// A single validation problem, tagged with the path of the offending field
/// (e.g. `rules[2].target.access_key`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Path of the offending field in the declaration
    pub path: String,
    /// Human-readable description of the problem
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors that can occur while reconciling replication configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Unparsable byte-size or duration text
    #[error("invalid {what} {input:?}")]
    InvalidFormat { what: &'static str, input: String },

    /// The declaration failed validation before any remote call was made
    #[error("declaration is invalid ({} issue(s)): {}", .0.len(), format_issues(.0))]
    Validation(Vec<FieldIssue>),

    /// A target bucket name was rejected locally
    #[error("invalid bucket name {bucket:?}: {reason}")]
    InvalidBucketName { bucket: String, reason: String },

    /// The remote system refused a call; surfaced verbatim, never retried
    #[error("remote call rejected while {context}: {reason}")]
    RemoteRejected { context: String, reason: String },

    /// Rule/target state on the cluster contradicts what this engine maintains
    #[error("inconsistent remote state: {0}")]
    Consistency(String),

    /// A response from the cluster could not be decoded
    #[error("unable to decode cluster response: {0}")]
    ResponseParse(String),

    /// The cancellation token fired before a remote call was issued
    #[error("reconciliation cancelled before completion")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (declaration or state file handling)
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a value in `Validation` when any issues were collected.
    pub fn from_issues<T>(value: T, issues: Vec<FieldIssue>) -> Result<T> {
        if issues.is_empty() {
            Ok(value)
        } else {
            Err(Error::Validation(issues))
        }
    }
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
