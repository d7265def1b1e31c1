//! Error types for provider CLI operations.

use thiserror::Error;

/// Errors surfaced by a [`crate::ProviderClient`].
///
/// A failed command has already been retried by the executor by the time
/// it becomes a `CommandFailed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Command failed with exit code {exit_code}: {command}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Unexpected response from {command}: {reason}")]
    MalformedResponse { command: String, reason: String },

    #[error("No authenticated identity; run 'az login' first")]
    NoIdentity,
}

impl ProviderError {
    /// Standard error text of the failed command, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
