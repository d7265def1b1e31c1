use thiserror::Error;

/// Foundation error type shared by every drsnap crate.
#[derive(Error, Debug)]
pub enum SnapError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Filesystem error during {operation} on '{path}': {source}")]
    Filesystem {
        #[source]
        source: std::io::Error,
        path: String,
        operation: String,
    },

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SnapError {
    /// Create a filesystem error carrying the path and the failed operation.
    pub fn filesystem(
        source: std::io::Error,
        path: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Filesystem {
            source,
            path: path.into(),
            operation: operation.into(),
        }
    }

    /// Create a validation error, optionally naming the offending field.
    pub fn validation(message: impl Into<String>, field: Option<impl Into<String>>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(Into::into),
        }
    }

    pub fn spawn(source: std::io::Error, command: impl Into<String>) -> Self {
        Self::Spawn {
            source,
            command: command.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;
