//! Error types for cargo-groom
//!
//! All modules use `GroomResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cargo-groom operations
pub type GroomResult<T> = Result<T, GroomError>;

/// All errors that can occur in cargo-groom
#[derive(Error, Debug)]
pub enum GroomError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid workspace spec: {0}")]
    WorkspaceSpec(String),

    #[error("No prior groom state found at {0}")]
    StateNotFound(PathBuf),

    #[error("Failed to create state directory {path}: {source}")]
    StateDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GroomError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandFailed { .. } => {
                Some("Make sure cargo and rustc are installed and on PATH")
            }
            Self::StateNotFound(_) => Some("Run: cargo-groom groom"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GroomError::command_exec("cargo metadata", "not a workspace");
        assert!(err.to_string().contains("cargo metadata"));
        assert!(err.to_string().contains("not a workspace"));
    }

    #[test]
    fn error_hint() {
        let err = GroomError::command_failed(
            "rustc -vV",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.hint().is_some());
        assert!(GroomError::Internal("x".into()).hint().is_none());
    }

    #[test]
    fn io_context_preserved() {
        let err = GroomError::io(
            "reading /tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("reading /tmp/x"));
    }
}
