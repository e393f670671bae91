//! Error types and exit codes for scoreboard-engine

use std::fmt;
use std::process::ExitCode;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a channel connection or judge action was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    /// No session cookie on the handshake
    MissingSession,
    /// Token not issued by this registry (or logged out)
    UnknownSession,
    /// Token was valid but its lifetime ran out
    SessionExpired,
    /// Session is valid but lacks the role for the action
    Forbidden,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingSession => "authentication required",
            Self::UnknownSession => "unknown session",
            Self::SessionExpired => "session expired",
            Self::Forbidden => "insufficient role",
        };
        f.write_str(text)
    }
}

impl std::str::FromStr for AuthFailure {
    type Err = ();

    /// Inverse of `Display`, used on close-frame reasons
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "authentication required" => Ok(Self::MissingSession),
            "unknown session" => Ok(Self::UnknownSession),
            "session expired" => Ok(Self::SessionExpired),
            "insufficient role" => Ok(Self::Forbidden),
            _ => Err(()),
        }
    }
}

/// Main error type for scoring operations
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Invalid '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Rotation error: {message}")]
    RotationState { message: String },

    #[error("Connectivity error: {message}")]
    Connectivity { message: String },

    #[error("Not authorized: {reason}")]
    Authorization { reason: AuthFailure },

    #[error("Stale write: expected version {expected}, stored version is {actual}")]
    StaleVersion { expected: u64, actual: u64 },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoringError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn rotation(message: impl Into<String>) -> Self {
        Self::RotationState {
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    /// Stable code sent to clients in `error` frames
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::RotationState { .. } => "rotation_state_error",
            Self::Connectivity { .. } => "connectivity_error",
            Self::Authorization { .. } => "authorization_error",
            Self::StaleVersion { .. } => "stale_version",
            Self::NotFound { .. } => "not_found",
            Self::Config { .. } => "config_error",
            Self::Io(_) | Self::Json(_) => "internal_error",
        }
    }

    /// Offending field for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Convert error to a process exit code:
    /// - 1: IO / internal
    /// - 2: Validation
    /// - 3: Rotation state
    /// - 4: Connectivity
    /// - 5: Authorization
    /// - 6: Configuration
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) | Self::Json(_) | Self::NotFound { .. } => ExitCode::from(1),
            Self::Validation { .. } | Self::StaleVersion { .. } => ExitCode::from(2),
            Self::RotationState { .. } => ExitCode::from(3),
            Self::Connectivity { .. } => ExitCode::from(4),
            Self::Authorization { .. } => ExitCode::from(5),
            Self::Config { .. } => ExitCode::from(6),
        }
    }
}

/// Result type alias for scoring operations
pub type Result<T> = std::result::Result<T, ScoringError>;
