//! Error types for Strike Core
//!
//! Provides error handling for:
//! - Permission failures
//! - Malformed command input
//! - Persistence failures (mutation not committed)
//! - Platform call failures and timeouts

use crate::command::CommandKind;
use std::time::Duration;
use strike_store::StoreError;

/// Main command error type
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Actor lacks every role the command requires
    #[error("unauthorized: {command} requires a permitted role")]
    Unauthorized { command: CommandKind },

    /// Command name not recognised
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Input rejected before any mutation
    #[error("malformed input for '{field}': {reason}")]
    MalformedInput {
        field: &'static str,
        reason: String,
    },

    /// Durable write failed; the mutation was not committed
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Platform call failed
    #[error("platform operation failed: {0}")]
    Platform(#[from] PlatformError),
}

impl CommandError {
    /// Create malformed input error
    #[inline]
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the failure was decided at the dispatcher, before any state was touched
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. } | Self::UnknownCommand(_) | Self::MalformedInput { .. }
        )
    }

    /// Text shown to the invoking actor
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { command } => command.permission().denial_message().to_string(),
            Self::UnknownCommand(name) => format!("❌ Unknown command `{name}`."),
            Self::MalformedInput { field, reason } => format!("❌ Invalid `{field}`: {reason}."),
            Self::Persistence(_) => {
                "❌ Something went wrong while saving. Nothing was changed.".to_string()
            }
            Self::Platform(e) => format!("❌ {e}"),
        }
    }
}

/// Platform call errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// Call did not complete within the bound
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Platform refused the operation
    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    /// Member, role or channel does not exist
    #[error("{what} not found")]
    NotFound { what: String },
}

impl PlatformError {
    /// Create rejection error
    #[inline]
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }

    /// Create not-found error
    #[inline]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Check if the call ran out of time
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
