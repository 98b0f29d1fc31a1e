//! Error types for netreach.
//!
//! All errors are strongly typed using thiserror. The public observer and
//! dispatch surface never returns errors to callers (see the crate docs);
//! these types exist at the probe boundary and for internal plumbing.

use thiserror::Error;

/// Errors raised by a reachability probe implementation.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The underlying monitoring facility could not be started.
    ///
    /// This is non-fatal: the coordinator keeps its last cached status and
    /// the caller may retry `start_monitoring` later.
    #[error("Probe start failed: {reason}")]
    StartFailed {
        /// Platform-specific failure description.
        reason: String,
    },

    /// The coordinator side of the event sink is gone.
    #[error("Probe sink disconnected")]
    Disconnected,
}

/// Top-level error type for netreach.
#[derive(Debug, Error)]
pub enum ReachError {
    /// A probe-boundary failure.
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the invariant that broke.
        message: String,
    },
}

impl ReachError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a probe error.
    #[must_use]
    pub const fn is_probe(&self) -> bool {
        matches!(self, Self::Probe(_))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Probe(e) => matches!(e, ProbeError::StartFailed { .. }),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for netreach operations.
pub type ReachResult<T> = Result<T, ReachError>;
