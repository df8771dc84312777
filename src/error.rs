use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for one relay connection.
///
/// `Conversion` is absorbed by the relay and downgraded to a warning.
/// `Disconnected` is never reported to anyone; it only triggers cleanup.
/// Everything else ends the session with a terminal `Error` event.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("authentication failed: {reason}")]
    Auth { reason: String },
    #[error("upstream connection failed: {reason}")]
    Connect { reason: String },
    #[error("audio conversion failed: {detail}")]
    Conversion { detail: String },
    #[error("upstream protocol error: {reason}")]
    Protocol { reason: String },
    #[error("client disconnected")]
    Disconnected,
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
    #[error("audio source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    pub fn connect(reason: impl Into<String>) -> Self {
        Self::Connect {
            reason: reason.into(),
        }
    }

    pub fn conversion(detail: impl Into<String>) -> Self {
        Self::Conversion {
            detail: detail.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Whether this error ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Conversion { .. } | Self::Disconnected)
    }

    /// Whether the client should hear about this error at all.
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
