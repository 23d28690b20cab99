use std::time::Duration;

use thiserror::Error;

/// Why a location request produced no fix.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("no location fix within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Why an outbound message was not acknowledged.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to write message to the watch link")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a single weather cycle.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("location request failed")]
    Location(#[from] LocationError),

    #[error("weather request failed")]
    Transport(#[source] anyhow::Error),

    #[error("malformed weather response")]
    Parse(#[from] serde_json::Error),

    #[error("message send failed")]
    Send(#[from] SendError),
}

impl BridgeError {
    /// Cycle state the failure happened in.
    pub fn stage(&self) -> &'static str {
        match self {
            BridgeError::Location(_) => "locating",
            BridgeError::Transport(_) | BridgeError::Parse(_) => "fetching",
            BridgeError::Send(_) => "sending",
        }
    }
}
