use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlphaWarError {
    #[error("Device discovery failed: {0}")]
    DiscoveryFailure(String),

    #[error("No compatible device found. Ensure the dongle is connected with its switch toward the male connector and the board switch is in 'PC' mode")]
    NoCompatibleDeviceFound,

    #[error("[{label}] Handshake failed: {reason}")]
    HandshakeFailure { label: String, reason: String },

    #[error("[{label}] Read failed: {reason}")]
    TransientReadFailure { label: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("[{label}] Release failed: {reason}")]
    ReleaseFailure { label: String, reason: String },

    #[error("[{0}] Session already streaming")]
    AlreadyStreaming(String),

    #[error("[{label}] Operation not allowed in state {state}")]
    InvalidState { label: String, state: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AlphaWarError {
    /// Whether the operator can recover by rescanning, retrying, or waiting
    /// for the next epoch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFailure(_)
                | Self::NoCompatibleDeviceFound
                | Self::HandshakeFailure { .. }
                | Self::TransientReadFailure { .. }
                | Self::ReleaseFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AlphaWarError>;
