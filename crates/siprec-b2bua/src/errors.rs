//! Error types for the SIPREC B2BUA
//!
//! Setup-time errors unwind the whole call and surface as a rejection of the
//! inbound INVITE. Mid-call errors are contained to the in-dialog request
//! that triggered them. Teardown never returns errors; it logs them.

use thiserror::Error;

/// Errors produced while routing, negotiating or recording a call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum B2buaError {
    /// No media relay instance could be obtained from the pool
    #[error("No available media relay")]
    NoAvailableMediaRelay,

    /// The trunk list is empty
    #[error("No available outbound trunk")]
    NoAvailableTrunk,

    /// The relay answered an offer/answer with a non-ok result
    #[error("Media relay {operation} failed: {reason}")]
    MediaNegotiation {
        operation: &'static str,
        reason: String,
    },

    /// The bridged leg pair could not be created
    #[error("Failed to create bridged call legs: {0}")]
    BridgeCreation(String),

    /// Mid-call renegotiation failed
    #[error("Re-INVITE negotiation failed: {0}")]
    ReinviteNegotiation(String),

    /// Relaying an in-dialog request to the sibling leg failed
    #[error("In-dialog passthrough failed: {0}")]
    Passthrough(String),

    /// Signaling peer reported an error
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Media relay transport or protocol error
    #[error("Media relay error: {0}")]
    Relay(String),

    /// Recording service error
    #[error("Recording error: {0}")]
    Recording(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl B2buaError {
    /// Non-ok relay result for the given operation
    pub fn negotiation(operation: &'static str, reason: impl Into<String>) -> Self {
        B2buaError::MediaNegotiation {
            operation,
            reason: reason.into(),
        }
    }

    /// SIP status used when this error rejects an inbound request
    pub fn sip_status(&self) -> u16 {
        match self {
            B2buaError::NoAvailableMediaRelay => 480,
            B2buaError::NoAvailableTrunk => 503,
            B2buaError::MediaNegotiation { .. } | B2buaError::ReinviteNegotiation(_) => 488,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, B2buaError>;
