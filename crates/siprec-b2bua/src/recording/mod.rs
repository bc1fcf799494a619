//! Session recording
//!
//! A recording session forks the call's media at the relay toward a
//! recording service (SRS). The call session creates one once media is
//! negotiated and stops it when the call ends.

pub mod siprec;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::media::{MediaRelay, RelayOptions};
use crate::signaling::SipRequest;

pub use siprec::{RecordingDialog, RecordingMetadata, RecordingTransport, SiprecRecorderFactory, SiprecRecordingSession};

/// Direction of the recorded call relative to this B2BUA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// Everything a recording session needs to know about the call
#[derive(Debug, Clone)]
pub struct RecordingParams {
    pub direction: CallDirection,
    pub original_invite: SipRequest,
    pub calling_number: Option<String>,
    pub called_number: Option<String>,
    pub srs_url: String,
    pub relay_options: RelayOptions,
    /// Tag of the outbound leg
    pub to_tag: String,
    pub aor_from: String,
    pub aor_to: String,
}

/// A side recording dialog for one call
///
/// `stop` must be safe to call at any time, including before `start` has
/// finished and more than once.
#[async_trait]
pub trait RecordingSession: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self);

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;
}

/// Builds recording sessions for new calls
pub trait RecordingSessionFactory: Send + Sync {
    fn create(&self, params: RecordingParams, relay: Arc<dyn MediaRelay>) -> Arc<dyn RecordingSession>;
}
