//! SIPREC recording session driven through the media relay
//!
//! Start: ask the relay for a fork offer covering both call legs, send it to
//! the SRS inside a recording dialog, then hand the SRS answer back to the
//! relay. Stop: drop the fork at the relay and hang up the recording dialog.
//! Encoding the recording metadata on the wire is the transport's job.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CallDirection, RecordingParams, RecordingSession, RecordingSessionFactory};
use crate::errors::{B2buaError, Result};
use crate::media::{
    MediaControlRequest, MediaProfile, MediaRelay, SubscribeAnswerRequest, SubscribeRequest,
    UnsubscribeRequest,
};

/// Recording metadata describing the call to the SRS
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingMetadata {
    pub session_id: String,
    pub call_id: String,
    pub direction: CallDirection,
    pub calling_number: Option<String>,
    pub called_number: Option<String>,
    pub aor_from: String,
    pub aor_to: String,
}

/// An established dialog with the SRS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingDialog {
    pub call_id: String,
    pub answer_sdp: String,
}

/// Signaling toward the recording service
#[async_trait]
pub trait RecordingTransport: Send + Sync {
    /// Open a recording dialog with `offer_sdp` and `metadata`
    async fn invite(
        &self,
        srs_url: &str,
        offer_sdp: String,
        metadata: &RecordingMetadata,
    ) -> Result<RecordingDialog>;

    async fn bye(&self, dialog: &RecordingDialog) -> Result<()>;
}

#[derive(Debug, Clone)]
enum SiprecState {
    Idle,
    Starting,
    Active { dialog: RecordingDialog, fork_tag: String },
    Stopped,
}

/// SIPREC recording session
pub struct SiprecRecordingSession {
    params: RecordingParams,
    relay: Arc<dyn MediaRelay>,
    transport: Arc<dyn RecordingTransport>,
    metadata: RecordingMetadata,
    state: Mutex<SiprecState>,
}

impl SiprecRecordingSession {
    pub fn new(params: RecordingParams, relay: Arc<dyn MediaRelay>, transport: Arc<dyn RecordingTransport>) -> Self {
        let metadata = RecordingMetadata {
            session_id: Uuid::new_v4().to_string(),
            call_id: params.relay_options.common.call_id.clone(),
            direction: params.direction,
            calling_number: params.calling_number.clone(),
            called_number: params.called_number.clone(),
            aor_from: params.aor_from.clone(),
            aor_to: params.aor_to.clone(),
        };
        Self {
            params,
            relay,
            transport,
            metadata,
            state: Mutex::new(SiprecState::Idle),
        }
    }

    pub fn metadata(&self) -> &RecordingMetadata {
        &self.metadata
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.state.lock(), SiprecState::Active { .. })
    }

    fn call_id(&self) -> &str {
        &self.params.relay_options.common.call_id
    }

    /// Tags of both legs as known to the relay
    fn forked_tags(&self) -> Vec<String> {
        let mut tags = Vec::with_capacity(2);
        if let Some(tag) = &self.params.relay_options.uas.tag {
            tags.push(tag.clone());
        }
        tags.push(self.params.to_tag.clone());
        tags
    }

    async fn release(&self, dialog: Option<&RecordingDialog>, fork_tag: &str) {
        match self
            .relay
            .unsubscribe(UnsubscribeRequest::new(self.call_id(), fork_tag))
            .await
        {
            Ok(response) if !response.is_ok() => {
                warn!(call_id = %self.call_id(), reason = %response.failure_reason(), "Relay refused unsubscribe")
            }
            Err(e) => warn!(call_id = %self.call_id(), error = %e, "Error unsubscribing recording fork"),
            _ => {}
        }
        if let Some(dialog) = dialog {
            if let Err(e) = self.transport.bye(dialog).await {
                warn!(call_id = %self.call_id(), error = %e, "Error ending recording dialog");
            }
        }
    }

    fn active_fork_tag(&self) -> Result<String> {
        match &*self.state.lock() {
            SiprecState::Active { fork_tag, .. } => Ok(fork_tag.clone()),
            _ => Err(B2buaError::Recording("recording is not active".to_string())),
        }
    }
}

#[async_trait]
impl RecordingSession for SiprecRecordingSession {
    async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !matches!(*state, SiprecState::Idle) {
                return Err(B2buaError::Recording("recording already started".to_string()));
            }
            *state = SiprecState::Starting;
        }
        info!(call_id = %self.call_id(), srs = %self.params.srs_url, "Starting call recording");

        let request = SubscribeRequest::new(self.call_id(), self.forked_tags(), MediaProfile::plain());
        let response = match self.relay.subscribe_request(request).await {
            Ok(response) => response,
            Err(e) => {
                *self.state.lock() = SiprecState::Stopped;
                return Err(e);
            }
        };
        if !response.is_ok() {
            *self.state.lock() = SiprecState::Stopped;
            return Err(B2buaError::Recording(format!(
                "relay subscribe request failed: {}",
                response.failure_reason()
            )));
        }
        let (offer, fork_tag) = match (response.sdp, response.to_tag) {
            (Some(sdp), Some(tag)) => (sdp, tag),
            _ => {
                *self.state.lock() = SiprecState::Stopped;
                return Err(B2buaError::Recording(
                    "relay subscribe response lacks sdp or to-tag".to_string(),
                ));
            }
        };

        let dialog = match self.transport.invite(&self.params.srs_url, offer, &self.metadata).await {
            Ok(dialog) => dialog,
            Err(e) => {
                self.release(None, &fork_tag).await;
                *self.state.lock() = SiprecState::Stopped;
                return Err(e);
            }
        };

        let answer = SubscribeAnswerRequest::new(self.call_id(), fork_tag.clone(), dialog.answer_sdp.clone());
        let failure = match self.relay.subscribe_answer(answer).await {
            Ok(response) if response.is_ok() => None,
            Ok(response) => Some(format!("relay subscribe answer failed: {}", response.failure_reason())),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = failure {
            self.release(Some(&dialog), &fork_tag).await;
            *self.state.lock() = SiprecState::Stopped;
            return Err(B2buaError::Recording(reason));
        }

        // stop() may have run while we were negotiating
        let stopped_meanwhile = {
            let mut state = self.state.lock();
            if matches!(*state, SiprecState::Stopped) {
                true
            } else {
                *state = SiprecState::Active {
                    dialog: dialog.clone(),
                    fork_tag: fork_tag.clone(),
                };
                false
            }
        };
        if stopped_meanwhile {
            self.release(Some(&dialog), &fork_tag).await;
            return Err(B2buaError::Recording("recording stopped during start".to_string()));
        }

        info!(call_id = %self.call_id(), "Call recording started");
        Ok(())
    }

    async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), SiprecState::Stopped);
        match previous {
            SiprecState::Active { dialog, fork_tag } => {
                info!(call_id = %self.call_id(), "Stopping call recording");
                self.release(Some(&dialog), &fork_tag).await;
            }
            SiprecState::Stopped => debug!(call_id = %self.call_id(), "Recording already stopped"),
            SiprecState::Idle | SiprecState::Starting => {
                debug!(call_id = %self.call_id(), "Recording stopped before it was established")
            }
        }
    }

    async fn pause(&self) -> Result<()> {
        let fork_tag = self.active_fork_tag()?;
        let response = self
            .relay
            .block_media(MediaControlRequest::new(self.call_id(), fork_tag))
            .await?;
        if !response.is_ok() {
            return Err(B2buaError::Recording(format!("pause failed: {}", response.failure_reason())));
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let fork_tag = self.active_fork_tag()?;
        let response = self
            .relay
            .unblock_media(MediaControlRequest::new(self.call_id(), fork_tag))
            .await?;
        if !response.is_ok() {
            return Err(B2buaError::Recording(format!("resume failed: {}", response.failure_reason())));
        }
        Ok(())
    }
}

/// Creates [`SiprecRecordingSession`]s sharing one transport
pub struct SiprecRecorderFactory {
    transport: Arc<dyn RecordingTransport>,
}

impl SiprecRecorderFactory {
    pub fn new(transport: Arc<dyn RecordingTransport>) -> Self {
        Self { transport }
    }
}

impl RecordingSessionFactory for SiprecRecorderFactory {
    fn create(&self, params: RecordingParams, relay: Arc<dyn MediaRelay>) -> Arc<dyn RecordingSession> {
        Arc::new(SiprecRecordingSession::new(params, relay, self.transport.clone()))
    }
}
