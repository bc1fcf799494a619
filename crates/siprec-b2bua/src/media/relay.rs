//! Media relay client boundary and the per-call relay resource

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::request::{
    AnswerRequest, DeleteRequest, MediaControlRequest, OfferRequest, PlayDtmfRequest,
    RelayResponse, SubscribeAnswerRequest, SubscribeRequest, UnsubscribeRequest,
};
use crate::errors::Result;

/// DTMF event reported by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtmfEvent {
    /// RFC 4733 event code
    pub event: u8,
    /// Duration in milliseconds
    pub duration: u32,
}

/// Control channel to one media relay instance
///
/// Every command is an asynchronous request; timeouts are the client's
/// concern and surface as `Err`. A non-ok `result` is returned as `Ok` so the
/// caller decides how to treat it.
#[async_trait]
pub trait MediaRelay: Send + Sync {
    /// Endpoint this client talks to, for logging
    fn endpoint(&self) -> &str;

    async fn offer(&self, request: OfferRequest) -> Result<RelayResponse>;

    async fn answer(&self, request: AnswerRequest) -> Result<RelayResponse>;

    async fn delete(&self, request: DeleteRequest) -> Result<()>;

    async fn block_media(&self, request: MediaControlRequest) -> Result<RelayResponse>;

    async fn unblock_media(&self, request: MediaControlRequest) -> Result<RelayResponse>;

    async fn block_dtmf(&self, request: MediaControlRequest) -> Result<RelayResponse>;

    async fn unblock_dtmf(&self, request: MediaControlRequest) -> Result<RelayResponse>;

    async fn play_dtmf(&self, request: PlayDtmfRequest) -> Result<RelayResponse>;

    /// Deliver DTMF events detected on `tag` to `events`
    async fn subscribe_dtmf(
        &self,
        call_id: &str,
        tag: &str,
        events: mpsc::UnboundedSender<DtmfEvent>,
    ) -> Result<()>;

    async fn unsubscribe_dtmf(&self, call_id: &str, tag: &str) -> Result<()>;

    async fn subscribe_request(&self, request: SubscribeRequest) -> Result<RelayResponse>;

    async fn subscribe_answer(&self, request: SubscribeAnswerRequest) -> Result<RelayResponse>;

    async fn unsubscribe(&self, request: UnsubscribeRequest) -> Result<RelayResponse>;
}

/// The relay-side media context of one call
///
/// Owned by exactly one call session. `destroy` issues the relay delete at
/// most once, however many times and from however many tasks it is called.
pub struct RelayResource {
    relay: Arc<dyn MediaRelay>,
    request: DeleteRequest,
    destroyed: AtomicBool,
}

impl RelayResource {
    pub fn new(relay: Arc<dyn MediaRelay>, request: DeleteRequest) -> Self {
        Self {
            relay,
            request,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Release the relay context; returns true for the call that did it
    ///
    /// Relay errors are logged and swallowed.
    pub async fn destroy(&self) -> bool {
        if self
            .destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(call_id = %self.request.common.call_id, "Relay resource already destroyed");
            return false;
        }

        match self.relay.delete(self.request.clone()).await {
            Ok(()) => debug!(call_id = %self.request.common.call_id, "Relay resource destroyed"),
            Err(e) => info!(
                call_id = %self.request.common.call_id,
                endpoint = %self.relay.endpoint(),
                error = %e,
                "Error destroying relay resource"
            ),
        }
        true
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RelayResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayResource")
            .field("endpoint", &self.relay.endpoint())
            .field("call_id", &self.request.common.call_id)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
