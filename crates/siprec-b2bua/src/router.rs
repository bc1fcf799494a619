//! Inbound call routing
//!
//! The [`CallRouter`] is what the signaling stack hands new INVITEs to. It
//! creates a [`CallSession`] per call, runs it and keeps it registered until
//! the call has ended.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn, Instrument};

use crate::errors::{B2buaError, Result};
use crate::media::RelayPool;
use crate::session::{CallSession, CallState, SessionServices};
use crate::signaling::{InboundCall, SipRequest};

/// Turns inbound INVITEs into running call sessions
pub struct CallRouter {
    services: SessionServices,
    /// Live sessions by Call-ID
    calls: Arc<DashMap<String, Arc<CallSession>>>,
}

impl CallRouter {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            calls: Arc::new(DashMap::new()),
        }
    }

    /// Pool to update when relay availability changes
    pub fn relay_pool(&self) -> &Arc<RelayPool> {
        &self.services.relay_pool
    }

    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    pub fn get_call(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.calls.get(call_id).map(|entry| entry.value().clone())
    }

    /// Accept an inbound INVITE
    ///
    /// Returns as soon as the session is registered; routing continues in the
    /// background. Malformed requests are rejected with 400.
    pub async fn handle_invite(&self, request: SipRequest) -> Result<Arc<CallSession>> {
        let call = match InboundCall::from_request(request.clone()) {
            Ok(call) => call,
            Err(e) => {
                warn!(error = %e, "Rejecting malformed INVITE");
                if let Err(reject_err) = self.services.peer.reject(&request, 400).await {
                    warn!(error = %reject_err, "Error rejecting malformed INVITE");
                }
                return Err(e);
            }
        };

        let session = match self.calls.entry(call.call_id.clone()) {
            Entry::Occupied(_) => {
                debug!(call_id = %call.call_id, "Ignoring INVITE for a call already in progress");
                return Err(B2buaError::Signaling(format!("call {} already in progress", call.call_id)));
            }
            Entry::Vacant(slot) => {
                let session = CallSession::new(call, self.services.clone());
                slot.insert(session.clone());
                session
            }
        };

        let calls = self.calls.clone();
        let running = session.clone();
        let mut state = session.subscribe();
        tokio::spawn(
            async move {
                if let Err(e) = running.connect().await {
                    debug!(error = %e, "Call setup did not complete");
                }
                loop {
                    let current: CallState = *state.borrow_and_update();
                    if current.is_terminal() {
                        break;
                    }
                    if state.changed().await.is_err() {
                        break;
                    }
                }
                calls.remove(running.call_id());
                info!(active_calls = calls.len(), "Call ended");
            }
            .instrument(session.span().clone()),
        );

        Ok(session)
    }
}
