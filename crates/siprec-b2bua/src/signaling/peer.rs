//! Signaling peer boundary
//!
//! The dialog stack lives behind these traits. The call session asks it to
//! bridge an inbound INVITE toward a trunk and receives two call legs plus
//! one event stream per leg.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::inbound::InboundCall;
use super::message::{InDialogRequest, Responder, SipHeaders, SipRequest, SipResponse};
use crate::errors::Result;
use crate::routing::TrunkAuth;

/// Which side of the bridge a leg is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegKind {
    /// Inbound leg, the B2BUA acts as UAS
    Uas,
    /// Outbound leg toward the trunk, the B2BUA acts as UAC
    Uac,
}

impl LegKind {
    pub fn other(self) -> LegKind {
        match self {
            LegKind::Uas => LegKind::Uac,
            LegKind::Uac => LegKind::Uas,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LegKind::Uas => "uas",
            LegKind::Uac => "uac",
        }
    }
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event raised by a call leg after the bridge is up
#[derive(Debug)]
pub enum LegEvent {
    /// Re-INVITE carrying a new offer
    Modify { request: SipRequest, responder: Responder },
    /// INFO request
    Info { request: SipRequest, responder: Responder },
    /// NOTIFY, OPTIONS, MESSAGE or REFER
    Request { request: SipRequest, responder: Responder },
    /// The dialog ended (BYE received or transaction failure)
    Destroyed,
}

/// One established dialog of the bridged pair
#[async_trait]
pub trait CallLeg: Send + Sync {
    fn kind(&self) -> LegKind;

    /// Send a request inside this dialog and wait for the final response
    async fn request(&self, request: InDialogRequest) -> Result<SipResponse>;

    /// Send a re-INVITE with the given offer, returning the remote answer
    async fn modify(&self, sdp: String) -> Result<String>;

    /// Hang up this dialog
    async fn destroy(&self) -> Result<()>;
}

/// Headers copied between the two legs in one direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHeaders {
    pub all: bool,
    pub except: Vec<String>,
}

impl ProxyHeaders {
    pub fn all_except(except: &[&str]) -> Self {
        Self {
            all: true,
            except: except.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        self.all && !self.except.iter().any(|h| h.eq_ignore_ascii_case(name))
    }
}

/// Produces the inbound leg's answer once the outbound leg has answered
#[async_trait]
pub trait InboundAnswerProvider: Send + Sync {
    /// `remote_sdp` is the outbound leg's answer, `response` its 200 OK
    async fn answer_sdp(&self, remote_sdp: String, response: &SipResponse) -> Result<String>;
}

/// Options for bridging the inbound call toward a trunk
pub struct BridgeOptions {
    /// Headers set on the outbound INVITE
    pub headers: SipHeaders,
    pub auth: Option<TrunkAuth>,
    pub proxy_request_headers: ProxyHeaders,
    pub proxy_response_headers: ProxyHeaders,
    /// SDP offered to the outbound leg
    pub local_sdp_b: String,
    /// Produces the SDP answered to the inbound leg
    pub local_sdp_a: Arc<dyn InboundAnswerProvider>,
}

/// Result of a successful bridge
pub struct LegPair {
    pub uas: Arc<dyn CallLeg>,
    pub uac: Arc<dyn CallLeg>,
    pub uas_events: mpsc::UnboundedReceiver<LegEvent>,
    pub uac_events: mpsc::UnboundedReceiver<LegEvent>,
}

/// The signaling stack as seen by a call session
#[async_trait]
pub trait SignalingPeer: Send + Sync {
    /// Send the outbound INVITE to `uri` and connect it to the inbound call
    async fn create_leg_pair(
        &self,
        inbound: &InboundCall,
        uri: &str,
        options: BridgeOptions,
    ) -> Result<LegPair>;

    /// Send a final failure response to an inbound INVITE
    async fn reject(&self, request: &SipRequest, status: u16) -> Result<()>;

    /// Release the signaling stack's state for the inbound call
    async fn end_session(&self, inbound: &InboundCall);
}
