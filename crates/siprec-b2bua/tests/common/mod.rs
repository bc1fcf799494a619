//! Shared fixtures for the call session tests
//!
//! In-memory stand-ins for the media relay, the signaling peer with its two
//! call legs, and the recording service, plus a harness wiring them into
//! [`SessionServices`].

#![allow(dead_code)]

pub mod mock_recording;
pub mod mock_relay;
pub mod mock_signaling;

pub use mock_recording::*;
pub use mock_relay::*;
pub use mock_signaling::*;

use std::sync::Arc;
use std::time::Duration;

use rvoip_siprec_b2bua::config::B2buaConfig;
use rvoip_siprec_b2bua::media::{MediaRelay, RelayPool};
use rvoip_siprec_b2bua::routing::{RandomTrunkSelector, Trunk};
use rvoip_siprec_b2bua::session::{CallSession, CallState, SessionServices};
use rvoip_siprec_b2bua::signaling::{InboundCall, Method, SipRequest};
use tokio::sync::watch;

pub const CALL_ID: &str = "a84b4c76e66710@pc33.carrier.example.com";
pub const INBOUND_FROM_TAG: &str = "1928301774";
pub const OUTBOUND_TO_TAG: &str = "314159";

pub const PLAIN_SDP: &str = "v=0\r\n\
o=- 1 1 IN IP4 203.0.113.5\r\n\
s=-\r\n\
c=IN IP4 203.0.113.5\r\n\
t=0 0\r\n\
m=audio 49170 RTP/AVP 0 101\r\n";

pub const SRTP_SDP: &str = "v=0\r\n\
o=- 1 1 IN IP4 203.0.113.5\r\n\
s=-\r\n\
c=IN IP4 203.0.113.5\r\n\
t=0 0\r\n\
m=audio 49170 RTP/SAVP 0 101\r\n";

/// Inbound INVITE as the carrier sends it
pub fn inbound_invite(sdp: &str) -> SipRequest {
    SipRequest::new(Method::Invite, "sip:+15551234567@b2bua.example.com")
        .with_header("Via", "SIP/2.0/UDP 203.0.113.5:5060;branch=z9hG4bK776asdhds")
        .with_header("Call-ID", CALL_ID)
        .with_header(
            "From",
            format!("\"Alice\" <sip:+15550001111@carrier.example.com>;tag={}", INBOUND_FROM_TAG),
        )
        .with_header("To", "<sip:+15551234567@b2bua.example.com>")
        .with_header("CSeq", "1 INVITE")
        .with_header("Content-Type", "application/sdp")
        .with_body(sdp)
        .with_source_address("203.0.113.5")
}

/// Mocks wired together as the services of a call session
pub struct Harness {
    pub relay: Arc<MockRelay>,
    pub peer: Arc<MockPeer>,
    pub recorder: Arc<MockRecorderFactory>,
    pub services: SessionServices,
}

impl Harness {
    pub fn new(trunks: Vec<Trunk>) -> Self {
        let relay = Arc::new(MockRelay::new("10.0.0.10:22222"));
        let pool = Arc::new(RelayPool::new(4));
        pool.set_relays(vec![relay.clone() as Arc<dyn MediaRelay>]);
        Self::with_pool(trunks, relay, pool)
    }

    /// Harness whose pool has no relays
    pub fn without_relays(trunks: Vec<Trunk>) -> Self {
        let relay = Arc::new(MockRelay::new("10.0.0.10:22222"));
        Self::with_pool(trunks, relay, Arc::new(RelayPool::new(4)))
    }

    fn with_pool(trunks: Vec<Trunk>, relay: Arc<MockRelay>, pool: Arc<RelayPool>) -> Self {
        let mut config = B2buaConfig::new("sip:srs@recorder.example.com");
        config.trunks = trunks;
        let peer = Arc::new(MockPeer::new(OUTBOUND_TO_TAG));
        let recorder = Arc::new(MockRecorderFactory::default());
        let services = SessionServices {
            config: Arc::new(config),
            relay_pool: pool,
            peer: peer.clone(),
            recorder: recorder.clone(),
            trunk_selector: Arc::new(RandomTrunkSelector),
        };
        Self {
            relay,
            peer,
            recorder,
            services,
        }
    }

    pub fn session(&self, sdp: &str) -> Arc<CallSession> {
        let call = InboundCall::from_request(inbound_invite(sdp)).unwrap();
        CallSession::new(call, self.services.clone())
    }

    /// Session connected end to end with recording started
    pub async fn connected_session(&self) -> Arc<CallSession> {
        let session = self.session(PLAIN_SDP);
        session.connect().await.unwrap();
        assert_eq!(session.state(), CallState::Connected);
        let recorder = self.recorder.clone();
        eventually(move || recorder.last().map(|r| r.starts() == 1).unwrap_or(false)).await;
        session
    }
}

pub fn single_trunk() -> Vec<Trunk> {
    vec![Trunk::new("trunk.example.com").with_auth("b2bua", "secret")]
}

/// Wait until `state` is reached
pub async fn wait_for_state(rx: &mut watch::Receiver<CallState>, state: CallState) {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for call state")
        .expect("call session dropped");
}

/// Poll `condition` until it holds
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
