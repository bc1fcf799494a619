// Signaling peer and call leg stand-ins

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rvoip_siprec_b2bua::errors::{B2buaError, Result};
use rvoip_siprec_b2bua::routing::TrunkAuth;
use rvoip_siprec_b2bua::signaling::{
    BridgeOptions, CallLeg, InDialogRequest, InboundCall, LegEvent, LegKind, LegPair, ProxyHeaders,
    SignalingPeer, SipHeaders, SipRequest, SipResponse,
};

pub const CALLEE_SDP: &str = "v=0\r\no=- 7 7 IN IP4 198.51.100.20\r\ns=-\r\nc=IN IP4 198.51.100.20\r\nt=0 0\r\nm=audio 20000 RTP/AVP 0 101\r\n";

pub struct MockLeg {
    kind: LegKind,
    pub requests: Mutex<Vec<InDialogRequest>>,
    pub modifies: Mutex<Vec<String>>,
    destroys: AtomicUsize,
    fail_requests: AtomicBool,
    response: Mutex<SipResponse>,
    modify_answer: Mutex<String>,
}

impl MockLeg {
    pub fn new(kind: LegKind) -> Self {
        Self {
            kind,
            requests: Mutex::new(Vec::new()),
            modifies: Mutex::new(Vec::new()),
            destroys: AtomicUsize::new(0),
            fail_requests: AtomicBool::new(false),
            response: Mutex::new(SipResponse::new(200)),
            modify_answer: Mutex::new(CALLEE_SDP.to_string()),
        }
    }

    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    /// Response returned to in-dialog requests sent on this leg
    pub fn respond_with(&self, response: SipResponse) {
        *self.response.lock() = response;
    }

    pub fn fail_requests(&self) {
        self.fail_requests.store(true, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CallLeg for MockLeg {
    fn kind(&self) -> LegKind {
        self.kind
    }

    async fn request(&self, request: InDialogRequest) -> Result<SipResponse> {
        self.requests.lock().push(request);
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(B2buaError::Signaling("transaction timeout".to_string()));
        }
        Ok(self.response.lock().clone())
    }

    async fn modify(&self, sdp: String) -> Result<String> {
        self.modifies.lock().push(sdp);
        Ok(self.modify_answer.lock().clone())
    }

    async fn destroy(&self) -> Result<()> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What the session asked the peer to bridge
#[derive(Debug, Clone)]
pub struct BridgeRecord {
    pub uri: String,
    pub headers: SipHeaders,
    pub auth: Option<TrunkAuth>,
    pub proxy_request_headers: ProxyHeaders,
    pub proxy_response_headers: ProxyHeaders,
    pub local_sdp_b: String,
    /// SDP the session produced for the inbound leg
    pub inbound_answer: Option<String>,
}

pub struct MockPeer {
    outbound_tag: String,
    pub uas: Arc<MockLeg>,
    pub uac: Arc<MockLeg>,
    pub bridges: Mutex<Vec<BridgeRecord>>,
    pub rejections: Mutex<Vec<u16>>,
    ended: AtomicUsize,
    fail_bridge: AtomicBool,
    uas_events: Mutex<Option<mpsc::UnboundedSender<LegEvent>>>,
    uac_events: Mutex<Option<mpsc::UnboundedSender<LegEvent>>>,
}

impl MockPeer {
    pub fn new(outbound_tag: &str) -> Self {
        Self {
            outbound_tag: outbound_tag.to_string(),
            uas: Arc::new(MockLeg::new(LegKind::Uas)),
            uac: Arc::new(MockLeg::new(LegKind::Uac)),
            bridges: Mutex::new(Vec::new()),
            rejections: Mutex::new(Vec::new()),
            ended: AtomicUsize::new(0),
            fail_bridge: AtomicBool::new(false),
            uas_events: Mutex::new(None),
            uac_events: Mutex::new(None),
        }
    }

    /// Make the outbound INVITE fail with a final error response
    pub fn fail_bridge(&self) {
        self.fail_bridge.store(true, Ordering::SeqCst);
    }

    pub fn end_count(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn bridge_count(&self) -> usize {
        self.bridges.lock().len()
    }

    pub fn last_bridge(&self) -> Option<BridgeRecord> {
        self.bridges.lock().last().cloned()
    }

    pub fn leg(&self, kind: LegKind) -> &Arc<MockLeg> {
        match kind {
            LegKind::Uas => &self.uas,
            LegKind::Uac => &self.uac,
        }
    }

    /// Deliver an event as if raised by the given leg
    pub fn send_event(&self, kind: LegKind, event: LegEvent) {
        let sender = match kind {
            LegKind::Uas => self.uas_events.lock().clone(),
            LegKind::Uac => self.uac_events.lock().clone(),
        };
        sender
            .expect("legs not bridged")
            .send(event)
            .expect("leg event loop gone");
    }
}

#[async_trait]
impl SignalingPeer for MockPeer {
    async fn create_leg_pair(
        &self,
        _inbound: &InboundCall,
        uri: &str,
        options: BridgeOptions,
    ) -> Result<LegPair> {
        let mut record = BridgeRecord {
            uri: uri.to_string(),
            headers: options.headers.clone(),
            auth: options.auth.clone(),
            proxy_request_headers: options.proxy_request_headers.clone(),
            proxy_response_headers: options.proxy_response_headers.clone(),
            local_sdp_b: options.local_sdp_b.clone(),
            inbound_answer: None,
        };
        if self.fail_bridge.load(Ordering::SeqCst) {
            self.bridges.lock().push(record);
            return Err(B2buaError::BridgeCreation("trunk answered 503".to_string()));
        }

        let ok = SipResponse::new(200)
            .with_header("To", format!("<sip:+15551234567@trunk.example.com>;tag={}", self.outbound_tag))
            .with_header("Content-Type", "application/sdp")
            .with_body(CALLEE_SDP);
        let answer = options.local_sdp_a.answer_sdp(CALLEE_SDP.to_string(), &ok).await;
        record.inbound_answer = answer.as_ref().ok().cloned();
        self.bridges.lock().push(record);
        answer?;

        let (uas_tx, uas_rx) = mpsc::unbounded_channel();
        let (uac_tx, uac_rx) = mpsc::unbounded_channel();
        *self.uas_events.lock() = Some(uas_tx);
        *self.uac_events.lock() = Some(uac_tx);
        Ok(LegPair {
            uas: self.uas.clone(),
            uac: self.uac.clone(),
            uas_events: uas_rx,
            uac_events: uac_rx,
        })
    }

    async fn reject(&self, _request: &SipRequest, status: u16) -> Result<()> {
        self.rejections.lock().push(status);
        Ok(())
    }

    async fn end_session(&self, _inbound: &InboundCall) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}
