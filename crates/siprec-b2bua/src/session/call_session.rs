//! Call session state machine
//!
//! A [`CallSession`] takes one inbound INVITE from acceptance to teardown:
//!
//! 1. acquire a media relay and rewrite the inbound offer through it,
//! 2. pick a trunk and bridge the call toward it through the signaling peer,
//!    answering the relay with the outbound leg's SDP once it answers,
//! 3. start the recording session and relay DTMF, re-INVITEs, INFO and other
//!    in-dialog requests between the two legs,
//! 4. release everything exactly once when either leg goes away.
//!
//! State changes are published on a `watch` channel, see [`CallSession::subscribe`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use super::dtmf::{dtmf_relay_body, DTMF_RELAY_CONTENT_TYPE};
use super::state::CallState;
use crate::config::B2buaConfig;
use crate::errors::{B2buaError, Result};
use crate::media::request::direction_for;
use crate::media::{
    parse_connection_ip, sdp_wants_srtp, AnswerRequest, DeleteRequest, DtmfEvent,
    MediaControlRequest, MediaRelay, OfferRequest, PlayDtmfRequest, RelayOptions, RelayPool,
    RelayResource, RelayResponse,
};
use crate::recording::{CallDirection, RecordingParams, RecordingSession, RecordingSessionFactory};
use crate::routing::TrunkSelector;
use crate::signaling::{
    address_of_record, outbound_from_header, parse_address, BridgeOptions, CallLeg, InDialogRequest,
    InboundAnswerProvider, InboundCall, LegEvent, LegKind, LegPair, Method, ProxyHeaders, Responder, SignalingPeer,
    SipHeaders, SipRequest, SipResponse,
};

/// Headers never copied from one leg's request onto the sibling's
const DIALOG_HEADERS: &[&str] = &[
    "via",
    "from",
    "to",
    "call-id",
    "cseq",
    "max-forwards",
    "content-length",
];

const PROXY_REQUEST_EXCLUDED: &[&str] = &[
    "Authorization",
    "Max-Forwards",
    "Record-Route",
    "Session-Expires",
    "X-Subspace-Forwarded-For",
];

const PROXY_RESPONSE_EXCLUDED: &[&str] = &["X-Trace-ID"];

/// Collaborators shared by every call session of the process
#[derive(Clone)]
pub struct SessionServices {
    /// Read-only configuration
    pub config: Arc<B2buaConfig>,
    /// Relay instances available for new calls
    pub relay_pool: Arc<RelayPool>,
    /// Dialog stack
    pub peer: Arc<dyn SignalingPeer>,
    /// Builds the recording session once media is up
    pub recorder: Arc<dyn RecordingSessionFactory>,
    /// Trunk selection policy
    pub trunk_selector: Arc<dyn TrunkSelector>,
}

/// Handles to both legs once bridged
struct Legs {
    uas: Arc<dyn CallLeg>,
    uac: Arc<dyn CallLeg>,
}

impl Legs {
    fn get(&self, kind: LegKind) -> &Arc<dyn CallLeg> {
        match kind {
            LegKind::Uas => &self.uas,
            LegKind::Uac => &self.uac,
        }
    }
}

fn leg_index(kind: LegKind) -> usize {
    match kind {
        LegKind::Uas => 0,
        LegKind::Uac => 1,
    }
}

/// One inbound call bridged toward a trunk
pub struct CallSession {
    call: InboundCall,
    services: SessionServices,
    span: Span,
    state: watch::Sender<CallState>,

    /// Relay chosen for this call, fixed for its lifetime
    relay: OnceCell<Arc<dyn MediaRelay>>,
    /// Relay-side media context, released once
    resource: OnceCell<Arc<RelayResource>>,
    /// Tags and media profiles of both legs
    relay_options: RwLock<Option<RelayOptions>>,

    /// Leg handles, dropped on teardown
    legs: Mutex<Option<Legs>>,
    leg_destroyed: [AtomicBool; 2],

    recording: Mutex<Option<Arc<dyn RecordingSession>>>,

    dtmf_subscribed: AtomicBool,
    dtmf_task: Mutex<Option<JoinHandle<()>>>,

    inbound_ended: AtomicBool,
}

impl CallSession {
    pub fn new(call: InboundCall, services: SessionServices) -> Arc<Self> {
        let span = info_span!("call", call_id = %call.call_id);
        let (state, _) = watch::channel(CallState::Init);
        Arc::new(Self {
            call,
            services,
            span,
            state,
            relay: OnceCell::new(),
            resource: OnceCell::new(),
            relay_options: RwLock::new(None),
            legs: Mutex::new(None),
            leg_destroyed: [AtomicBool::new(false), AtomicBool::new(false)],
            recording: Mutex::new(None),
            dtmf_subscribed: AtomicBool::new(false),
            dtmf_task: Mutex::new(None),
            inbound_ended: AtomicBool::new(false),
        })
    }

    pub fn call_id(&self) -> &str {
        &self.call.call_id
    }

    pub fn inbound(&self) -> &InboundCall {
        &self.call
    }

    /// Tracing span carrying this call's id
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    /// Watch state changes; the receiver sees the current state first
    pub fn subscribe(&self) -> watch::Receiver<CallState> {
        self.state.subscribe()
    }

    /// Snapshot of the relay options, once the relay is acquired
    pub fn relay_options(&self) -> Option<RelayOptions> {
        self.relay_options.read().clone()
    }

    pub fn has_recording(&self) -> bool {
        self.recording.lock().is_some()
    }

    pub fn is_dtmf_subscribed(&self) -> bool {
        self.dtmf_subscribed.load(Ordering::SeqCst)
    }

    /// Whether the session still holds its leg handles
    pub fn legs_linked(&self) -> bool {
        self.legs.lock().is_some()
    }

    fn transition(&self, next: CallState) -> bool {
        let mut previous = None;
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                previous = Some(*current);
                *current = next;
                true
            } else {
                false
            }
        });
        match previous {
            Some(from) => {
                debug!(from = %from, to = %next, "Call state changed");
                true
            }
            None => {
                debug!(state = %self.state(), refused = %next, "Ignoring call state change");
                false
            }
        }
    }

    fn sibling(&self, kind: LegKind) -> Option<Arc<dyn CallLeg>> {
        self.legs.lock().as_ref().map(|legs| legs.get(kind.other()).clone())
    }

    /// Route the inbound call
    ///
    /// Resolves once the bridge is up or the setup failed. All failures have
    /// already been handled (inbound rejected or ended, resources released)
    /// by the time the error is returned.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let span = self.span.clone();
        self.run_connect().instrument(span).await
    }

    async fn run_connect(self: &Arc<Self>) -> Result<()> {
        if self.state() != CallState::Init {
            return Err(B2buaError::Signaling(format!(
                "call already {}, cannot connect again",
                self.state()
            )));
        }
        info!(
            calling = ?self.call.calling_number,
            called = ?self.call.called_number,
            "Routing inbound call"
        );

        let relay = match self.services.relay_pool.acquire() {
            Some(relay) => relay,
            None => {
                info!("No available media relays, rejecting call");
                let err = B2buaError::NoAvailableMediaRelay;
                if let Err(e) = self.services.peer.reject(&self.call.request, err.sip_status()).await {
                    warn!(error = %e, "Error rejecting inbound call");
                }
                self.transition(CallState::Failed);
                return Err(err);
            }
        };
        debug!(endpoint = relay.endpoint(), "Acquired media relay");

        let sdp = self.call.sdp.clone().unwrap_or_default();
        let options = RelayOptions::new(&self.call.call_id, &self.call.from_tag, sdp_wants_srtp(&sdp), false);
        let resource = Arc::new(RelayResource::new(relay.clone(), DeleteRequest::new(&options.common)));
        // connect() only proceeds from Init, so both cells are still empty
        let _ = self.relay.set(relay.clone());
        let _ = self.resource.set(resource);
        *self.relay_options.write() = Some(options.clone());

        match self.bridge(&relay, &options, sdp).await {
            Ok(pair) => {
                self.on_bridged(pair).await;
                Ok(())
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn bridge(self: &Arc<Self>, relay: &Arc<dyn MediaRelay>, options: &RelayOptions, sdp: String) -> Result<LegPair> {
        let trunk = self
            .services
            .trunk_selector
            .select(&self.services.config.trunks)
            .map_err(|e| {
                error!("No trunks configured");
                e
            })?
            .clone();
        let called = self
            .call
            .called_number
            .clone()
            .ok_or_else(|| B2buaError::Signaling("request URI has no user part".to_string()))?;
        let uri = trunk.request_uri(&called);

        self.transition(CallState::NegotiatingOffer);
        let from_tag = options.tag(LegKind::Uas).unwrap_or_default().to_string();
        let offer = OfferRequest::new(
            &options.common,
            &options.uac.profile,
            from_tag,
            None,
            direction_for(LegKind::Uas),
            sdp,
        );
        let response = relay.offer(offer).await?;
        debug!(
            result = %response.result,
            media_ip = ?response.sdp.as_deref().and_then(parse_connection_ip),
            "Response from relay to offer"
        );
        if !response.is_ok() {
            error!(reason = %response.failure_reason(), "Error allocating relay endpoint for outbound leg");
            return Err(B2buaError::negotiation("offer", response.failure_reason()));
        }
        let offer_sdp = response
            .sdp
            .ok_or_else(|| B2buaError::negotiation("offer", "relay returned no sdp"))?;

        self.transition(CallState::Routing);
        let bridge = BridgeOptions {
            headers: self.outbound_headers(),
            auth: trunk.auth.clone(),
            proxy_request_headers: ProxyHeaders::all_except(PROXY_REQUEST_EXCLUDED),
            proxy_response_headers: ProxyHeaders::all_except(PROXY_RESPONSE_EXCLUDED),
            local_sdp_b: offer_sdp,
            local_sdp_a: Arc::new(InboundAnswer {
                session: Arc::downgrade(self),
            }),
        };
        info!(uri = %uri, "Sending INVITE to trunk");
        let pair = self
            .services
            .peer
            .create_leg_pair(&self.call, &uri, bridge)
            .await
            .map_err(|e| match e {
                B2buaError::BridgeCreation(_) | B2buaError::MediaNegotiation { .. } => e,
                other => B2buaError::BridgeCreation(other.to_string()),
            })?;

        if self.state() != CallState::NegotiatingAnswer {
            if let Err(e) = pair.uas.destroy().await {
                debug!(error = %e, "Error destroying inbound leg");
            }
            if let Err(e) = pair.uac.destroy().await {
                debug!(error = %e, "Error destroying outbound leg");
            }
            return Err(B2buaError::BridgeCreation(
                "outbound leg answered without media negotiation".to_string(),
            ));
        }
        Ok(pair)
    }

    /// Headers for the outbound INVITE
    fn outbound_headers(&self) -> SipHeaders {
        let mut headers = SipHeaders::new();
        headers.append("From", outbound_from_header(&self.call.from));
        headers.append("To", self.call.raw_to());
        headers.append("X-Forwarded-For", self.call.source_address());
        if let Some(contact) = &self.services.config.private_sip_address {
            headers.append("Contact", format!("<sip:{}>", contact));
        }
        headers
    }

    /// Answer the relay with the outbound leg's SDP
    ///
    /// Returns the SDP for the inbound leg. Starts recording on success.
    async fn negotiate_answer(&self, remote_sdp: String, response: &SipResponse) -> Result<String> {
        let to_tag = response
            .header("To")
            .and_then(parse_address)
            .and_then(|to| to.tag().map(str::to_string))
            .ok_or_else(|| B2buaError::BridgeCreation("outbound answer has no To tag".to_string()))?;

        self.transition(CallState::NegotiatingAnswer);
        let options = {
            let mut guard = self.relay_options.write();
            let options = guard
                .as_mut()
                .ok_or_else(|| B2buaError::BridgeCreation("no media context".to_string()))?;
            options.uac.tag = Some(to_tag.clone());
            options.clone()
        };
        let relay = self
            .relay
            .get()
            .cloned()
            .ok_or_else(|| B2buaError::BridgeCreation("no media relay".to_string()))?;

        let request = AnswerRequest::new(
            &options.common,
            &options.uas.profile,
            options.tag(LegKind::Uas).unwrap_or_default(),
            to_tag,
            remote_sdp,
        );
        let response = relay.answer(request).await?;
        debug!(result = %response.result, "Response from relay to answer");
        if !response.is_ok() {
            error!(reason = %response.failure_reason(), "Relay answer failed");
            return Err(B2buaError::negotiation("answer", response.failure_reason()));
        }
        let sdp = response
            .sdp
            .ok_or_else(|| B2buaError::negotiation("answer", "relay returned no sdp"))?;

        self.start_recording_session(relay, options);
        Ok(sdp)
    }

    fn start_recording_session(&self, relay: Arc<dyn MediaRelay>, options: RelayOptions) {
        let params = RecordingParams {
            direction: CallDirection::Inbound,
            original_invite: self.call.request.clone(),
            calling_number: self.call.calling_number.clone(),
            called_number: self.call.called_number.clone(),
            srs_url: self.services.config.srs_url.clone(),
            to_tag: options.uac.tag.clone().unwrap_or_default(),
            relay_options: options,
            aor_from: address_of_record(&self.call.from.uri),
            aor_to: address_of_record(&self.call.to.uri),
        };
        info!(srs = %params.srs_url, "Starting call recording");

        let recording = {
            let mut slot = self.recording.lock();
            if slot.is_some() {
                warn!("Recording session already exists");
                return;
            }
            let recording = self.services.recorder.create(params, relay);
            *slot = Some(recording.clone());
            recording
        };
        tokio::spawn(
            async move {
                if let Err(e) = recording.start().await {
                    error!(error = %e, "Error starting call recording");
                }
            }
            .instrument(self.span.clone()),
        );
    }

    async fn on_bridged(self: &Arc<Self>, pair: LegPair) {
        let LegPair {
            uas,
            uac,
            uas_events,
            uac_events,
        } = pair;
        *self.legs.lock() = Some(Legs { uas, uac });
        self.transition(CallState::Connected);
        info!("Call connected to trunk");

        self.subscribe_for_dtmf().await;
        self.spawn_leg_events(LegKind::Uas, uas_events);
        self.spawn_leg_events(LegKind::Uac, uac_events);
    }

    async fn fail(&self, err: &B2buaError) {
        let state = self.state();
        error!(error = %err, state = %state, "Error routing inbound call");

        if let Some(resource) = self.resource.get() {
            resource.destroy().await;
        }
        // Once the outbound INVITE is out the peer owns the inbound final response
        if matches!(state, CallState::Init | CallState::NegotiatingOffer) {
            if let Err(e) = self.services.peer.reject(&self.call.request, err.sip_status()).await {
                warn!(error = %e, "Error rejecting inbound call");
            }
        }
        self.end_inbound().await;
        self.stop_recording().await;
        self.transition(CallState::Failed);
    }

    /// Drive one leg's events until the leg is destroyed or the call ends
    ///
    /// Holds the session weakly; exits on a terminal state even while the
    /// peer keeps the channel open.
    fn spawn_leg_events(self: &Arc<Self>, kind: LegKind, mut events: mpsc::UnboundedReceiver<LegEvent>) {
        let session = Arc::downgrade(self);
        let mut state = self.subscribe();
        let span = self.span.clone();
        tokio::spawn(
            async move {
                loop {
                    let event = tokio::select! {
                        event = events.recv() => event,
                        _ = state.wait_for(|s| s.is_terminal()) => None,
                    };
                    let Some(event) = event else { break };
                    let Some(session) = session.upgrade() else { break };
                    match event {
                        LegEvent::Modify { request, responder } => {
                            tokio::spawn(
                                async move {
                                    let _ = session.handle_modify(kind, request, responder).await;
                                }
                                .instrument(Span::current()),
                            );
                        }
                        LegEvent::Info { request, responder } => {
                            tokio::spawn(
                                async move {
                                    let _ = session.handle_info(kind, request, responder).await;
                                }
                                .instrument(Span::current()),
                            );
                        }
                        LegEvent::Request { request, responder } => {
                            tokio::spawn(
                                async move {
                                    let _ = session.forward_request(kind, request, responder).await;
                                }
                                .instrument(Span::current()),
                            );
                        }
                        LegEvent::Destroyed => {
                            session.on_leg_destroyed(kind).await;
                            break;
                        }
                    }
                }
                debug!(leg = %kind, "Leg event loop finished");
            }
            .instrument(span),
        );
    }

    /// Renegotiate media for a re-INVITE received on `origin`
    ///
    /// Answers 200 with the relay's final SDP, or 488 when the relay rejects
    /// either half. Other failures are logged and leave the request unanswered.
    pub async fn handle_modify(&self, origin: LegKind, request: SipRequest, responder: Responder) -> Result<()> {
        if !self.transition(CallState::Modifying) {
            let status = if self.state() == CallState::Modifying { 491 } else { 481 };
            info!(leg = %origin, status, "Rejecting re-INVITE");
            responder.send(SipResponse::new(status));
            return Err(B2buaError::ReinviteNegotiation(format!(
                "call is {}, cannot renegotiate",
                self.state()
            )));
        }

        let result = self.renegotiate(origin, &request).await;
        self.transition(CallState::Connected);

        match result {
            Ok(sdp) => {
                responder.send(
                    SipResponse::new(200)
                        .with_header("Content-Type", "application/sdp")
                        .with_body(sdp),
                );
                Ok(())
            }
            Err(e @ B2buaError::ReinviteNegotiation(_)) => {
                error!(leg = %origin, error = %e, "Error handling re-INVITE");
                responder.send(SipResponse::new(488));
                Err(e)
            }
            Err(e) => {
                error!(leg = %origin, error = %e, "Error handling re-INVITE");
                Err(e)
            }
        }
    }

    async fn renegotiate(&self, origin: LegKind, request: &SipRequest) -> Result<String> {
        let options = self
            .relay_options()
            .ok_or_else(|| B2buaError::ReinviteNegotiation("no media context".to_string()))?;
        let relay = self
            .relay
            .get()
            .cloned()
            .ok_or_else(|| B2buaError::ReinviteNegotiation("no media relay".to_string()))?;
        let sibling = self
            .sibling(origin)
            .ok_or_else(|| B2buaError::ReinviteNegotiation("sibling leg is gone".to_string()))?;
        let (from_tag, to_tag) = match (options.tag(origin), options.tag(origin.other())) {
            (Some(from), Some(to)) => (from.to_string(), to.to_string()),
            _ => return Err(B2buaError::ReinviteNegotiation("leg tags unknown".to_string())),
        };
        let offered = request
            .offered_sdp()
            .ok_or_else(|| B2buaError::ReinviteNegotiation("no application/sdp body".to_string()))?;

        let offer = OfferRequest::new(
            &options.common,
            &options.leg(origin.other()).profile,
            from_tag.clone(),
            Some(to_tag.clone()),
            direction_for(origin),
            offered,
        );
        let response = relay.offer(offer).await?;
        debug!(leg = %origin, result = %response.result, "Response from relay to re-INVITE offer");
        let offer_sdp = accepted_sdp(response, "offer")?;

        let answer_sdp = sibling.modify(offer_sdp).await?;

        let answer = AnswerRequest::new(
            &options.common,
            &options.leg(origin).profile,
            from_tag,
            to_tag,
            answer_sdp,
        );
        let response = relay.answer(answer).await?;
        debug!(leg = %origin, result = %response.result, "Response from relay to re-INVITE answer");
        accepted_sdp(response, "answer")
    }

    /// Relay an INFO to the sibling leg and mirror its response
    pub async fn handle_info(&self, origin: LegKind, request: SipRequest, responder: Responder) -> Result<()> {
        info!(leg = %origin, content_type = ?request.header("Content-Type"), "Received INFO");
        match self.relay_in_dialog(origin, &request).await {
            Ok(response) => {
                let mut reply = SipResponse::new(response.status);
                if let Some(content_type) = response.header("Content-Type") {
                    reply = reply.with_header("Content-Type", content_type);
                }
                reply.body = response.body;
                responder.send(reply);
                Ok(())
            }
            Err(e) => {
                info!(leg = %origin, error = %e, "Error handling INFO request");
                Err(e)
            }
        }
    }

    /// Relay NOTIFY, OPTIONS, MESSAGE or REFER to the sibling leg
    pub async fn forward_request(&self, origin: LegKind, request: SipRequest, responder: Responder) -> Result<()> {
        if !matches!(
            request.method,
            Method::Notify | Method::Options | Method::Message | Method::Refer
        ) {
            debug!(leg = %origin, method = %request.method, "Refusing to relay in-dialog request");
            responder.send(SipResponse::new(501));
            return Err(B2buaError::Passthrough(format!("{} is not relayed", request.method)));
        }
        debug!(leg = %origin, method = %request.method, "Relaying in-dialog request");
        match self.relay_in_dialog(origin, &request).await {
            Ok(response) => {
                let mut reply = SipResponse::new(response.status);
                reply.headers = response.headers.without(DIALOG_HEADERS);
                reply.body = response.body;
                responder.send(reply);
                Ok(())
            }
            Err(e) => {
                info!(leg = %origin, method = %request.method, error = %e, "Error relaying in-dialog request");
                Err(e)
            }
        }
    }

    async fn relay_in_dialog(&self, origin: LegKind, request: &SipRequest) -> Result<SipResponse> {
        let sibling = self
            .sibling(origin)
            .ok_or_else(|| B2buaError::Passthrough("sibling leg is gone".to_string()))?;
        let forwarded = InDialogRequest {
            method: request.method.clone(),
            headers: request.headers.without(DIALOG_HEADERS),
            body: request.body.clone(),
        };
        sibling
            .request(forwarded)
            .await
            .map_err(|e| B2buaError::Passthrough(e.to_string()))
    }

    /// Relay DTMF detected on the inbound leg to the outbound leg as INFO
    ///
    /// Subscribes at most once until [`unsubscribe_for_dtmf`](Self::unsubscribe_for_dtmf).
    pub async fn subscribe_for_dtmf(&self) {
        if self
            .dtmf_subscribed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let target = self.legs.lock().as_ref().map(|legs| legs.uac.clone());
        let tag = self
            .relay_options
            .read()
            .as_ref()
            .and_then(|o| o.tag(LegKind::Uas).map(str::to_string));
        let (relay, target, tag) = match (self.relay.get().cloned(), target, tag) {
            (Some(relay), Some(target), Some(tag)) => (relay, target, tag),
            _ => {
                debug!("Call not bridged, skipping DTMF subscription");
                self.dtmf_subscribed.store(false, Ordering::SeqCst);
                return;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(
            async move {
                while let Some(event) = rx.recv().await {
                    send_dtmf_info(&target, event).await;
                }
            }
            .instrument(self.span.clone()),
        );
        *self.dtmf_task.lock() = Some(task);

        if let Err(e) = relay.subscribe_dtmf(&self.call.call_id, &tag, tx).await {
            warn!(error = %e, "Error subscribing for DTMF");
        }
    }

    /// Cancel the DTMF subscription; no-op when not subscribed
    pub async fn unsubscribe_for_dtmf(&self) {
        if self
            .dtmf_subscribed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if let Some(task) = self.dtmf_task.lock().take() {
            task.abort();
        }
        let tag = self
            .relay_options
            .read()
            .as_ref()
            .and_then(|o| o.tag(LegKind::Uas).map(str::to_string));
        if let (Some(relay), Some(tag)) = (self.relay.get(), tag) {
            if let Err(e) = relay.unsubscribe_dtmf(&self.call.call_id, &tag).await {
                info!(error = %e, "Error unsubscribing from DTMF");
            }
        }
    }

    /// Tear the call down after `kind` ended
    ///
    /// Safe to run once per leg, concurrently.
    pub async fn on_leg_destroyed(&self, kind: LegKind) {
        info!(leg = %kind, "Call leg destroyed, tearing down call");
        self.leg_destroyed[leg_index(kind)].store(true, Ordering::SeqCst);

        if let Some(resource) = self.resource.get() {
            resource.destroy().await;
        }

        let other = kind.other();
        let sibling = self.legs.lock().as_ref().map(|legs| legs.get(other).clone());
        if let Some(sibling) = sibling {
            if !self.leg_destroyed[leg_index(other)].swap(true, Ordering::SeqCst) {
                if let Err(e) = sibling.destroy().await {
                    info!(leg = %other, error = %e, "Error destroying sibling leg");
                }
            }
        }

        self.unsubscribe_for_dtmf().await;
        self.legs.lock().take();
        self.stop_recording().await;
        self.end_inbound().await;
        self.transition(CallState::Terminated);
    }

    async fn stop_recording(&self) {
        let recording = self.recording.lock().take();
        if let Some(recording) = recording {
            recording.stop().await;
        }
    }

    async fn end_inbound(&self) {
        if !self.inbound_ended.swap(true, Ordering::SeqCst) {
            self.services.peer.end_session(&self.call).await;
        }
    }

    fn relay_for(&self, leg: LegKind) -> Result<(Arc<dyn MediaRelay>, String)> {
        let relay = self
            .relay
            .get()
            .cloned()
            .ok_or_else(|| B2buaError::Relay("call has no media relay".to_string()))?;
        let tag = self
            .relay_options
            .read()
            .as_ref()
            .and_then(|o| o.tag(leg).map(str::to_string))
            .ok_or_else(|| B2buaError::Relay(format!("{} leg tag unknown", leg)))?;
        Ok((relay, tag))
    }

    /// Inject DTMF digits toward `leg`
    pub async fn play_dtmf(&self, leg: LegKind, digits: &str, duration_ms: u32) -> Result<()> {
        let (relay, tag) = self.relay_for(leg)?;
        let response = relay
            .play_dtmf(PlayDtmfRequest::new(&self.call.call_id, tag, digits, duration_ms))
            .await?;
        ensure_ok(response, "play DTMF")
    }

    /// Suppress in-band DTMF coming from `leg`
    pub async fn block_dtmf(&self, leg: LegKind) -> Result<()> {
        let (relay, tag) = self.relay_for(leg)?;
        let response = relay.block_dtmf(MediaControlRequest::new(&self.call.call_id, tag)).await?;
        ensure_ok(response, "block DTMF")
    }

    pub async fn unblock_dtmf(&self, leg: LegKind) -> Result<()> {
        let (relay, tag) = self.relay_for(leg)?;
        let response = relay.unblock_dtmf(MediaControlRequest::new(&self.call.call_id, tag)).await?;
        ensure_ok(response, "unblock DTMF")
    }

    fn current_recording(&self) -> Result<Arc<dyn RecordingSession>> {
        self.recording
            .lock()
            .clone()
            .ok_or_else(|| B2buaError::Recording("call is not being recorded".to_string()))
    }

    pub async fn pause_recording(&self) -> Result<()> {
        self.current_recording()?.pause().await
    }

    pub async fn resume_recording(&self) -> Result<()> {
        self.current_recording()?.resume().await
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("call_id", &self.call.call_id)
            .field("state", &self.state())
            .finish()
    }
}

/// SDP from a re-INVITE relay step, or the reason it was refused
fn accepted_sdp(response: RelayResponse, operation: &str) -> Result<String> {
    if !response.is_ok() {
        return Err(B2buaError::ReinviteNegotiation(format!(
            "relay {} failed: {}",
            operation,
            response.failure_reason()
        )));
    }
    response
        .sdp
        .ok_or_else(|| B2buaError::ReinviteNegotiation(format!("relay {} returned no sdp", operation)))
}

fn ensure_ok(response: RelayResponse, operation: &str) -> Result<()> {
    if response.is_ok() {
        Ok(())
    } else {
        Err(B2buaError::Relay(format!("{} failed: {}", operation, response.failure_reason())))
    }
}

async fn send_dtmf_info(leg: &Arc<dyn CallLeg>, event: DtmfEvent) {
    info!(event = event.event, duration = event.duration, "DTMF event from relay");
    let mut headers = SipHeaders::new();
    headers.append("Content-Type", DTMF_RELAY_CONTENT_TYPE);
    let request = InDialogRequest {
        method: Method::Info,
        headers,
        body: Some(dtmf_relay_body(&event)),
    };
    match leg.request(request).await {
        Ok(response) if !response.is_success() => {
            debug!(status = response.status, "DTMF INFO refused")
        }
        Ok(_) => {}
        Err(e) => info!(error = %e, "Error sending INFO application/dtmf-relay"),
    }
}

/// Produces the inbound leg's answer from the outbound leg's 200 OK
struct InboundAnswer {
    session: Weak<CallSession>,
}

#[async_trait]
impl InboundAnswerProvider for InboundAnswer {
    async fn answer_sdp(&self, remote_sdp: String, response: &SipResponse) -> Result<String> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| B2buaError::BridgeCreation("call session dropped".to_string()))?;
        let span = session.span.clone();
        session.negotiate_answer(remote_sdp, response).instrument(span).await
    }
}
