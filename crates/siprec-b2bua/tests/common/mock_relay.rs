// In-memory media relay
//
// Records every command it receives. Offer and answer results can be
// scripted per call; anything not scripted succeeds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rvoip_siprec_b2bua::errors::Result;
use rvoip_siprec_b2bua::media::{
    AnswerRequest, DeleteRequest, DtmfEvent, MediaControlRequest, MediaRelay, OfferRequest,
    PlayDtmfRequest, RelayResponse, SubscribeAnswerRequest, SubscribeRequest, UnsubscribeRequest,
};

pub const FORK_TAG: &str = "srs-fork-1";

pub struct MockRelay {
    endpoint: String,
    pub offers: Mutex<Vec<OfferRequest>>,
    pub answers: Mutex<Vec<AnswerRequest>>,
    pub deletes: Mutex<Vec<DeleteRequest>>,
    /// (operation, request) for block/unblock commands
    pub media_controls: Mutex<Vec<(&'static str, MediaControlRequest)>>,
    pub played: Mutex<Vec<PlayDtmfRequest>>,
    pub dtmf_subscribes: Mutex<Vec<(String, String)>>,
    pub dtmf_unsubscribes: Mutex<Vec<(String, String)>>,
    pub subscribe_requests: Mutex<Vec<SubscribeRequest>>,
    pub subscribe_answers: Mutex<Vec<SubscribeAnswerRequest>>,
    pub unsubscribes: Mutex<Vec<UnsubscribeRequest>>,
    dtmf_sink: Mutex<Option<mpsc::UnboundedSender<DtmfEvent>>>,
    offer_script: Mutex<VecDeque<RelayResponse>>,
    answer_script: Mutex<VecDeque<RelayResponse>>,
    sdp_counter: AtomicUsize,
}

impl MockRelay {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            offers: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            media_controls: Mutex::new(Vec::new()),
            played: Mutex::new(Vec::new()),
            dtmf_subscribes: Mutex::new(Vec::new()),
            dtmf_unsubscribes: Mutex::new(Vec::new()),
            subscribe_requests: Mutex::new(Vec::new()),
            subscribe_answers: Mutex::new(Vec::new()),
            unsubscribes: Mutex::new(Vec::new()),
            dtmf_sink: Mutex::new(None),
            offer_script: Mutex::new(VecDeque::new()),
            answer_script: Mutex::new(VecDeque::new()),
            sdp_counter: AtomicUsize::new(0),
        }
    }

    /// Result for the next unscripted offer
    pub fn script_offer(&self, response: RelayResponse) {
        self.offer_script.lock().push_back(response);
    }

    pub fn script_answer(&self, response: RelayResponse) {
        self.answer_script.lock().push_back(response);
    }

    pub fn offer_count(&self) -> usize {
        self.offers.lock().len()
    }

    pub fn answer_count(&self) -> usize {
        self.answers.lock().len()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.lock().len()
    }

    /// Report a DTMF event as if detected on the subscribed leg
    pub fn emit_dtmf(&self, event: DtmfEvent) -> bool {
        match self.dtmf_sink.lock().as_ref() {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    fn next_sdp(&self, kind: &str) -> String {
        let n = self.sdp_counter.fetch_add(1, Ordering::SeqCst);
        format!(
            "v=0\r\no=- {n} 1 IN IP4 10.0.0.10\r\ns=relay-{kind}\r\nc=IN IP4 10.0.0.10\r\nt=0 0\r\nm=audio {} RTP/AVP 0 101\r\n",
            30000 + n * 2
        )
    }
}

#[async_trait]
impl MediaRelay for MockRelay {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn offer(&self, request: OfferRequest) -> Result<RelayResponse> {
        self.offers.lock().push(request);
        let scripted = self.offer_script.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| RelayResponse::ok(Some(self.next_sdp("offer")))))
    }

    async fn answer(&self, request: AnswerRequest) -> Result<RelayResponse> {
        self.answers.lock().push(request);
        let scripted = self.answer_script.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| RelayResponse::ok(Some(self.next_sdp("answer")))))
    }

    async fn delete(&self, request: DeleteRequest) -> Result<()> {
        self.deletes.lock().push(request);
        Ok(())
    }

    async fn block_media(&self, request: MediaControlRequest) -> Result<RelayResponse> {
        self.media_controls.lock().push(("block media", request));
        Ok(RelayResponse::ok(None))
    }

    async fn unblock_media(&self, request: MediaControlRequest) -> Result<RelayResponse> {
        self.media_controls.lock().push(("unblock media", request));
        Ok(RelayResponse::ok(None))
    }

    async fn block_dtmf(&self, request: MediaControlRequest) -> Result<RelayResponse> {
        self.media_controls.lock().push(("block DTMF", request));
        Ok(RelayResponse::ok(None))
    }

    async fn unblock_dtmf(&self, request: MediaControlRequest) -> Result<RelayResponse> {
        self.media_controls.lock().push(("unblock DTMF", request));
        Ok(RelayResponse::ok(None))
    }

    async fn play_dtmf(&self, request: PlayDtmfRequest) -> Result<RelayResponse> {
        self.played.lock().push(request);
        Ok(RelayResponse::ok(None))
    }

    async fn subscribe_dtmf(
        &self,
        call_id: &str,
        tag: &str,
        events: mpsc::UnboundedSender<DtmfEvent>,
    ) -> Result<()> {
        self.dtmf_subscribes.lock().push((call_id.to_string(), tag.to_string()));
        *self.dtmf_sink.lock() = Some(events);
        Ok(())
    }

    async fn unsubscribe_dtmf(&self, call_id: &str, tag: &str) -> Result<()> {
        self.dtmf_unsubscribes.lock().push((call_id.to_string(), tag.to_string()));
        self.dtmf_sink.lock().take();
        Ok(())
    }

    async fn subscribe_request(&self, request: SubscribeRequest) -> Result<RelayResponse> {
        self.subscribe_requests.lock().push(request);
        let mut response = RelayResponse::ok(Some(self.next_sdp("fork")));
        response.to_tag = Some(FORK_TAG.to_string());
        Ok(response)
    }

    async fn subscribe_answer(&self, request: SubscribeAnswerRequest) -> Result<RelayResponse> {
        self.subscribe_answers.lock().push(request);
        Ok(RelayResponse::ok(None))
    }

    async fn unsubscribe(&self, request: UnsubscribeRequest) -> Result<RelayResponse> {
        self.unsubscribes.lock().push(request);
        Ok(RelayResponse::ok(None))
    }
}
