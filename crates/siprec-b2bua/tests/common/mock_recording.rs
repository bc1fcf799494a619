// Recording session stand-ins

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use rvoip_siprec_b2bua::errors::{B2buaError, Result};
use rvoip_siprec_b2bua::media::MediaRelay;
use rvoip_siprec_b2bua::recording::{
    RecordingDialog, RecordingMetadata, RecordingParams, RecordingSession, RecordingSessionFactory,
    RecordingTransport,
};

/// Counts lifecycle calls; only the first stop has an effect
pub struct MockRecording {
    pub params: RecordingParams,
    starts: AtomicUsize,
    stop_calls: AtomicUsize,
    effective_stops: AtomicUsize,
    stopped: Mutex<bool>,
}

impl MockRecording {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn effective_stops(&self) -> usize {
        self.effective_stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordingSession for MockRecording {
    async fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let mut stopped = self.stopped.lock();
        if !*stopped {
            *stopped = true;
            self.effective_stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn pause(&self) -> Result<()> {
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockRecorderFactory {
    pub created: Mutex<Vec<Arc<MockRecording>>>,
}

impl MockRecorderFactory {
    pub fn count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn last(&self) -> Option<Arc<MockRecording>> {
        self.created.lock().last().cloned()
    }
}

impl RecordingSessionFactory for MockRecorderFactory {
    fn create(&self, params: RecordingParams, _relay: Arc<dyn MediaRelay>) -> Arc<dyn RecordingSession> {
        let recording = Arc::new(MockRecording {
            params,
            starts: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            effective_stops: AtomicUsize::new(0),
            stopped: Mutex::new(false),
        });
        self.created.lock().push(recording.clone());
        recording
    }
}

/// SRS signaling stand-in
#[derive(Default)]
pub struct MockSrs {
    pub invites: Mutex<Vec<(String, String, RecordingMetadata)>>,
    pub byes: Mutex<Vec<RecordingDialog>>,
    pub refuse: Mutex<bool>,
}

impl MockSrs {
    pub fn refusing() -> Self {
        Self {
            refuse: Mutex::new(true),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RecordingTransport for MockSrs {
    async fn invite(
        &self,
        srs_url: &str,
        offer_sdp: String,
        metadata: &RecordingMetadata,
    ) -> Result<RecordingDialog> {
        self.invites
            .lock()
            .push((srs_url.to_string(), offer_sdp, metadata.clone()));
        if *self.refuse.lock() {
            return Err(B2buaError::Recording("SRS answered 503".to_string()));
        }
        Ok(RecordingDialog {
            call_id: format!("srs-{}", metadata.call_id),
            answer_sdp: "v=0\r\ns=srs\r\nm=audio 40000 RTP/AVP 0\r\nm=audio 40002 RTP/AVP 0\r\n"
                .to_string(),
        })
    }

    async fn bye(&self, dialog: &RecordingDialog) -> Result<()> {
        self.byes.lock().push(dialog.clone());
        Ok(())
    }
}
