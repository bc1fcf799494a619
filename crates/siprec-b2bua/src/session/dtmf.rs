//! DTMF relay as SIP INFO

use crate::media::DtmfEvent;

pub const DTMF_RELAY_CONTENT_TYPE: &str = "application/dtmf-relay";

/// Signal character for an RFC 4733 event code
pub fn dtmf_signal(code: u8) -> String {
    match code {
        10 => "*".to_string(),
        11 => "#".to_string(),
        n => n.to_string(),
    }
}

/// `application/dtmf-relay` body for a detected event
pub fn dtmf_relay_body(event: &DtmfEvent) -> String {
    format!("Signal={}\r\nDuration={}\r\n", dtmf_signal(event.event), event.duration)
}
