//! Media profile store
//!
//! Two fixed option bundles handed to the relay: one for plain RTP legs and
//! one for SRTP legs. A leg's profile is chosen once, from its SDP, when the
//! call is set up.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Codec/transport characteristics requested from the relay for one leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProfile {
    #[serde(rename = "transport-protocol")]
    pub transport_protocol: String,
    #[serde(rename = "DTLS")]
    pub dtls: String,
    #[serde(rename = "SDES", default, skip_serializing_if = "Vec::is_empty")]
    pub sdes: Vec<String>,
    #[serde(rename = "ICE")]
    pub ice: String,
    #[serde(rename = "rtcp-mux")]
    pub rtcp_mux: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

static PLAIN_RTP: Lazy<MediaProfile> = Lazy::new(|| MediaProfile {
    transport_protocol: "RTP/AVP".to_string(),
    dtls: "off".to_string(),
    sdes: vec!["off".to_string()],
    ice: "remove".to_string(),
    rtcp_mux: vec!["demux".to_string()],
    flags: vec!["media handover".to_string()],
});

static SECURE_RTP: Lazy<MediaProfile> = Lazy::new(|| MediaProfile {
    transport_protocol: "RTP/SAVP".to_string(),
    dtls: "off".to_string(),
    sdes: vec![
        "no-AES_256_CM_HMAC_SHA1_80".to_string(),
        "no-AES_256_CM_HMAC_SHA1_32".to_string(),
        "no-AES_192_CM_HMAC_SHA1_80".to_string(),
        "no-AES_192_CM_HMAC_SHA1_32".to_string(),
    ],
    ice: "remove".to_string(),
    rtcp_mux: vec!["demux".to_string()],
    flags: vec!["media handover".to_string(), "generate RTCP".to_string()],
});

impl MediaProfile {
    /// Profile for a leg that does not use SRTP
    pub fn plain() -> &'static MediaProfile {
        &PLAIN_RTP
    }

    /// Profile for a leg that uses SRTP
    pub fn secure() -> &'static MediaProfile {
        &SECURE_RTP
    }

    pub fn for_transport(secure: bool) -> &'static MediaProfile {
        if secure {
            Self::secure()
        } else {
            Self::plain()
        }
    }

    pub fn is_secure(&self) -> bool {
        self.transport_protocol.contains("SAVP")
    }
}
