//! Per-operation relay requests
//!
//! Every relay command is its own immutable struct, built from the call-wide
//! parameters, the tag pair and (where the relay rewrites SDP) the leg's media
//! profile. Field names serialize to the relay's control-protocol keys.

use serde::{Deserialize, Serialize, Serializer};

use super::profile::MediaProfile;
use crate::signaling::LegKind;

/// Address family hint for the two sides of a relayed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayDirection {
    Public,
    Private,
}

/// Direction pair for an offer that originates on the given leg
pub fn direction_for(origin: LegKind) -> [RelayDirection; 2] {
    match origin {
        LegKind::Uas => [RelayDirection::Public, RelayDirection::Private],
        LegKind::Uac => [RelayDirection::Private, RelayDirection::Public],
    }
}

fn yes_no<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "yes" } else { "no" })
}

/// Parameters shared by every relay command of one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonRelayParams {
    #[serde(rename = "call-id")]
    pub call_id: String,
    pub replace: Vec<String>,
    #[serde(rename = "record call", serialize_with = "yes_no")]
    pub record_call: bool,
}

impl CommonRelayParams {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            replace: vec!["origin".to_string(), "session-connection".to_string()],
            record_call: false,
        }
    }
}

/// Relay parameters for one leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegMediaOptions {
    /// Dialog tag of the leg; unknown for the outbound leg until it answers
    pub tag: Option<String>,
    pub profile: MediaProfile,
}

/// Relay parameters for the whole call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    pub common: CommonRelayParams,
    pub uas: LegMediaOptions,
    pub uac: LegMediaOptions,
}

impl RelayOptions {
    /// Options for a new call; the outbound tag is filled in on answer
    pub fn new(call_id: impl Into<String>, uas_tag: impl Into<String>, uas_secure: bool, uac_secure: bool) -> Self {
        Self {
            common: CommonRelayParams::new(call_id),
            uas: LegMediaOptions {
                tag: Some(uas_tag.into()),
                profile: MediaProfile::for_transport(uas_secure).clone(),
            },
            uac: LegMediaOptions {
                tag: None,
                profile: MediaProfile::for_transport(uac_secure).clone(),
            },
        }
    }

    pub fn leg(&self, kind: LegKind) -> &LegMediaOptions {
        match kind {
            LegKind::Uas => &self.uas,
            LegKind::Uac => &self.uac,
        }
    }

    pub fn tag(&self, kind: LegKind) -> Option<&str> {
        self.leg(kind).tag.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferRequest {
    #[serde(flatten)]
    pub common: CommonRelayParams,
    #[serde(flatten)]
    pub profile: MediaProfile,
    #[serde(rename = "from-tag")]
    pub from_tag: String,
    #[serde(rename = "to-tag", skip_serializing_if = "Option::is_none")]
    pub to_tag: Option<String>,
    pub direction: [RelayDirection; 2],
    pub sdp: String,
}

impl OfferRequest {
    pub fn new(
        common: &CommonRelayParams,
        profile: &MediaProfile,
        from_tag: impl Into<String>,
        to_tag: Option<String>,
        direction: [RelayDirection; 2],
        sdp: impl Into<String>,
    ) -> Self {
        Self {
            common: common.clone(),
            profile: profile.clone(),
            from_tag: from_tag.into(),
            to_tag,
            direction,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRequest {
    #[serde(flatten)]
    pub common: CommonRelayParams,
    #[serde(flatten)]
    pub profile: MediaProfile,
    #[serde(rename = "from-tag")]
    pub from_tag: String,
    #[serde(rename = "to-tag")]
    pub to_tag: String,
    pub sdp: String,
}

impl AnswerRequest {
    pub fn new(
        common: &CommonRelayParams,
        profile: &MediaProfile,
        from_tag: impl Into<String>,
        to_tag: impl Into<String>,
        sdp: impl Into<String>,
    ) -> Self {
        Self {
            common: common.clone(),
            profile: profile.clone(),
            from_tag: from_tag.into(),
            to_tag: to_tag.into(),
            sdp: sdp.into(),
        }
    }
}

/// Release every stream of the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteRequest {
    #[serde(flatten)]
    pub common: CommonRelayParams,
}

impl DeleteRequest {
    pub fn new(common: &CommonRelayParams) -> Self {
        Self { common: common.clone() }
    }
}

/// Block or unblock media or DTMF coming from one tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaControlRequest {
    #[serde(rename = "call-id")]
    pub call_id: String,
    #[serde(rename = "from-tag")]
    pub from_tag: String,
}

impl MediaControlRequest {
    pub fn new(call_id: impl Into<String>, from_tag: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            from_tag: from_tag.into(),
        }
    }
}

/// Inject DTMF toward the leg identified by `from_tag`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayDtmfRequest {
    #[serde(rename = "call-id")]
    pub call_id: String,
    #[serde(rename = "from-tag")]
    pub from_tag: String,
    pub code: String,
    pub duration: u32,
}

impl PlayDtmfRequest {
    pub fn new(call_id: impl Into<String>, from_tag: impl Into<String>, code: impl Into<String>, duration_ms: u32) -> Self {
        Self {
            call_id: call_id.into(),
            from_tag: from_tag.into(),
            code: code.into(),
            duration: duration_ms,
        }
    }
}

/// Ask the relay for an offer forking the given tags to a recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "call-id")]
    pub call_id: String,
    #[serde(rename = "from-tags")]
    pub from_tags: Vec<String>,
    pub flags: Vec<String>,
    #[serde(flatten)]
    pub profile: MediaProfile,
}

impl SubscribeRequest {
    pub fn new(call_id: impl Into<String>, from_tags: Vec<String>, profile: &MediaProfile) -> Self {
        Self {
            call_id: call_id.into(),
            from_tags,
            flags: vec!["all".to_string(), "SIPREC".to_string()],
            profile: profile.clone(),
        }
    }
}

/// Complete a fork with the recorder's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeAnswerRequest {
    #[serde(rename = "call-id")]
    pub call_id: String,
    #[serde(rename = "to-tag")]
    pub to_tag: String,
    pub sdp: String,
}

impl SubscribeAnswerRequest {
    pub fn new(call_id: impl Into<String>, to_tag: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            to_tag: to_tag.into(),
            sdp: sdp.into(),
        }
    }
}

/// Tear down a fork
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsubscribeRequest {
    #[serde(rename = "call-id")]
    pub call_id: String,
    #[serde(rename = "to-tag")]
    pub to_tag: String,
}

impl UnsubscribeRequest {
    pub fn new(call_id: impl Into<String>, to_tag: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            to_tag: to_tag.into(),
        }
    }
}

/// Relay reply to a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(rename = "to-tag", default, skip_serializing_if = "Option::is_none")]
    pub to_tag: Option<String>,
    #[serde(rename = "error-reason", default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl RelayResponse {
    pub fn ok(sdp: Option<String>) -> Self {
        Self {
            result: "ok".to_string(),
            sdp,
            to_tag: None,
            error_reason: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            result: "error".to_string(),
            sdp: None,
            to_tag: None,
            error_reason: Some(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == "ok"
    }

    /// Human-readable reason for a non-ok result
    pub fn failure_reason(&self) -> String {
        self.error_reason
            .clone()
            .unwrap_or_else(|| format!("result={}", self.result))
    }
}
