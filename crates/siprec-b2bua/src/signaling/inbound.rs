//! Inbound call metadata
//!
//! Everything the call session needs from the initial INVITE, extracted once
//! when the request arrives.

use rvoip_sip_core::types::address::Address;

use super::headers::{parse_address, parse_uri, uri_user};
use super::message::SipRequest;
use crate::errors::{B2buaError, Result};

/// The inbound INVITE plus values derived from it
#[derive(Debug, Clone)]
pub struct InboundCall {
    pub request: SipRequest,
    pub call_id: String,
    /// Offered session description
    pub sdp: Option<String>,
    pub from: Address,
    pub to: Address,
    /// `From` tag of the inbound dialog
    pub from_tag: String,
    pub calling_number: Option<String>,
    pub called_number: Option<String>,
}

impl InboundCall {
    pub fn from_request(request: SipRequest) -> Result<Self> {
        let call_id = request
            .header("Call-ID")
            .map(str::to_string)
            .ok_or_else(|| B2buaError::Signaling("INVITE without Call-ID".to_string()))?;

        let from = request
            .header("From")
            .and_then(parse_address)
            .ok_or_else(|| B2buaError::Signaling("INVITE without a valid From".to_string()))?;
        let to = request
            .header("To")
            .and_then(parse_address)
            .ok_or_else(|| B2buaError::Signaling("INVITE without a valid To".to_string()))?;
        let from_tag = from
            .tag()
            .map(str::to_string)
            .ok_or_else(|| B2buaError::Signaling("INVITE From has no tag".to_string()))?;

        let calling_number = request
            .header("P-Asserted-Identity")
            .and_then(parse_address)
            .and_then(|pai| uri_user(&pai.uri))
            .or_else(|| uri_user(&from.uri));
        let called_number = parse_uri(&request.uri).and_then(|uri| uri_user(&uri));

        Ok(Self {
            sdp: request.body.clone(),
            request,
            call_id,
            from,
            to,
            from_tag,
            calling_number,
            called_number,
        })
    }

    /// `To` header exactly as received
    pub fn raw_to(&self) -> &str {
        self.request.header("To").unwrap_or_default()
    }

    pub fn source_address(&self) -> &str {
        &self.request.source_address
    }
}
