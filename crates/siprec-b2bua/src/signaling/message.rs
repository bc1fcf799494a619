//! SIP message values exchanged with the signaling peer
//!
//! Parsing the wire format is the signaling stack's job. These types carry
//! what the call session reads and writes: an ordered, case-insensitive header
//! list, the raw body, and the parts of a multipart body.

pub use rvoip_sip_core::types::Method;
use tokio::sync::oneshot;

/// Ordered header list with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SipHeaders(Vec<(String, String)>);

impl SipHeaders {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// First value of the named header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a header, keeping any existing values
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replace every value of the named header with a single value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this list without the named headers
    pub fn without(&self, excluded: &[&str]) -> SipHeaders {
        SipHeaders(
            self.0
                .iter()
                .filter(|(n, _)| !excluded.iter().any(|e| n.eq_ignore_ascii_case(e)))
                .cloned()
                .collect(),
        )
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for SipHeaders {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        SipHeaders(iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect())
    }
}

/// One part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    pub content_type: String,
    pub content: String,
}

/// A SIP request as delivered by the signaling peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipRequest {
    pub method: Method,
    pub uri: String,
    pub headers: SipHeaders,
    /// Raw body
    pub body: Option<String>,
    /// Decoded parts when the body is multipart, empty otherwise
    pub parts: Vec<BodyPart>,
    /// Address the request was received from
    pub source_address: String,
}

impl SipRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: SipHeaders::new(),
            body: None,
            parts: Vec::new(),
            source_address: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_parts(mut self, parts: Vec<BodyPart>) -> Self {
        self.parts = parts;
        self
    }

    pub fn with_source_address(mut self, addr: impl Into<String>) -> Self {
        self.source_address = addr.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Session description offered in this request
    ///
    /// A multipart body must contain an `application/sdp` part; a single body
    /// is taken as the description itself.
    pub fn offered_sdp(&self) -> Option<&str> {
        if !self.parts.is_empty() {
            self.parts
                .iter()
                .find(|p| is_sdp_content_type(&p.content_type))
                .map(|p| p.content.as_str())
        } else {
            self.body.as_deref()
        }
    }
}

fn is_sdp_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|t| t.trim().eq_ignore_ascii_case("application/sdp"))
        .unwrap_or(false)
}

/// A SIP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipResponse {
    pub status: u16,
    pub headers: SipHeaders,
    pub body: Option<String>,
}

impl SipResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: SipHeaders::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request sent by the B2BUA inside an established dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InDialogRequest {
    pub method: Method,
    pub headers: SipHeaders,
    pub body: Option<String>,
}

/// Sends the final response to a request received on a call leg
///
/// Dropping the responder without sending leaves the request unanswered by
/// the B2BUA; the signaling stack decides what happens then.
#[derive(Debug)]
pub struct Responder(oneshot::Sender<SipResponse>);

impl Responder {
    /// Create a responder and the receiver the signaling stack waits on
    pub fn channel() -> (Self, oneshot::Receiver<SipResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn send(self, response: SipResponse) {
        if self.0.send(response).is_err() {
            tracing::debug!("In-dialog request was abandoned before the response was sent");
        }
    }
}
