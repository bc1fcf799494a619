//! Signaling peer boundary: SIP message values, address helpers and the
//! traits the call session drives the dialog stack through.

pub mod headers;
pub mod inbound;
pub mod message;
pub mod peer;

pub use headers::{address_of_record, outbound_from_header, parse_address, parse_uri, uri_user};
pub use inbound::InboundCall;
pub use message::{BodyPart, InDialogRequest, Method, Responder, SipHeaders, SipRequest, SipResponse};
pub use peer::{
    BridgeOptions, CallLeg, InboundAnswerProvider, LegEvent, LegKind, LegPair, ProxyHeaders,
    SignalingPeer,
};
