//! Media relay integration: profiles, SDP inspection, relay commands, the
//! per-call relay resource and the shared relay pool.

pub mod pool;
pub mod profile;
pub mod relay;
pub mod request;
pub mod sdp;

pub use pool::RelayPool;
pub use profile::MediaProfile;
pub use relay::{DtmfEvent, MediaRelay, RelayResource};
pub use request::{
    direction_for, AnswerRequest, CommonRelayParams, DeleteRequest, LegMediaOptions,
    MediaControlRequest, OfferRequest, PlayDtmfRequest, RelayDirection, RelayOptions,
    RelayResponse, SubscribeAnswerRequest, SubscribeRequest, UnsubscribeRequest,
};
pub use sdp::{parse_connection_ip, sdp_wants_srtp};
