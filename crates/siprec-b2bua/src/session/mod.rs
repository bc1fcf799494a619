//! Call session orchestration
//!
//! One [`CallSession`] per inbound INVITE. It owns the relay resource, the
//! bridged leg pair and the recording session, and drives them through the
//! [`CallState`] machine.

pub mod call_session;
pub mod dtmf;
pub mod state;

pub use call_session::{CallSession, SessionServices};
pub use dtmf::{dtmf_relay_body, dtmf_signal, DTMF_RELAY_CONTENT_TYPE};
pub use state::CallState;
