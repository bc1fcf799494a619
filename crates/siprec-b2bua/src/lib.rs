//! # SIPREC B2BUA call session core
//!
//! Bridges inbound calls toward outbound SIP trunks through a media relay and
//! forks the media of every bridged call to a session recording server.
//!
//! The crate owns the control decisions only. The dialog stack, the media
//! relay client and the recording transport are reached through traits:
//!
//! - [`SignalingPeer`](signaling::SignalingPeer) / [`CallLeg`](signaling::CallLeg)
//! - [`MediaRelay`](media::MediaRelay)
//! - [`RecordingTransport`](recording::RecordingTransport)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_siprec_b2bua::prelude::*;
//! # async fn example(
//! #     peer: Arc<dyn SignalingPeer>,
//! #     connect_relay: impl FnMut(&str, std::time::Duration) -> Arc<dyn MediaRelay>,
//! #     transport: Arc<dyn RecordingTransport>,
//! #     invite: SipRequest,
//! # ) -> Result<()> {
//! let config = Arc::new(B2buaConfig::from_file("b2bua.toml")?);
//! setup_logging(LoggingConfig::from_settings(&config.logging)?)?;
//!
//! let relay_pool = Arc::new(RelayPool::from_config(&config.media_relay, connect_relay));
//!
//! let router = CallRouter::new(SessionServices {
//!     config,
//!     relay_pool,
//!     peer,
//!     recorder: Arc::new(SiprecRecorderFactory::new(transport)),
//!     trunk_selector: Arc::new(RandomTrunkSelector),
//! });
//! let session = router.handle_invite(invite).await?;
//! println!("call {} is {}", session.call_id(), session.state());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod logging;
pub mod media;
pub mod recording;
pub mod router;
pub mod routing;
pub mod session;
pub mod signaling;

pub use config::B2buaConfig;
pub use errors::{B2buaError, Result};
pub use router::CallRouter;
pub use session::{CallSession, CallState, SessionServices};

pub mod prelude {
    pub use crate::config::{B2buaConfig, LogSettings, MediaRelayConfig};
    pub use crate::errors::{B2buaError, Result};
    pub use crate::logging::{setup_logging, LoggingConfig};
    pub use crate::media::{DtmfEvent, MediaRelay, RelayPool, RelayResponse};
    pub use crate::recording::{
        RecordingSession, RecordingSessionFactory, RecordingTransport, SiprecRecorderFactory,
    };
    pub use crate::router::CallRouter;
    pub use crate::routing::{RandomTrunkSelector, Trunk, TrunkSelector};
    pub use crate::session::{CallSession, CallState, SessionServices};
    pub use crate::signaling::{
        CallLeg, InboundCall, LegEvent, LegKind, SignalingPeer, SipRequest, SipResponse,
    };
}
