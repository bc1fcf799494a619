//! Trunk selection
//!
//! A call is bridged to exactly one trunk drawn from static configuration.
//! Selection never mutates the shared list.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{B2buaError, Result};

/// Digest credentials for a trunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrunkAuth {
    pub username: String,
    pub password: String,
}

/// An outbound destination for bridged calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trunk {
    /// Host or host:port of the trunk
    pub host: String,
    #[serde(default)]
    pub auth: Option<TrunkAuth>,
}

impl Trunk {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(TrunkAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Request URI for the outbound INVITE
    pub fn request_uri(&self, called_number: &str) -> String {
        format!("sip:{}@{}", called_number, self.host)
    }
}

/// Picks the trunk for one call
pub trait TrunkSelector: Send + Sync {
    fn select<'a>(&self, trunks: &'a [Trunk]) -> Result<&'a Trunk>;
}

/// Uniformly random selection
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTrunkSelector;

impl TrunkSelector for RandomTrunkSelector {
    fn select<'a>(&self, trunks: &'a [Trunk]) -> Result<&'a Trunk> {
        if trunks.is_empty() {
            return Err(B2buaError::NoAvailableTrunk);
        }
        let idx = rand::thread_rng().gen_range(0..trunks.len());
        Ok(&trunks[idx])
    }
}
