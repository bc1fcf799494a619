//! Static configuration
//!
//! Loaded once at startup from TOML. Everything here is read-only for the
//! lifetime of the process except the media relay endpoint list, which is
//! pushed into the [`RelayPool`](crate::media::RelayPool) and may be replaced
//! there at runtime.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{B2buaError, Result};
use crate::routing::Trunk;

/// Media relay endpoints and client limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRelayConfig {
    /// `host:port` of each relay control socket
    #[serde(default)]
    pub hostport: Vec<String>,
    /// Upper bound on relays held by the pool
    #[serde(default = "default_max_relays")]
    pub max_relays: usize,
    /// Per-command timeout for the relay client
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_relays() -> usize {
    16
}

fn default_relay_timeout_ms() -> u64 {
    1500
}

impl MediaRelayConfig {
    /// Per-command timeout handed to each relay client
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for MediaRelayConfig {
    fn default() -> Self {
        Self {
            hostport: Vec::new(),
            max_relays: default_max_relays(),
            timeout_ms: default_relay_timeout_ms(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level B2BUA configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct B2buaConfig {
    /// Recording service address
    pub srs_url: String,
    /// Outbound trunks, one is picked at random per call
    #[serde(default)]
    pub trunks: Vec<Trunk>,
    /// Contact address advertised on the outbound leg
    #[serde(default)]
    pub private_sip_address: Option<String>,
    #[serde(default)]
    pub media_relay: MediaRelayConfig,
    #[serde(default)]
    pub logging: LogSettings,
}

impl B2buaConfig {
    pub fn new(srs_url: impl Into<String>) -> Self {
        Self {
            srs_url: srs_url.into(),
            trunks: Vec::new(),
            private_sip_address: None,
            media_relay: MediaRelayConfig::default(),
            logging: LogSettings::default(),
        }
    }

    pub fn with_trunk(mut self, trunk: Trunk) -> Self {
        self.trunks.push(trunk);
        self
    }

    pub fn with_private_sip_address(mut self, addr: impl Into<String>) -> Self {
        self.private_sip_address = Some(addr.into());
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: B2buaConfig =
            toml::from_str(contents).map_err(|e| B2buaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| B2buaError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.srs_url.trim().is_empty() {
            return Err(B2buaError::Config("srs_url must not be empty".to_string()));
        }
        if let Some(trunk) = self.trunks.iter().find(|t| t.host.trim().is_empty()) {
            return Err(B2buaError::Config(format!("trunk with empty host: {:?}", trunk)));
        }
        for hostport in &self.media_relay.hostport {
            let valid = hostport
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(B2buaError::Config(format!(
                    "invalid media relay address '{}', expected host:port",
                    hostport
                )));
            }
        }
        if self.media_relay.max_relays == 0 {
            return Err(B2buaError::Config("media_relay.max_relays must be at least 1".to_string()));
        }
        Ok(())
    }
}
