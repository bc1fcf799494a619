//! Shared registry of media relay instances
//!
//! The set of usable relays changes at runtime as instances come and go.
//! Updates swap the whole list atomically; acquisition is lock-free.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use super::relay::MediaRelay;
use crate::config::MediaRelayConfig;

/// Bounded, atomically replaceable list of relays
pub struct RelayPool {
    relays: ArcSwap<Vec<Arc<dyn MediaRelay>>>,
    next: AtomicUsize,
    max_relays: usize,
}

impl RelayPool {
    pub fn new(max_relays: usize) -> Self {
        Self {
            relays: ArcSwap::from_pointee(Vec::new()),
            next: AtomicUsize::new(0),
            max_relays,
        }
    }

    /// Pool holding one relay per configured endpoint
    ///
    /// `connect` builds the relay client for a `host:port` with the configured
    /// command timeout.
    pub fn from_config<F>(config: &MediaRelayConfig, mut connect: F) -> Self
    where
        F: FnMut(&str, Duration) -> Arc<dyn MediaRelay>,
    {
        let pool = Self::new(config.max_relays);
        let timeout = config.timeout();
        pool.set_relays(
            config
                .hostport
                .iter()
                .map(|hostport| connect(hostport, timeout))
                .collect(),
        );
        pool
    }

    /// Replace the available relays; entries past the bound are dropped
    pub fn set_relays(&self, mut relays: Vec<Arc<dyn MediaRelay>>) {
        if relays.len() > self.max_relays {
            warn!(
                offered = relays.len(),
                max = self.max_relays,
                "Too many media relays configured, extra entries ignored"
            );
            relays.truncate(self.max_relays);
        }
        let endpoints: Vec<&str> = relays.iter().map(|r| r.endpoint()).collect();
        info!(?endpoints, "Media relay set updated");
        self.relays.store(Arc::new(relays));
    }

    /// Next relay in round-robin order, `None` when no relay is available
    pub fn acquire(&self) -> Option<Arc<dyn MediaRelay>> {
        let relays = self.relays.load();
        if relays.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % relays.len();
        Some(relays[idx].clone())
    }

    pub fn len(&self) -> usize {
        self.relays.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_relays(&self) -> usize {
        self.max_relays
    }
}
