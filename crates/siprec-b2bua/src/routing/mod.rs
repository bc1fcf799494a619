//! Outbound trunk model and selection

pub mod trunk;

pub use trunk::{RandomTrunkSelector, Trunk, TrunkAuth, TrunkSelector};
