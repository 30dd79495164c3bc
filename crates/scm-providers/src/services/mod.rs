//! SCM services
//!
//! Higher-level operations built on top of a single provider.

pub mod discovery_service;

pub use discovery_service::{DiscoveryFilter, DiscoveryOptions, DiscoveryService};
