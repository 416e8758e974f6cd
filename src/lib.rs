//! Caching proxy in front of a quota-limited video search API.

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod metrics;
pub mod proxy;
pub mod reconstruct;
pub mod request;
pub mod server;
pub mod singleflight;
pub mod stats;
pub mod upstream;
