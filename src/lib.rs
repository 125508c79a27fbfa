//! Library crate for lan-discover-rs: local subnet arithmetic, batched TCP
//! probing, the UDP discovery handshake and a time-boxed result cache.
pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod netdetect;
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod types;
