use thiserror::Error;

/// Failures surfaced by the scan engine. Per-probe failures never appear here;
/// they collapse into closed or absent results.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot determine local network: no non-loopback IPv4 interface")]
    NoLocalNetwork,

    #[error("invalid scan target: {0}")]
    InvalidTarget(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
