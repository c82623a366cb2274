//! Error types for disco-dns.

use thiserror::Error;

/// Errors that can occur in the discovery daemon.
///
/// Lookup misses are not errors anywhere in this crate; they surface as empty
/// results or NXDOMAIN. Only malformed configuration and broken collaborators
/// reach this type.
#[derive(Debug, Error)]
pub enum DiscoError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Docker API client error
    #[error("Docker client error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Failed to parse an address or CIDR
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
