//! Error and result type for the relay dialer

use std::io;

/// An enum of all error kinds.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error reported by the SMTP client
    #[error("smtp: {0}")]
    Smtp(#[from] async_smtp::error::Error),
    /// IO error
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// TLS error
    #[error("tls: {0}")]
    Tls(#[from] async_native_tls::Error),
    /// The relay did not answer in time
    #[error("timeout: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
    /// Envelope address refused before anything was sent
    #[error("envelope: {0}")]
    Envelope(String),
}

/// Relay result type
pub type RelayResult<T> = Result<T, Error>;
