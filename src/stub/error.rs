//! Error and result type for the stub dialer

/// An enum of all error kinds.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The recipient was configured to be rejected
    #[error("recipient rejected: {0}")]
    Rejected(String),
    /// The dialer was configured to refuse further connections
    #[error("connection refused")]
    Refused,
}

/// Stub result type
pub type StubResult = Result<(), Error>;
