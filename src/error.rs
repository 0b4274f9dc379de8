//! Error and result type for a mailing run

use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::types::MailboxError;

/// Boxed error returned by a [`Dialer`](crate::session::Dialer) implementation
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An enum of all error kinds that abort a run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Missing or empty parameter
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// The configured From or Reply-To value is not a mailbox
    #[error("invalid {header} value {value:?}: {source}")]
    Mailbox {
        header: &'static str,
        value: String,
        source: MailboxError,
    },
    /// Source file could not be opened
    #[error("cannot open source file {}: {source}", .path.display())]
    OpenSource { path: PathBuf, source: io::Error },
    /// First relay session could not be established
    #[error("cannot dial relay: {0}")]
    Dial(#[source] BoxError),
    /// Template file could not be read
    #[error("cannot read template {}: {source}", .path.display())]
    ReadTemplate { path: PathBuf, source: io::Error },
    /// Template file could not be parsed
    #[error("cannot parse template: {0}")]
    Template(#[source] minijinja::Error),
    /// Audit log could not be opened
    #[error("cannot open sent log {}: {source}", .path.display())]
    OpenAuditLog { path: PathBuf, source: io::Error },
    /// Template could not be rendered for a recipient
    #[error("render: {0}")]
    Render(#[source] minijinja::Error),
    /// Periodic reconnect failed
    #[error("cannot re-dial relay: {0}")]
    Redial(#[source] BoxError),
    /// Appending to the audit log failed
    #[error("cannot append to sent log: {0}")]
    AuditLog(#[source] io::Error),
}

/// Mailing run result type
pub type MailerResult<T> = Result<T, Error>;
