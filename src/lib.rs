//! cn-mailer sends a templated HTML message to every recipient of a CSV
//! file through an authenticated SMTP relay.
//!
//! Each message carries a per-recipient unsubscribe link, see
//! [`unsubscribe`]. Recipients the relay accepts are appended to a sent log
//! ([`audit`]) so a later run can be reconciled against earlier ones. The
//! relay session is replaced every `max_mail_per_conn` records
//! ([`session::SessionPolicy`]).
//!
//! ```no_run
//! # async fn send(config: cn_mailer::Config) -> Result<(), cn_mailer::Error> {
//! use cn_mailer::{Mailer, RelayDialer};
//!
//! let outcome = Mailer::new(&config)?.run(RelayDialer::new(&config)).await?;
//! println!("{} sent", outcome.sent);
//! # Ok(())
//! # }
//! ```

#![deny(
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    missing_debug_implementations,
    clippy::unwrap_used
)]

pub mod audit;
pub mod config;
pub mod error;
pub mod mailer;
pub mod message;
pub mod relay;
pub mod session;
pub mod stub;
pub mod template;
mod types;
pub mod unsubscribe;

pub use types::*;

pub use crate::config::{Args, Config, ConfigError};
pub use crate::error::{Error, MailerResult};
pub use crate::mailer::{BatchOutcome, Mailer};
pub use crate::relay::RelayDialer;
pub use crate::session::{Dialer, Session, SessionPolicy};
pub use crate::stub::StubDialer;
