//! Outbound sessions and the reconnect policy.
//!
//! A [`Dialer`] opens [`Session`]s to the relay. [`SessionPolicy`] owns the
//! current session and replaces it with a fresh one every
//! `max_mail_per_conn` records.

use std::fmt;

use async_trait::async_trait;
use log::{debug, warn};

use crate::message::OutgoingMessage;

/// An open connection able to deliver messages
#[async_trait]
pub trait Session: Send {
    /// Error type for the session
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one message
    async fn send(&mut self, message: &OutgoingMessage) -> Result<(), Self::Error>;

    /// Ends the session
    async fn quit(&mut self) -> Result<(), Self::Error>;
}

/// Opens sessions to the relay
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Session type produced by the dialer
    type Session: Session;
    /// Error type for dialing
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establishes a new session
    async fn dial(&self) -> Result<Self::Session, Self::Error>;
}

/// Returns true if the session must be re-established before the record at
/// `record_index` (1-based) is processed.
///
/// A `max_mail_per_conn` of 0 disables periodic reconnects.
pub fn needs_redial(record_index: u64, max_mail_per_conn: u64) -> bool {
    max_mail_per_conn != 0 && record_index % max_mail_per_conn == 0
}

/// Owns the current session and decides when to replace it
pub struct SessionPolicy<D: Dialer> {
    dialer: D,
    session: D::Session,
    max_mail_per_conn: u64,
}

impl<D: Dialer + fmt::Debug> fmt::Debug for SessionPolicy<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionPolicy")
            .field("dialer", &self.dialer)
            .field("max_mail_per_conn", &self.max_mail_per_conn)
            .finish_non_exhaustive()
    }
}

impl<D: Dialer> SessionPolicy<D> {
    /// Dials the first session
    pub async fn establish(dialer: D, max_mail_per_conn: u64) -> Result<Self, D::Error> {
        let session = dialer.dial().await?;
        Ok(SessionPolicy {
            dialer,
            session,
            max_mail_per_conn,
        })
    }

    /// Re-dials if the record at `record_index` falls on the reconnect
    /// boundary. Returns whether a new session was established.
    ///
    /// The previous session is quit after the new one is up. A failure to
    /// quit is only logged.
    pub async fn ensure_session(&mut self, record_index: u64) -> Result<bool, D::Error> {
        if !needs_redial(record_index, self.max_mail_per_conn) {
            return Ok(false);
        }
        debug!("reconnecting before record {}", record_index);
        let fresh = self.dialer.dial().await?;
        let mut stale = std::mem::replace(&mut self.session, fresh);
        if let Err(err) = stale.quit().await {
            warn!("could not close previous relay session: {}", err);
        }
        Ok(true)
    }

    /// The current session
    pub fn session(&mut self) -> &mut D::Session {
        &mut self.session
    }

    /// Quits the current session
    pub async fn close(mut self) {
        if let Err(err) = self.session.quit().await {
            warn!("could not close relay session: {}", err);
        }
    }
}
