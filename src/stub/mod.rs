//! The stub dialer opens in-memory sessions that log each message envelope
//! and keep the message instead of delivering it. It backs dry runs and is
//! useful for testing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::info;

use crate::message::OutgoingMessage;
use crate::session::{Dialer, Session};
use crate::stub::error::{Error, StubResult};

pub mod error;

/// A message accepted by a stub session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Which session took the message, 1 for the first dial
    pub session: usize,
    pub message: OutgoingMessage,
}

#[derive(Debug, Default)]
struct State {
    dials: usize,
    quits: usize,
    deliveries: Vec<Delivery>,
}

/// Dialer for in-memory sessions.
///
/// Clones share their record of dials and deliveries.
#[derive(Debug, Clone, Default)]
pub struct StubDialer {
    state: Arc<Mutex<State>>,
    rejected: HashSet<String>,
    max_dials: Option<usize>,
}

impl StubDialer {
    /// Creates a dialer whose sessions accept every message
    pub fn new_positive() -> StubDialer {
        StubDialer::default()
    }

    /// Makes sessions reject messages for `address`
    pub fn reject<S: Into<String>>(mut self, address: S) -> StubDialer {
        self.rejected.insert(address.into());
        self
    }

    /// Makes every dial after the first `dials` fail
    pub fn refuse_dials_after(mut self, dials: usize) -> StubDialer {
        self.max_dials = Some(dials);
        self
    }

    /// Number of sessions established so far
    pub fn dials(&self) -> usize {
        self.state().dials
    }

    /// Number of sessions quit so far
    pub fn quits(&self) -> usize {
        self.state().quits
    }

    /// Messages accepted so far, in order
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.state().deliveries.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Dialer for StubDialer {
    type Session = StubSession;
    type Error = Error;

    async fn dial(&self) -> Result<StubSession, Error> {
        let mut state = self.state();
        if self.max_dials.map_or(false, |max| state.dials >= max) {
            return Err(Error::Refused);
        }
        state.dials += 1;
        Ok(StubSession {
            id: state.dials,
            state: Arc::clone(&self.state),
            rejected: self.rejected.clone(),
        })
    }
}

/// Session opened by [`StubDialer`]
#[derive(Debug)]
pub struct StubSession {
    id: usize,
    state: Arc<Mutex<State>>,
    rejected: HashSet<String>,
}

#[async_trait]
impl Session for StubSession {
    type Error = Error;

    async fn send(&mut self, message: &OutgoingMessage) -> StubResult {
        info!(
            "stub session {}: from=<{}> to=<{}>",
            self.id,
            message.sender(),
            message.recipient()
        );
        if self.rejected.contains(message.recipient()) {
            return Err(Error::Rejected(message.recipient().to_string()));
        }
        lock(&self.state).deliveries.push(Delivery {
            session: self.id,
            message: message.clone(),
        });
        Ok(())
    }

    async fn quit(&mut self) -> StubResult {
        lock(&self.state).quits += 1;
        Ok(())
    }
}
