//! The relay dialer opens authenticated SMTP sessions to the mail relay.
//!
//! The SMTP conversation is handled by `async-smtp`; this module picks the
//! connection security, upgrades the stream to TLS and logs in.

use std::fmt;
use std::time::Duration;

use async_smtp::authentication::{Credentials, Mechanism};
use async_smtp::extension::ClientId;
use async_smtp::{EmailAddress, Envelope, SendableEmail, SmtpClient, SmtpTransport};
use async_trait::async_trait;
use log::debug;
use tokio::io::BufStream;
use tokio::time::timeout;

use crate::config::Config;
use crate::message::OutgoingMessage;
use crate::relay::error::{Error, RelayResult};
use crate::relay::net::NetworkStream;
use crate::session::{Dialer, Session};

pub mod error;
pub mod net;

/// Submission over TLS port
pub const SUBMISSIONS_PORT: u16 = 465;

/// Mechanisms tried, in order, against those the relay advertises
const MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

/// How to apply TLS to a relay connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Insecure connection, only used for a relay on the loopback interface
    None,
    /// Start with an insecure connection and require `STARTTLS`
    StartTls,
    /// Use TLS wrapped connection
    Wrapper,
}

impl Security {
    /// Security for a relay at `host:port`
    pub fn for_relay(host: &str, port: u16) -> Security {
        if port == SUBMISSIONS_PORT {
            Security::Wrapper
        } else if is_loopback(host) {
            Security::None
        } else {
            Security::StartTls
        }
    }
}

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .map_or(false, |ip| ip.is_loopback())
}

fn hello_name() -> ClientId {
    let name = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    ClientId::new(name)
}

type RelayStream = BufStream<NetworkStream>;

/// Dials the configured relay
#[derive(Debug)]
pub struct RelayDialer {
    host: String,
    port: u16,
    security: Security,
    credentials: Credentials,
    timeout: Duration,
}

impl RelayDialer {
    pub fn new(config: &Config) -> RelayDialer {
        RelayDialer {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            security: Security::for_relay(&config.smtp_host, config.smtp_port),
            credentials: Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ),
            timeout: config.smtp_timeout,
        }
    }

    pub fn security(&self) -> Security {
        self.security
    }

    async fn connect(&self) -> RelayResult<RelaySession> {
        let mut stream = NetworkStream::connect(&self.host, self.port).await?;
        debug!("connected to {}:{}", self.host, self.port);

        if self.security == Security::Wrapper {
            stream = stream.upgrade_tls(&self.host).await?;
        }
        let mut transport =
            SmtpTransport::new(SmtpClient::new().hello_name(hello_name()), BufStream::new(stream))
                .await?;

        if self.security == Security::StartTls {
            let stream = transport.starttls().await?.into_inner();
            let stream = stream.upgrade_tls(&self.host).await?;
            debug!("connection to {} encrypted", self.host);
            transport = SmtpTransport::new(
                SmtpClient::new()
                    .hello_name(hello_name())
                    .without_greeting(),
                BufStream::new(stream),
            )
            .await?;
        }

        transport.try_login(&self.credentials, MECHANISMS).await?;
        Ok(RelaySession {
            transport,
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl Dialer for RelayDialer {
    type Session = RelaySession;
    type Error = Error;

    async fn dial(&self) -> RelayResult<RelaySession> {
        timeout(self.timeout, self.connect()).await?
    }
}

/// Authenticated session with the relay
pub struct RelaySession {
    transport: SmtpTransport<RelayStream>,
    timeout: Duration,
}

impl fmt::Debug for RelaySession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RelaySession")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn envelope(message: &OutgoingMessage) -> RelayResult<Envelope> {
    let from = EmailAddress::new(message.sender().to_string())
        .map_err(|err| Error::Envelope(err.to_string()))?;
    let to = EmailAddress::new(message.recipient().to_string())
        .map_err(|err| Error::Envelope(err.to_string()))?;
    Envelope::new(Some(from), vec![to]).map_err(|err| Error::Envelope(err.to_string()))
}

#[async_trait]
impl Session for RelaySession {
    type Error = Error;

    async fn send(&mut self, message: &OutgoingMessage) -> RelayResult<()> {
        let email = SendableEmail::new(envelope(message)?, message.formatted());
        let response = timeout(self.timeout, self.transport.send(email)).await??;
        debug!(
            "to=<{}> status=sent ({})",
            message.recipient(),
            response
                .message
                .first()
                .map(String::as_str)
                .unwrap_or("no response")
        );
        Ok(())
    }

    async fn quit(&mut self) -> RelayResult<()> {
        timeout(self.timeout, self.transport.quit()).await??;
        Ok(())
    }
}
