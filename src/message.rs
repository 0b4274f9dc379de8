//! Outgoing message composition.
//!
//! A new [`OutgoingMessage`] is built for every recipient and formatted as a
//! single-part `text/html` RFC 5322 message for the DATA command.

use chrono::Local;

use crate::config::Config;
use crate::error::{Error, MailerResult};
use crate::types::{encode_header_value, Mailbox, Recipient};

/// Sender side of every message in a run: From, Reply-To and Subject
#[derive(Debug, Clone)]
pub struct Letterhead {
    from: Mailbox,
    reply_to: Option<Mailbox>,
    subject: String,
}

impl Letterhead {
    pub fn new(from: Mailbox, reply_to: Option<Mailbox>, subject: String) -> Self {
        Letterhead {
            from,
            reply_to,
            subject,
        }
    }

    /// Parses the configured From and Reply-To values
    pub fn from_config(config: &Config) -> MailerResult<Letterhead> {
        let from = config
            .mail_from
            .parse()
            .map_err(|source| Error::Mailbox {
                header: "From",
                value: config.mail_from.clone(),
                source,
            })?;
        let reply_to = match config.mail_reply_to {
            Some(ref value) => Some(value.parse().map_err(|source| Error::Mailbox {
                header: "Reply-To",
                value: value.clone(),
                source,
            })?),
            None => None,
        };
        Ok(Letterhead::new(from, reply_to, config.mail_subject.clone()))
    }

    /// Builds the message for `recipient` around a rendered HTML body
    pub fn compose(&self, recipient: &Recipient, html_body: String) -> OutgoingMessage {
        let to = recipient.mailbox();
        let mut headers = vec![
            ("MIME-Version", "1.0".to_string()),
            ("Date", Local::now().to_rfc2822()),
            ("Message-ID", message_id(&self.from)),
            ("From", self.from.to_string()),
            ("To", to.to_string()),
        ];
        if let Some(ref reply_to) = self.reply_to {
            headers.push(("Reply-To", reply_to.to_string()));
        }
        headers.push(("Subject", encode_header_value(&self.subject)));
        headers.push(("Content-Type", "text/html; charset=UTF-8".to_string()));
        headers.push(("Content-Transfer-Encoding", "quoted-printable".to_string()));

        OutgoingMessage {
            sender: self.from.address().to_string(),
            recipient: to.address().to_string(),
            headers,
            html_body,
        }
    }
}

fn message_id(from: &Mailbox) -> String {
    format!(
        "<{}@{}>",
        uuid::Uuid::new_v4().simple(),
        from.domain().unwrap_or("localhost")
    )
}

/// A composed message and its envelope addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    sender: String,
    recipient: String,
    headers: Vec<(&'static str, String)>,
    html_body: String,
}

impl OutgoingMessage {
    /// Envelope sender (MAIL FROM)
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Envelope recipient (RCPT TO)
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Value of the first header called `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The rendered body, before transfer encoding
    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    /// Formats headers and the quoted-printable body with CRLF line endings
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = String::with_capacity(self.html_body.len() + 512);
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        let body = self.html_body.replace("\r\n", "\n").replace('\n', "\r\n");
        out.push_str(&quoted_printable::encode_to_str(body.as_bytes()));
        out.into_bytes()
    }
}
