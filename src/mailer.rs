//! The batch send loop.
//!
//! Records are read in order. Each well-formed record gets its own rendered
//! body and message, is handed to the current session, and is appended to the
//! sent log once the relay accepts it.

use std::fs::File;
use std::io::Read;

use csv::ReaderBuilder;
use log::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::config::Config;
use crate::error::{Error, MailerResult};
use crate::message::Letterhead;
use crate::session::{Dialer, Session, SessionPolicy};
use crate::template::{RenderContext, Template};
use crate::types::{Recipient, RECORD_FIELDS};
use crate::unsubscribe;

/// What happened to the records of a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records read from the source, malformed ones included
    pub attempted: u64,
    /// Records accepted by the relay and written to the sent log
    pub sent: u64,
    /// Records the relay did not accept
    pub failed: u64,
    /// Records without exactly three fields
    pub malformed: u64,
}

/// Sends one message per source record
#[derive(Debug)]
pub struct Mailer<'a> {
    config: &'a Config,
    letterhead: Letterhead,
}

impl<'a> Mailer<'a> {
    /// Prepares a run. Only the From and Reply-To values are checked here,
    /// nothing is opened.
    pub fn new(config: &'a Config) -> MailerResult<Mailer<'a>> {
        Ok(Mailer {
            config,
            letterhead: Letterhead::from_config(config)?,
        })
    }

    /// Runs the batch over sessions from `dialer`.
    ///
    /// Opens, in order, the source file, the first session, the template and
    /// the sent log; any failure there aborts the run. Then processes records
    /// until the end of the source or the first read error.
    pub async fn run<D: Dialer>(&self, dialer: D) -> MailerResult<BatchOutcome> {
        let source = File::open(&self.config.source_file).map_err(|source| Error::OpenSource {
            path: self.config.source_file.clone(),
            source,
        })?;
        self.run_from(source, dialer).await
    }

    /// Like [`run`](Mailer::run), with records read from `source` instead of
    /// the configured source file.
    pub async fn run_from<R: Read, D: Dialer>(
        &self,
        source: R,
        dialer: D,
    ) -> MailerResult<BatchOutcome> {
        let config = self.config;
        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source)
            .into_byte_records();

        let mut sessions = SessionPolicy::establish(dialer, config.max_mail_per_conn)
            .await
            .map_err(|err| Error::Dial(Box::new(err)))?;

        let template = Template::load(&config.template).await?;

        let mut audit = if config.dry_run {
            AuditLog::disabled()
        } else {
            AuditLog::open(&config.sent_log_file).await?
        };

        let mut outcome = BatchOutcome::default();
        let mut index: u64 = 0;
        loop {
            index += 1;

            let record = match records.next() {
                None => break,
                Some(Ok(record)) => record,
                Some(Err(err)) => {
                    error!("[Err]{}", err);
                    break;
                }
            };

            // Only records actually read count towards a reconnect, so the
            // end of the source never opens a session that would go unused.
            sessions
                .ensure_session(index)
                .await
                .map_err(|err| Error::Redial(Box::new(err)))?;
            outcome.attempted += 1;

            let recipient = match Recipient::from_record(&record) {
                Ok(recipient) => recipient,
                Err(fields) => {
                    warn!(
                        "[Err]Incorrect format, line: {} ({} fields, expected {})",
                        index, fields, RECORD_FIELDS
                    );
                    outcome.malformed += 1;
                    continue;
                }
            };

            let unsubscribe_url = unsubscribe::url(
                &config.unsubscribe_host,
                &recipient.id,
                &config.unsubscribe_salt,
            );
            let body = template
                .render(&RenderContext::new(&unsubscribe_url, &config.host))
                .map_err(Error::Render)?;
            let message = self.letterhead.compose(&recipient, body);

            match sessions.session().send(&message).await {
                Ok(()) => {
                    info!(
                        "[OK]Sent to {}: {} <{}>",
                        recipient.id, recipient.name, recipient.address
                    );
                    audit.record(&recipient).await?;
                    outcome.sent += 1;
                }
                Err(err) => {
                    error!(
                        "[Err]Could not send email to {:?}: {}",
                        recipient.address, err
                    );
                    outcome.failed += 1;
                }
            }
        }

        debug!("end of source after {} records", outcome.attempted);
        sessions.close().await;
        Ok(outcome)
    }
}
