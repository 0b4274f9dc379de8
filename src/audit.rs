//! Append-only log of recipients that were handed to the relay.
//!
//! Each line is the recipient's source fields joined by `,`, so the file can
//! be compared against the source of a later run.

use std::path::{Path, PathBuf};

use log::debug;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, MailerResult};
use crate::types::Recipient;

/// The sent log
#[derive(Debug)]
pub struct AuditLog {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Opens `path` for appending, creating it if needed
    pub async fn open(path: &Path) -> MailerResult<AuditLog> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| Error::OpenAuditLog {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("appending sent recipients to {}", path.display());
        Ok(AuditLog {
            file: Some(file),
            path: Some(path.to_path_buf()),
        })
    }

    /// A log that records nothing, for dry runs
    pub fn disabled() -> AuditLog {
        AuditLog {
            file: None,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends one line for `recipient` and flushes it
    pub async fn record(&mut self, recipient: &Recipient) -> MailerResult<()> {
        let file = match self.file {
            Some(ref mut file) => file,
            None => return Ok(()),
        };
        let mut line = recipient.audit_line();
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(Error::AuditLog)?;
        file.flush().await.map_err(Error::AuditLog)?;
        Ok(())
    }
}
