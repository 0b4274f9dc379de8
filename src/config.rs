//! Run parameters.
//!
//! [`Args`] is what the command line and environment provide;
//! [`Args::validate`] turns it into the immutable [`Config`] used by the
//! rest of the crate, or names the first missing parameter.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default sent log
pub const DEFAULT_SENT_LOG_FILE: &str = "sent.log";
/// Default relay
pub const DEFAULT_SMTP_HOST: &str = "smtp.sendgrid.net";
/// Default submission port
pub const DEFAULT_SMTP_PORT: u16 = 587;
/// Default network timeout, in seconds
pub const DEFAULT_SMTP_TIMEOUT: u64 = 60;
/// Default number of records per relay connection
pub const DEFAULT_MAX_MAIL_PER_CONN: u64 = 1000;
/// Default From header
pub const DEFAULT_MAIL_FROM: &str = "CourseNetworking <em@thecn.com>";
/// Default Reply-To header
pub const DEFAULT_MAIL_REPLY_TO: &str = "CourseNetworking <help@thecn.com>";
/// Default unsubscribe site
pub const DEFAULT_UNSUBSCRIBE_HOST: &str = "https://www.thecn.com";

/// Send a templated HTML message with a per-recipient unsubscribe link to
/// every recipient of a CSV file
#[derive(Parser, Debug, Clone)]
#[command(name = "cn-mailer", version)]
pub struct Args {
    /// Base URL, e.g. https://www.thecn.com
    #[arg(long, env = "CN_MAILER_HOST")]
    pub host: Option<String>,

    /// Recipients, one `id,name,email` line each
    #[arg(long, env = "CN_MAILER_SOURCE_FILE")]
    pub source_file: Option<PathBuf>,

    /// Log of recipients the relay accepted, appended to
    #[arg(long, env = "CN_MAILER_SENT_LOG_FILE", default_value = DEFAULT_SENT_LOG_FILE)]
    pub sent_log_file: PathBuf,

    /// HTML body template, e.g. template.html
    #[arg(long, env = "CN_MAILER_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// SMTP relay host
    #[arg(long, env = "CN_MAILER_SMTP_HOST", default_value = DEFAULT_SMTP_HOST)]
    pub smtp_host: String,

    /// SMTP account username
    #[arg(long, env = "CN_MAILER_SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP account password
    #[arg(long, env = "CN_MAILER_SMTP_PWD", hide_env_values = true)]
    pub smtp_pwd: Option<String>,

    /// SMTP relay port
    #[arg(long, env = "CN_MAILER_SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,

    /// Network timeout for dialing and for each message, in seconds
    #[arg(long, env = "CN_MAILER_SMTP_TIMEOUT", default_value_t = DEFAULT_SMTP_TIMEOUT)]
    pub smtp_timeout: u64,

    /// Records per relay connection before reconnecting, 0 never reconnects
    #[arg(long, env = "CN_MAILER_MAX_MAIL_PER_CONN", default_value_t = DEFAULT_MAX_MAIL_PER_CONN)]
    pub max_mail_per_conn: u64,

    /// From header, e.g. "CourseNetworking <em@thecn.com>"
    #[arg(long, env = "CN_MAILER_MAIL_FROM", default_value = DEFAULT_MAIL_FROM)]
    pub mail_from: String,

    /// Reply-To header, empty to leave it out
    #[arg(long, env = "CN_MAILER_MAIL_REPLY_TO", default_value = DEFAULT_MAIL_REPLY_TO)]
    pub mail_reply_to: String,

    /// Subject of the message
    #[arg(long, env = "CN_MAILER_MAIL_SUBJECT")]
    pub mail_subject: Option<String>,

    /// Salt for the unsubscribe token
    #[arg(long, env = "CN_MAILER_UNSUBSCRIBE_SALT", hide_env_values = true)]
    pub unsubscribe_salt: Option<String>,

    /// Site serving the unsubscribe page
    #[arg(long, env = "CN_MAILER_UNSUBSCRIBE_HOST", default_value = DEFAULT_UNSUBSCRIBE_HOST)]
    pub unsubscribe_host: String,

    /// Render every message but do not contact the relay or write the sent
    /// log; relay credentials are not required
    #[arg(long, env = "CN_MAILER_DRY_RUN")]
    pub dry_run: bool,
}

/// Error for a parameter that is missing or empty
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is missing")]
    Missing(&'static str),
}

/// Validated parameters of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub source_file: PathBuf,
    pub sent_log_file: PathBuf,
    pub template: PathBuf,
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_port: u16,
    pub smtp_timeout: Duration,
    pub max_mail_per_conn: u64,
    pub mail_from: String,
    /// `None` when no Reply-To header is sent
    pub mail_reply_to: Option<String>,
    pub mail_subject: String,
    pub unsubscribe_salt: String,
    pub unsubscribe_host: String,
    pub dry_run: bool,
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn required_path(value: Option<PathBuf>, name: &'static str) -> Result<PathBuf, ConfigError> {
    value
        .filter(|value| !value.as_os_str().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn non_empty(value: String, name: &'static str) -> Result<String, ConfigError> {
    required(Some(value), name)
}

impl Args {
    /// Checks that every required parameter is present and not empty.
    ///
    /// Parameters are checked in a fixed order and the first failure is
    /// returned. Numeric parameters are taken as given. A dry run does not
    /// need relay credentials.
    pub fn validate(self) -> Result<Config, ConfigError> {
        let host = required(self.host, "host")?;
        let source_file = required_path(self.source_file, "source_file")?;
        let template = required_path(self.template, "template")?;
        let smtp_host = non_empty(self.smtp_host, "smtp_host")?;
        let (smtp_username, smtp_password) = if self.dry_run {
            (
                self.smtp_username.unwrap_or_default(),
                self.smtp_pwd.unwrap_or_default(),
            )
        } else {
            (
                required(self.smtp_username, "smtp_username")?,
                required(self.smtp_pwd, "smtp_pwd")?,
            )
        };
        let mail_subject = required(self.mail_subject, "mail_subject")?;
        let mail_from = non_empty(self.mail_from, "mail_from")?;
        let unsubscribe_salt = required(self.unsubscribe_salt, "unsubscribe_salt")?;
        let unsubscribe_host = non_empty(self.unsubscribe_host, "unsubscribe_host")?;

        Ok(Config {
            host,
            source_file,
            sent_log_file: self.sent_log_file,
            template,
            smtp_host,
            smtp_username,
            smtp_password,
            smtp_port: self.smtp_port,
            smtp_timeout: Duration::from_secs(self.smtp_timeout),
            max_mail_per_conn: self.max_mail_per_conn,
            mail_from,
            mail_reply_to: Some(self.mail_reply_to).filter(|value| !value.is_empty()),
            mail_subject,
            unsubscribe_salt,
            unsubscribe_host,
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FULL: &[&str] = &[
        "cn-mailer",
        "--host",
        "https://www.thecn.com",
        "--source-file",
        "users.csv",
        "--template",
        "template.html",
        "--smtp-username",
        "apikey",
        "--smtp-pwd",
        "secret",
        "--mail-subject",
        "News",
        "--unsubscribe-salt",
        "pepper",
    ];

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    fn without(flag: &str) -> Vec<&'static str> {
        let position = FULL.iter().position(|arg| *arg == flag).unwrap();
        FULL.iter()
            .enumerate()
            .filter(|(index, _)| *index != position && *index != position + 1)
            .map(|(_, arg)| *arg)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = parse(FULL).validate().unwrap();
        assert_eq!(config.sent_log_file, PathBuf::from("sent.log"));
        assert_eq!(config.smtp_host, "smtp.sendgrid.net");
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.smtp_timeout, Duration::from_secs(60));
        assert_eq!(config.max_mail_per_conn, 1000);
        assert_eq!(config.mail_from, "CourseNetworking <em@thecn.com>");
        assert_eq!(
            config.mail_reply_to.as_deref(),
            Some("CourseNetworking <help@thecn.com>")
        );
        assert_eq!(config.unsubscribe_host, "https://www.thecn.com");
        assert_eq!(config.smtp_password, "secret");
        assert!(!config.dry_run);
    }

    #[test]
    fn test_missing_salt() {
        assert_eq!(
            parse(&without("--unsubscribe-salt")).validate(),
            Err(ConfigError::Missing("unsubscribe_salt"))
        );
    }

    #[test]
    fn test_each_required_parameter() {
        for (flag, name) in [
            ("--host", "host"),
            ("--source-file", "source_file"),
            ("--template", "template"),
            ("--smtp-username", "smtp_username"),
            ("--smtp-pwd", "smtp_pwd"),
            ("--mail-subject", "mail_subject"),
            ("--unsubscribe-salt", "unsubscribe_salt"),
        ] {
            assert_eq!(
                parse(&without(flag)).validate(),
                Err(ConfigError::Missing(name)),
                "{}",
                flag
            );
        }
    }

    #[test]
    fn test_empty_values_are_missing() {
        let mut args = FULL.to_vec();
        args.extend(["--smtp-host", ""]);
        assert_eq!(
            parse(&args).validate(),
            Err(ConfigError::Missing("smtp_host"))
        );

        let mut args = FULL.to_vec();
        args.extend(["--mail-from", "", "--unsubscribe-host", ""]);
        assert_eq!(
            parse(&args).validate(),
            Err(ConfigError::Missing("mail_from"))
        );
    }

    #[test]
    fn test_first_missing_parameter_wins() {
        assert_eq!(
            parse(&["cn-mailer"]).validate(),
            Err(ConfigError::Missing("host"))
        );
        assert_eq!(
            parse(&["cn-mailer", "--host", "h", "--template", "t.html"]).validate(),
            Err(ConfigError::Missing("source_file"))
        );
    }

    #[test]
    fn test_dry_run_without_credentials() {
        let mut args: Vec<&str> = without("--smtp-username")
            .into_iter()
            .filter(|arg| *arg != "--smtp-pwd" && *arg != "secret")
            .collect();
        assert_eq!(
            parse(&args).validate(),
            Err(ConfigError::Missing("smtp_username"))
        );

        args.push("--dry-run");
        let config = parse(&args).validate().unwrap();
        assert!(config.dry_run);
        assert_eq!(config.smtp_username, "");
        assert_eq!(config.smtp_password, "");
    }

    #[test]
    fn test_empty_reply_to_disables_header() {
        let mut args = FULL.to_vec();
        args.extend(["--mail-reply-to", "", "--max-mail-per-conn", "2", "--dry-run"]);
        let config = parse(&args).validate().unwrap();
        assert_eq!(config.mail_reply_to, None);
        assert_eq!(config.max_mail_per_conn, 2);
        assert!(config.dry_run);
    }
}
