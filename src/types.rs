use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use csv::ByteRecord;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, take_till1, take_while1};
use nom::character::complete::{anychar, char, multispace0};
use nom::combinator::{all_consuming, map, opt};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;

/// Number of fields in a well-formed source line: `id,name,email`
pub const RECORD_FIELDS: usize = 3;

/// One recipient, read from a line of the source file
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Recipient {
    /// User identifier, used for the unsubscribe link
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address
    pub address: String,
}

impl Recipient {
    /// Builds a recipient from a source record.
    ///
    /// Returns the field count of the record when it is not exactly
    /// [`RECORD_FIELDS`]. Bytes that are not UTF-8 become U+FFFD.
    pub fn from_record(record: &ByteRecord) -> Result<Recipient, usize> {
        if record.len() != RECORD_FIELDS {
            return Err(record.len());
        }
        let field = |index: usize| String::from_utf8_lossy(&record[index]).into_owned();
        Ok(Recipient {
            id: field(0),
            name: field(1),
            address: field(2),
        })
    }

    /// The recipient as a mailbox, for the `To` header
    pub fn mailbox(&self) -> Mailbox {
        Mailbox::new(Some(self.name.clone()), self.address.clone())
    }

    /// The source fields joined back together, as written to the sent log
    pub fn audit_line(&self) -> String {
        [self.id.as_str(), self.name.as_str(), self.address.as_str()].join(",")
    }
}

/// Error returned when a header value is not a mailbox
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// Nothing that looks like `Name <address>` or `address`
    #[error("expected `Name <address>` or `address`")]
    Syntax,
}

/// A mailbox as written in a header: optional display name and an address
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mailbox {
    name: Option<String>,
    address: String,
}

impl Mailbox {
    /// Creates a mailbox, an empty name is the same as no name
    pub fn new(name: Option<String>, address: String) -> Mailbox {
        Mailbox {
            name: name.filter(|name| !name.trim().is_empty()),
            address,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Domain part of the address, if any
    pub fn domain(&self) -> Option<&str> {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }
}

fn angle_addr(input: &str) -> IResult<&str, &str> {
    delimited(char('<'), take_while1(|c| c != '>'), char('>'))(input)
}

fn quoted_name(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(is_not("\\\""), '\\', anychar)),
            char('"'),
        ),
        Option::unwrap_or_default,
    )(input)
}

fn bare_name(input: &str) -> IResult<&str, String> {
    map(take_till1(|c| c == '<' || c == '"'), |name: &str| {
        name.trim().to_string()
    })(input)
}

fn named_mailbox(input: &str) -> IResult<&str, Mailbox> {
    map(
        pair(
            preceded(multispace0, alt((quoted_name, bare_name))),
            delimited(multispace0, angle_addr, multispace0),
        ),
        |(name, address)| Mailbox::new(Some(name), address.trim().to_string()),
    )(input)
}

fn addr_spec(input: &str) -> IResult<&str, Mailbox> {
    map(
        delimited(
            multispace0,
            alt((angle_addr, take_till1(char::is_whitespace))),
            multispace0,
        ),
        |address: &str| Mailbox::new(None, address.trim().to_string()),
    )(input)
}

fn mailbox(input: &str) -> IResult<&str, Mailbox> {
    all_consuming(terminated(alt((named_mailbox, addr_spec)), multispace0))(input)
}

impl FromStr for Mailbox {
    type Err = MailboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match mailbox(s) {
            Ok((_, mailbox)) if !mailbox.address.is_empty() => Ok(mailbox),
            _ => Err(MailboxError::Syntax),
        }
    }
}

/// Header form: `Name <address>`, quoting or encoding the name as needed
impl Display for Mailbox {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{} <{}>", encode_display_name(name), self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Characters allowed unquoted in a display name (RFC 5322 atext and spaces)
fn is_phrase_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

fn needs_encoding(value: &str) -> bool {
    value.chars().any(|c| !c.is_ascii() || c.is_ascii_control())
}

/// Input bytes per encoded word; 60 base64 characters keep a word within 75
const ENCODED_WORD_BYTES: usize = 45;

/// RFC 2047 encoded words, used for non-ASCII or control characters.
///
/// Long values are split on character boundaries into several words separated
/// by folding whitespace.
fn encoded_word(value: &str) -> String {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (index, c) in value.char_indices() {
        if index + c.len_utf8() - start > ENCODED_WORD_BYTES {
            chunks.push(&value[start..index]);
            start = index;
        }
    }
    chunks.push(&value[start..]);

    chunks
        .iter()
        .map(|chunk| format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

fn encode_display_name(name: &str) -> String {
    if needs_encoding(name) {
        encoded_word(name)
    } else if name.chars().all(is_phrase_char) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Encodes an unstructured header value such as the subject
pub fn encode_header_value(value: &str) -> String {
    if needs_encoding(value) {
        encoded_word(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_recipient_from_record() {
        let record = ByteRecord::from(vec!["u1", "Alice", "alice@example.com"]);
        let recipient = Recipient::from_record(&record).unwrap();
        assert_eq!(recipient.id, "u1");
        assert_eq!(recipient.name, "Alice");
        assert_eq!(recipient.address, "alice@example.com");
        assert_eq!(recipient.audit_line(), "u1,Alice,alice@example.com");

        let short = ByteRecord::from(vec!["u1", "alice@example.com"]);
        assert_eq!(Recipient::from_record(&short), Err(2));
        let long = ByteRecord::from(vec!["u1", "Alice", "alice@example.com", "x"]);
        assert_eq!(Recipient::from_record(&long), Err(4));
    }

    #[test]
    fn test_recipient_from_latin1_record() {
        let record = ByteRecord::from(vec![&b"u1"[..], &b"Jos\xE9"[..], &b"jose@example.com"[..]]);
        let recipient = Recipient::from_record(&record).unwrap();
        assert_eq!(recipient.name, "Jos\u{FFFD}");
        assert_eq!(recipient.address, "jose@example.com");
    }

    #[test]
    fn test_parse_mailbox() {
        let mailbox: Mailbox = "CourseNetworking <em@thecn.com>".parse().unwrap();
        assert_eq!(mailbox.name(), Some("CourseNetworking"));
        assert_eq!(mailbox.address(), "em@thecn.com");
        assert_eq!(mailbox.domain(), Some("thecn.com"));

        let mailbox: Mailbox = "\"Doe, \\\"Jane\\\"\" <jane@example.org>".parse().unwrap();
        assert_eq!(mailbox.name(), Some("Doe, \"Jane\""));
        assert_eq!(mailbox.address(), "jane@example.org");

        let mailbox: Mailbox = " help@thecn.com ".parse().unwrap();
        assert_eq!(mailbox.name(), None);
        assert_eq!(mailbox.address(), "help@thecn.com");

        let mailbox: Mailbox = "<help@thecn.com>".parse().unwrap();
        assert_eq!(mailbox.name(), None);
        assert_eq!(mailbox.address(), "help@thecn.com");

        assert!("".parse::<Mailbox>().is_err());
        assert!("Name <>".parse::<Mailbox>().is_err());
        assert!("two words@example.org".parse::<Mailbox>().is_err());
    }

    #[test]
    fn test_display_mailbox() {
        let plain = Mailbox::new(Some("Alice".to_string()), "alice@example.com".to_string());
        assert_eq!(plain.to_string(), "Alice <alice@example.com>");

        let quoted = Mailbox::new(Some("Doe, Jane".to_string()), "jane@example.org".to_string());
        assert_eq!(quoted.to_string(), "\"Doe, Jane\" <jane@example.org>");

        let encoded = Mailbox::new(Some("Zoë".to_string()), "zoe@example.org".to_string());
        assert_eq!(encoded.to_string(), "=?UTF-8?B?Wm/Dqw==?= <zoe@example.org>");

        let unnamed = Mailbox::new(Some(" ".to_string()), "bob@example.org".to_string());
        assert_eq!(unnamed.to_string(), "bob@example.org");
    }

    #[test]
    fn test_encode_header_value() {
        assert_eq!(encode_header_value("Weekly news"), "Weekly news");
        assert_eq!(
            encode_header_value("line\r\nBcc: x@example.org"),
            format!("=?UTF-8?B?{}?=", STANDARD.encode("line\r\nBcc: x@example.org"))
        );
    }

    #[test]
    fn test_long_value_is_split_into_words() {
        let subject = "é".repeat(40);
        let encoded = encode_header_value(&subject);

        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(words.len(), 2);
        let mut decoded = Vec::new();
        for word in words {
            assert!(word.len() <= 75, "{}", word);
            let text = word
                .strip_prefix("=?UTF-8?B?")
                .and_then(|word| word.strip_suffix("?="))
                .unwrap();
            let bytes = STANDARD.decode(text).unwrap();
            // each word decodes on its own
            assert!(std::str::from_utf8(&bytes).is_ok());
            decoded.extend(bytes);
        }
        assert_eq!(String::from_utf8(decoded).unwrap(), subject);
    }
}
