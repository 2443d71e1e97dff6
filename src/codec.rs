//! Line-oriented text encoding of the keystroke log.
//!
//! One event per line, tab separated:
//!
//! ```text
//! 2024-03-01 12:00:00.125	3	a	h
//! 2024-03-01 12:00:00.410	4	backspace
//! ```
//!
//! Backspace records drop the expected field entirely. Backslashes and tab
//! characters inside labels are escaped as `\\` and `\t`.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::event::Event;
use crate::keys::BACKSPACE;

pub const TIMESTAMP_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const FIELD_SEP: char = '\t';
const RECORD_SEP: char = '\n';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
    #[error("invalid index {0:?}")]
    Index(String),
    #[error("invalid escape in label {0:?}")]
    Escape(String),
}

/// A malformed record, with its 1-based line number within the blob
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Collect per-line errors and keep going
    #[default]
    Lenient,
    /// Stop at the first malformed line
    Strict,
}

/// Result of decoding a whole blob in lenient mode
#[derive(Debug, Default)]
pub struct DecodedLog {
    pub events: Vec<Event>,
    pub errors: Vec<ParseError>,
}

pub fn serialize(event: &Event) -> String {
    let mut out = format!(
        "{}{FIELD_SEP}{}{FIELD_SEP}{}",
        event.timestamp.format(TIMESTAMP_LAYOUT),
        event.index,
        escape(&event.typed),
    );
    if !event.is_backspace() {
        out.push(FIELD_SEP);
        out.push_str(&escape(&event.expected));
    }
    out
}

/// Parse a single record. `line` is only used for error reporting.
pub fn parse(record: &str, line: usize) -> Result<Event, ParseError> {
    let err = |kind| ParseError { line, kind };
    let fields: Vec<&str> = record.split(FIELD_SEP).collect();

    if fields.len() < 3 {
        return Err(err(ParseErrorKind::FieldCount {
            expected: 4,
            found: fields.len(),
        }));
    }

    let timestamp = parse_timestamp(fields[0])
        .ok_or_else(|| err(ParseErrorKind::Timestamp(fields[0].to_string())))?;
    let index = fields[1]
        .parse::<usize>()
        .map_err(|_| err(ParseErrorKind::Index(fields[1].to_string())))?;
    let typed = unescape(fields[2]).ok_or_else(|| err(ParseErrorKind::Escape(fields[2].to_string())))?;

    let wanted = if typed == BACKSPACE { 3 } else { 4 };
    if fields.len() != wanted {
        return Err(err(ParseErrorKind::FieldCount {
            expected: wanted,
            found: fields.len(),
        }));
    }

    let expected = match fields.get(3) {
        Some(raw) => unescape(raw).ok_or_else(|| err(ParseErrorKind::Escape(raw.to_string())))?,
        None => String::new(),
    };

    Ok(Event {
        timestamp,
        typed,
        expected,
        index,
    })
}

/// Encode a whole log as a newline-joined blob
pub fn join(events: &[Event]) -> String {
    events
        .iter()
        .map(serialize)
        .collect::<Vec<_>>()
        .join(&RECORD_SEP.to_string())
}

/// Decode a blob, keeping every well-formed line and reporting the rest
pub fn split(blob: &str) -> DecodedLog {
    let mut decoded = DecodedLog::default();
    for (n, record) in records(blob) {
        match parse(record, n) {
            Ok(event) => decoded.events.push(event),
            Err(e) => decoded.errors.push(e),
        }
    }
    decoded
}

/// Decode a blob, failing on the first malformed line
pub fn split_strict(blob: &str) -> Result<Vec<Event>, ParseError> {
    records(blob).map(|(n, record)| parse(record, n)).collect()
}

/// Decode according to `mode`. In strict mode the error list is always empty.
pub fn split_with(blob: &str, mode: ParseMode) -> Result<DecodedLog, ParseError> {
    match mode {
        ParseMode::Lenient => Ok(split(blob)),
        ParseMode::Strict => split_strict(blob).map(|events| DecodedLog {
            events,
            errors: Vec::new(),
        }),
    }
}

fn records(blob: &str) -> impl Iterator<Item = (usize, &str)> {
    blob.split(RECORD_SEP)
        .enumerate()
        .map(|(i, r)| (i + 1, r.strip_suffix('\r').unwrap_or(r)))
        .filter(|(_, r)| !r.is_empty())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_LAYOUT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn escape(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}
