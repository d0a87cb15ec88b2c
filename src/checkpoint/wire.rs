//! Checkpoint wire protocol
//!
//! Textual, delimiter-framed, no length prefix. Four commands, each a
//! single message ending in the terminator:
//!
//! ```text
//! new:$                                  (re)initialize the slot
//! remove:$                               clear the slot
//! store:<name>:<user>|<phase>#...#$      replace the slot
//! restore:$                              request the current snapshot
//! ```
//!
//! The restore response is `<name>:<user>|<phase>#...#$`; any payload
//! containing no command separator means nothing is stored. Phases
//! travel as their four literal names.
//!
//! Group and member names are percent-escaped so the reserved bytes can
//! never break framing. Fields without reserved bytes encode exactly as
//! the unescaped legacy format, and decoding accepts legacy payloads.

use crate::common::{Error, Result};
use crate::coordinator::Phase;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

pub const CMD_MARKER: char = ':';
pub const MEMBER_MARKER: char = '#';
pub const FIELD_MARKER: char = '|';
pub const TERMINATOR: char = '$';
pub const TERMINATOR_BYTE: u8 = b'$';

/// Reserved bytes escaped inside name fields: the four markers plus the
/// escape character itself.
const FIELD_ESCAPE_SET: &AsciiSet = &CONTROLS
    .add(b':')
    .add(b'#')
    .add(b'|')
    .add(b'$')
    .add(b'%');

/// The serialized (name, membership, phases) tuple persisted to survive
/// a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub members: Vec<(String, Phase)>,
}

fn escape(field: &str) -> String {
    utf8_percent_encode(field, FIELD_ESCAPE_SET).to_string()
}

fn unescape(field: &str) -> Result<String> {
    percent_decode_str(field)
        .decode_utf8()
        .map(|s| s.to_string())
        .map_err(|_| Error::MalformedSnapshot(format!("field is not UTF-8: {}", field)))
}

pub fn encode_create() -> String {
    format!("new{}{}", CMD_MARKER, TERMINATOR)
}

pub fn encode_remove() -> String {
    format!("remove{}{}", CMD_MARKER, TERMINATOR)
}

pub fn encode_restore() -> String {
    format!("restore{}{}", CMD_MARKER, TERMINATOR)
}

pub fn encode_store(snapshot: &Snapshot) -> String {
    let mut msg = format!(
        "store{}{}{}",
        CMD_MARKER,
        escape(&snapshot.name),
        CMD_MARKER
    );
    for (user, phase) in &snapshot.members {
        msg.push_str(&escape(user));
        msg.push(FIELD_MARKER);
        msg.push_str(phase.as_str());
        msg.push(MEMBER_MARKER);
    }
    msg.push(TERMINATOR);
    msg
}

/// Decode a restore response.
///
/// `Ok(None)` means nothing is stored (no command separator in the
/// payload). `MalformedSnapshot` means the payload has the shape of a
/// snapshot but can't be trusted; the caller treats that as nothing to
/// restore rather than a fatal error.
pub fn decode_snapshot(payload: &str) -> Result<Option<Snapshot>> {
    let body = match payload.split_once(TERMINATOR) {
        Some((body, _)) => body,
        None => payload,
    };

    let (name_part, member_part) = match body.split_once(CMD_MARKER) {
        Some(parts) => parts,
        None => return Ok(None),
    };

    let name = unescape(name_part)?;
    if name.is_empty() {
        return Err(Error::MalformedSnapshot("empty group name".into()));
    }

    let mut members = Vec::new();
    for entry in member_part.split(MEMBER_MARKER) {
        // The member list is #-terminated, so the final segment is empty.
        let (user, phase) = match entry.split_once(FIELD_MARKER) {
            Some(parts) => parts,
            None => continue,
        };
        members.push((unescape(user)?, unescape(phase)?.parse::<Phase>()?));
    }

    if members.is_empty() {
        return Err(Error::MalformedSnapshot(format!(
            "no members recorded for group {}",
            name
        )));
    }

    Ok(Some(Snapshot { name, members }))
}
