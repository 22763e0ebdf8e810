//! One-line JSON codec for ledger events.
//!
//! Guarantees:
//!
//! - Canonical output: keys sorted, compact, no whitespace.
//! - One-line invariant: no literal `\n` in an encoded record.
//! - Deterministic: the same event always produces the same bytes.
//! - Strict discriminator, lenient body: a line must be a JSON object with a
//!   string `t`; unknown kinds and unknown fields are preserved.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::canonical::canonicalize_json;
use super::data::{
    ConfigData, DeleteData, IssueData, IssueDoneData, MarkData, PrioritizeData, RejectData,
    SpecData, TaskData, TaskPatchData,
};
use super::kind::EventKind;
use super::{Event, UnknownEvent};

/// The discriminator field present on every line.
pub const KIND_FIELD: &str = "t";

/// Present on task creates, absent on task patches.
const NAME_FIELD: &str = "name";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding an event.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The encoded record contained a literal newline.
    #[error("encoded record contains a literal newline; one-line invariant violated")]
    NewlineInRecord,

    /// The payload did not serialize to a JSON object.
    #[error("{0} payload did not serialize to a JSON object")]
    NotAnObject(String),

    /// An extra field would change how the line decodes.
    #[error("{kind} record cannot carry reserved field \"{field}\"")]
    ReservedField { kind: String, field: &'static str },

    /// Failed to serialize the payload.
    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that can occur while decoding a line. Every variant means the
/// line is a malformed record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The line is not valid JSON.
    #[error("not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The line is JSON but not an object.
    #[error("record is not a JSON object")]
    NotAnObject,

    /// The object has no `t` field.
    #[error("record has no \"t\" field")]
    MissingKind,

    /// The `t` field is not a string.
    #[error("\"t\" field is not a string")]
    KindNotString,

    /// The payload does not match the schema for its kind.
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Serialize an [`Event`] to a single canonical line (without trailing newline).
///
/// # Errors
///
/// Returns [`EncodeError::Serialize`] if the payload fails to serialize,
/// [`EncodeError::ReservedField`] if extra fields carry `t` (or `name` on a
/// task patch), and [`EncodeError::NewlineInRecord`] if the one-line
/// invariant would break.
pub fn encode(event: &Event) -> Result<String, EncodeError> {
    let mut map = match event {
        Event::Config(d) => object_of(d, event)?,
        Event::Spec(d) => object_of(d, event)?,
        Event::Task(d) => object_of(d, event)?,
        Event::TaskPatch(d) if d.extra.contains_key(NAME_FIELD) => {
            return Err(reserved(event, NAME_FIELD));
        }
        Event::TaskPatch(d) => object_of(d, event)?,
        Event::Done(d) | Event::Accept(d) => object_of(d, event)?,
        Event::Reject(d) => object_of(d, event)?,
        Event::Delete(d) => object_of(d, event)?,
        Event::Prioritize(d) => object_of(d, event)?,
        Event::Issue(d) => object_of(d, event)?,
        Event::IssueDone(d) => object_of(d, event)?,
        Event::Unknown(u) => u.fields.clone(),
    };
    if map.contains_key(KIND_FIELD) {
        return Err(reserved(event, KIND_FIELD));
    }
    map.insert(
        KIND_FIELD.to_string(),
        Value::String(event.kind_str().to_string()),
    );

    let line = canonicalize_json(&Value::Object(map));
    if line.contains('\n') {
        return Err(EncodeError::NewlineInRecord);
    }
    Ok(line)
}

/// Serialize an [`Event`] to a line with trailing newline.
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_line(event: &Event) -> Result<String, EncodeError> {
    let mut line = encode(event)?;
    line.push('\n');
    Ok(line)
}

/// Parse one ledger line into an [`Event`].
///
/// A trailing `\n` or `\r\n` is ignored.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing why the line is malformed.
pub fn decode(line: &str) -> Result<Event, DecodeError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let value: Value = serde_json::from_str(line).map_err(DecodeError::Json)?;
    let Value::Object(mut map) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let raw_kind = match map.remove(KIND_FIELD) {
        Some(Value::String(kind)) => kind,
        Some(_) => return Err(DecodeError::KindNotString),
        None => return Err(DecodeError::MissingKind),
    };

    let Ok(kind) = raw_kind.parse::<EventKind>() else {
        return Ok(Event::Unknown(UnknownEvent {
            kind: raw_kind,
            fields: map,
        }));
    };

    match kind {
        EventKind::Config => payload::<ConfigData>(kind, map).map(Event::Config),
        EventKind::Spec => payload::<SpecData>(kind, map).map(Event::Spec),
        EventKind::Task if map.contains_key(NAME_FIELD) => {
            payload::<TaskData>(kind, map).map(Event::Task)
        }
        EventKind::Task => payload::<TaskPatchData>(kind, map).map(Event::TaskPatch),
        EventKind::Done => payload::<MarkData>(kind, map).map(Event::Done),
        EventKind::Accept => payload::<MarkData>(kind, map).map(Event::Accept),
        EventKind::Reject => payload::<RejectData>(kind, map).map(Event::Reject),
        EventKind::Delete => payload::<DeleteData>(kind, map).map(Event::Delete),
        EventKind::Prioritize => payload::<PrioritizeData>(kind, map).map(Event::Prioritize),
        EventKind::Issue => payload::<IssueData>(kind, map).map(Event::Issue),
        EventKind::IssueDone => payload::<IssueDoneData>(kind, map).map(Event::IssueDone),
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn object_of<T: Serialize>(data: &T, event: &Event) -> Result<Map<String, Value>, EncodeError> {
    match serde_json::to_value(data)? {
        Value::Object(map) => Ok(map),
        _ => Err(EncodeError::NotAnObject(event.kind_str().to_string())),
    }
}

fn reserved(event: &Event, field: &'static str) -> EncodeError {
    EncodeError::ReservedField {
        kind: event.kind_str().to_string(),
        field,
    }
}

fn payload<T: DeserializeOwned>(kind: EventKind, map: Map<String, Value>) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(map)).map_err(|source| DecodeError::Payload { kind, source })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
