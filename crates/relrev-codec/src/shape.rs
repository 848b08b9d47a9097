use std::fmt;

use relrev_types::Timestamp;
use serde_json::Value;

use crate::error::{CodecError, CodecResult};

/// The three historical shapes of a stored partition, plus the empty one.
///
/// ```text
/// CompactTuples  [["U1", ["u1", "Alice", "2024-..."]], ...]        (marks)
///                [["U1", [["text", null, null, "2024-...", "u1", "Alice"]]], ...]  (issues)
/// FullObjects    [["U1", {"itemId": "U1", "userId": "u1", ...}], ...]
/// LegacyFlatIds  ["U1", "U2", ...]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireShape {
    Empty,
    CompactTuples,
    FullObjects,
    LegacyFlatIds,
}

impl fmt::Display for WireShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::CompactTuples => "compact tuples",
            Self::FullObjects => "full objects",
            Self::LegacyFlatIds => "legacy flat ids",
        })
    }
}

/// Classify a review-mark payload by its first element.
pub fn detect_marks(raw: &Value) -> CodecResult<WireShape> {
    let Some(first) = first_element(raw)? else {
        return Ok(WireShape::Empty);
    };
    if first.is_string() {
        return Ok(WireShape::LegacyFlatIds);
    }
    match keyed_pair(first)? {
        Value::Array(_) => Ok(WireShape::CompactTuples),
        Value::Object(_) => Ok(WireShape::FullObjects),
        other => Err(CodecError::UnrecognizedShape(format!(
            "mark record is {}",
            json_kind(other)
        ))),
    }
}

/// Classify an issue payload by the first issue it holds.
///
/// Items with empty lists carry no shape and are skipped; a payload whose
/// lists are all empty reads as compact.
pub fn detect_issues(raw: &Value) -> CodecResult<WireShape> {
    let Some(first) = first_element(raw)? else {
        return Ok(WireShape::Empty);
    };
    if first.is_string() {
        return Ok(WireShape::LegacyFlatIds);
    }
    let entries = raw.as_array().map(Vec::as_slice).unwrap_or_default();
    for entry in entries {
        let list = keyed_pair(entry)?
            .as_array()
            .ok_or_else(|| CodecError::UnrecognizedShape("issue list is not an array".into()))?;
        match list.first() {
            None => continue,
            Some(Value::Array(_)) => return Ok(WireShape::CompactTuples),
            Some(Value::Object(_)) => return Ok(WireShape::FullObjects),
            Some(other) => {
                return Err(CodecError::UnrecognizedShape(format!(
                    "issue record is {}",
                    json_kind(other)
                )))
            }
        }
    }
    Ok(WireShape::CompactTuples)
}

fn first_element(raw: &Value) -> CodecResult<Option<&Value>> {
    raw.as_array()
        .map(|items| items.first())
        .ok_or(CodecError::NotAnArray(json_kind(raw)))
}

/// The record half of an `[itemId, record]` pair.
fn keyed_pair(entry: &Value) -> CodecResult<&Value> {
    match entry.as_array().map(Vec::as_slice) {
        Some([Value::String(_), record]) => Ok(record),
        _ => Err(CodecError::UnrecognizedShape(format!(
            "expected [itemId, record], found {}",
            json_kind(entry)
        ))),
    }
}

/// Split `[itemId, record]`, reporting problems against `index`.
pub(crate) fn split_pair(index: usize, entry: &Value) -> CodecResult<(&str, &Value)> {
    match entry.as_array().map(Vec::as_slice) {
        Some([Value::String(id), record]) => Ok((id.as_str(), record)),
        _ => Err(CodecError::entry(index, "expected [itemId, record]")),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A string slot that older writers may have left null or missing.
pub(crate) fn opt_string(index: usize, field: &str, value: Option<&Value>) -> CodecResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CodecError::entry(
            index,
            format!("{field} is {}", json_kind(other)),
        )),
    }
}

pub(crate) fn opt_timestamp(
    index: usize,
    value: Option<&Value>,
) -> CodecResult<Option<Timestamp>> {
    opt_string(index, "timestamp", value)?
        .map(|s| Timestamp::parse(&s).map_err(|e| CodecError::entry(index, e.to_string())))
        .transpose()
}

/// Attachment size; anything that is not a non-negative number reads as absent.
pub(crate) fn opt_size(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}
