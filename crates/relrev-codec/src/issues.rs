use relrev_types::{Issue, Timestamp, UNKNOWN_USER_ID, UNKNOWN_USER_NAME};
use serde_json::{json, Map, Value};

use crate::error::{CodecError, CodecResult};
use crate::fidelity::{truncate_chars, Fidelity};
use crate::partition::{Partition, PartitionCodec};
use crate::shape::{detect_issues, opt_size, opt_string, opt_timestamp, split_pair, WireShape};

/// Codec for issue-history partitions.
///
/// Current form: `[[itemId, [[text, fileName, fileSize, timestamp, userId, userName], ...]], ...]`.
/// Issue ids are never taken from the payload: every shape re-derives them
/// from content, so an issue keeps the same id whichever form it was read
/// from.
pub struct IssueCodec;

impl PartitionCodec for IssueCodec {
    type Record = Vec<Issue>;

    const FAMILY: &'static str = "issues";

    fn encode(partition: &Partition<Vec<Issue>>, fidelity: Fidelity) -> Value {
        Value::Array(
            partition
                .iter()
                .map(|(item_id, issues)| {
                    let kept = if fidelity.keeps_history() {
                        issues.as_slice()
                    } else {
                        &issues[issues.len().saturating_sub(1)..]
                    };
                    let tuples: Vec<Value> =
                        kept.iter().map(|issue| encode_issue(issue, fidelity)).collect();
                    json!([item_id, tuples])
                })
                .collect(),
        )
    }

    fn try_decode(raw: &Value) -> CodecResult<Partition<Vec<Issue>>> {
        let shape = detect_issues(raw)?;
        let entries = raw.as_array().map(Vec::as_slice).unwrap_or_default();
        let now = Timestamp::now();
        let mut partition = Partition::new();

        for (index, entry) in entries.iter().enumerate() {
            if shape == WireShape::LegacyFlatIds {
                return Err(CodecError::UnsupportedShape {
                    family: Self::FAMILY,
                    shape,
                });
            }
            let (item_id, record) = split_pair(index, entry)?;
            let list = record
                .as_array()
                .ok_or_else(|| CodecError::entry(index, "expected issue list"))?;

            let issues = list
                .iter()
                .map(|item| match (shape, item) {
                    (WireShape::FullObjects, Value::Object(fields)) => {
                        decode_object(index, fields, now)
                    }
                    (WireShape::CompactTuples, Value::Array(fields)) => {
                        decode_tuple(index, fields, now)
                    }
                    _ => Err(CodecError::entry(index, format!("issue does not match {shape}"))),
                })
                .collect::<CodecResult<Vec<_>>>()?;

            if !issues.is_empty() {
                partition.insert(item_id.to_string(), issues);
            }
        }

        Ok(partition)
    }
}

fn encode_issue(issue: &Issue, fidelity: Fidelity) -> Value {
    let text = match fidelity.text_limit() {
        Some(limit) => truncate_chars(&issue.text, limit),
        None => issue.text.clone(),
    };
    let (file_name, file_size) = if fidelity.keeps_attachments() {
        (issue.file_name.clone(), issue.file_size)
    } else {
        (None, None)
    };
    json!([
        text,
        file_name,
        file_size,
        issue.timestamp,
        issue.user_id,
        issue.user_name
    ])
}

fn decode_tuple(index: usize, fields: &[Value], now: Timestamp) -> CodecResult<Issue> {
    build(
        index,
        fields.first(),
        fields.get(1),
        fields.get(2),
        fields.get(3),
        fields.get(4),
        fields.get(5),
        now,
    )
}

fn decode_object(index: usize, fields: &Map<String, Value>, now: Timestamp) -> CodecResult<Issue> {
    build(
        index,
        fields.get("text"),
        fields.get("fileName"),
        fields.get("fileSize"),
        fields.get("timestamp"),
        fields.get("userId"),
        fields.get("userName"),
        now,
    )
}

#[allow(clippy::too_many_arguments)]
fn build(
    index: usize,
    text: Option<&Value>,
    file_name: Option<&Value>,
    file_size: Option<&Value>,
    timestamp: Option<&Value>,
    user_id: Option<&Value>,
    user_name: Option<&Value>,
    now: Timestamp,
) -> CodecResult<Issue> {
    let text = opt_string(index, "text", text)?.unwrap_or_default();
    let timestamp = opt_timestamp(index, timestamp)?.unwrap_or(now);
    let user_id = opt_string(index, "userId", user_id)?.unwrap_or_else(|| UNKNOWN_USER_ID.into());
    let id = Issue::derive_id(&timestamp, &user_id, &text);
    Ok(Issue {
        id,
        text,
        file_name: opt_string(index, "fileName", file_name)?.filter(|name| !name.is_empty()),
        file_size: opt_size(file_size),
        timestamp,
        user_id,
        user_name: opt_string(index, "userName", user_name)?
            .unwrap_or_else(|| UNKNOWN_USER_NAME.into()),
    })
}
