use relrev_types::{ReviewMark, Timestamp, UNKNOWN_USER_ID, UNKNOWN_USER_NAME};
use serde_json::{json, Value};

use crate::error::{CodecError, CodecResult};
use crate::fidelity::Fidelity;
use crate::partition::{Partition, PartitionCodec};
use crate::shape::{detect_marks, opt_string, opt_timestamp, split_pair, WireShape};

/// Codec for review-mark partitions.
///
/// Current form: `[[itemId, [userId, userName, timestamp]], ...]`.
/// A mark has no optional detail, so every fidelity encodes identically.
pub struct MarkCodec;

impl PartitionCodec for MarkCodec {
    type Record = ReviewMark;

    const FAMILY: &'static str = "reviewed";

    fn encode(partition: &Partition<ReviewMark>, _fidelity: Fidelity) -> Value {
        Value::Array(
            partition
                .iter()
                .map(|(item_id, mark)| {
                    json!([item_id, [mark.user_id, mark.user_name, mark.timestamp]])
                })
                .collect(),
        )
    }

    fn try_decode(raw: &Value) -> CodecResult<Partition<ReviewMark>> {
        let shape = detect_marks(raw)?;
        let entries = raw.as_array().map(Vec::as_slice).unwrap_or_default();
        let now = Timestamp::now();
        let mut partition = Partition::new();

        for (index, entry) in entries.iter().enumerate() {
            let mark = match shape {
                WireShape::Empty => break,
                WireShape::LegacyFlatIds => {
                    let id = entry
                        .as_str()
                        .ok_or_else(|| CodecError::entry(index, "expected item id string"))?;
                    ReviewMark::unattributed(id, now)
                }
                WireShape::CompactTuples => {
                    let (item_id, record) = split_pair(index, entry)?;
                    let fields = record
                        .as_array()
                        .ok_or_else(|| CodecError::entry(index, "expected [userId, userName, timestamp]"))?;
                    attributed(index, item_id, fields.first(), fields.get(1), fields.get(2), now)?
                }
                WireShape::FullObjects => {
                    let (item_id, record) = split_pair(index, entry)?;
                    let fields = record
                        .as_object()
                        .ok_or_else(|| CodecError::entry(index, "expected mark object"))?;
                    attributed(
                        index,
                        item_id,
                        fields.get("userId"),
                        fields.get("userName"),
                        fields.get("timestamp"),
                        now,
                    )?
                }
            };
            partition.insert(mark.item_id.clone(), mark);
        }

        Ok(partition)
    }
}

fn attributed(
    index: usize,
    item_id: &str,
    user_id: Option<&Value>,
    user_name: Option<&Value>,
    timestamp: Option<&Value>,
    now: Timestamp,
) -> CodecResult<ReviewMark> {
    Ok(ReviewMark {
        item_id: item_id.to_string(),
        user_id: opt_string(index, "userId", user_id)?.unwrap_or_else(|| UNKNOWN_USER_ID.into()),
        user_name: opt_string(index, "userName", user_name)?
            .unwrap_or_else(|| UNKNOWN_USER_NAME.into()),
        timestamp: opt_timestamp(index, timestamp)?.unwrap_or(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relrev_types::Actor;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms).unwrap()
    }

    fn sample() -> Partition<ReviewMark> {
        let mut p = Partition::new();
        p.insert("U1".into(), ReviewMark::new("U1", &Actor::new("u1", "Alice"), ts(1_000)));
        p.insert("U2".into(), ReviewMark::new("U2", &Actor::new("u2", "Bob"), ts(2_000)));
        p
    }

    #[test]
    fn encodes_compact_tuples() {
        let encoded = MarkCodec::encode(&sample(), Fidelity::Full);
        assert_eq!(
            encoded[0],
            json!(["U1", ["u1", "Alice", "1970-01-01T00:00:01.000Z"]])
        );
    }

    #[test]
    fn fidelity_does_not_change_marks() {
        let p = sample();
        let full = MarkCodec::encode(&p, Fidelity::Full);
        for step in Fidelity::ladder(500) {
            assert_eq!(MarkCodec::encode(&p, step), full);
        }
    }

    #[test]
    fn compact_roundtrip_preserves_attribution() {
        let p = sample();
        let decoded = MarkCodec::try_decode(&MarkCodec::encode(&p, Fidelity::Full)).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn decodes_full_object_form() {
        let raw = json!([
            ["U1", {"itemId": "U1", "userId": "u1", "userName": "Alice", "timestamp": "1970-01-01T00:00:01.000Z"}]
        ]);
        let decoded = MarkCodec::try_decode(&raw).unwrap();
        assert_eq!(decoded, {
            let mut p = sample();
            p.remove("U2");
            p
        });
    }

    #[test]
    fn decodes_legacy_flat_ids_with_sentinels() {
        let before = Timestamp::now();
        let decoded = MarkCodec::try_decode(&json!(["U1", "U2", "U3"])).unwrap();
        assert_eq!(decoded.len(), 3);
        for (id, mark) in &decoded {
            assert_eq!(&mark.item_id, id);
            assert_eq!(mark.user_id, "unknown");
            assert_eq!(mark.user_name, "Unknown User");
            assert!(mark.timestamp >= before);
        }
    }

    #[test]
    fn duplicate_legacy_ids_collapse_to_one_mark() {
        let decoded = MarkCodec::try_decode(&json!(["U1", "U1"])).unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn missing_attribution_in_compact_defaults_to_unknown() {
        let decoded = MarkCodec::try_decode(&json!([["U1", [null, null, null]]])).unwrap();
        let mark = &decoded["U1"];
        assert_eq!(mark.user_id, UNKNOWN_USER_ID);
        assert_eq!(mark.user_name, UNKNOWN_USER_NAME);
    }

    #[test]
    fn malformed_payloads_fail_open() {
        for raw in [
            json!("U1,U2"),
            json!({"U1": true}),
            json!([["U1", ["u1", "Alice", "not a time"]]]),
            json!(["U1", 42]),
            json!([["U1", ["u1", "Alice", "1970-01-01T00:00:01.000Z"]], "U2"]),
        ] {
            assert!(MarkCodec::try_decode(&raw).is_err(), "{raw}");
            assert!(MarkCodec::decode(&raw).is_empty(), "{raw}");
        }
    }

    #[test]
    fn empty_payload_is_empty_partition() {
        assert!(MarkCodec::try_decode(&json!([])).unwrap().is_empty());
    }
}
