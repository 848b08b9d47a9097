use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::error::CodecResult;
use crate::fidelity::Fidelity;

/// The in-memory form of one partition: item id to record.
pub type Partition<T> = BTreeMap<String, T>;

/// Encoding and decoding for one record family.
pub trait PartitionCodec {
    type Record: Clone + Send + Sync + 'static;

    /// Name used in logs and errors.
    const FAMILY: &'static str;

    /// Encode in the current compact form at the requested fidelity.
    fn encode(partition: &Partition<Self::Record>, fidelity: Fidelity) -> Value;

    /// Decode any supported historical shape, reporting why it failed.
    fn try_decode(raw: &Value) -> CodecResult<Partition<Self::Record>>;

    /// Decode any supported historical shape. Never fails: a payload that
    /// cannot be decoded yields an empty partition.
    fn decode(raw: &Value) -> Partition<Self::Record> {
        match Self::try_decode(raw) {
            Ok(partition) => partition,
            Err(error) => {
                warn!(family = Self::FAMILY, %error, "discarding undecodable partition");
                Partition::new()
            }
        }
    }
}
