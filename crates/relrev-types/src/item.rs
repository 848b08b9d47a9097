use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Discriminator for the two kinds of reviewable item in a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "payment-plan")]
    PaymentPlan,
    #[serde(rename = "unit-design")]
    UnitDesign,
}

impl ItemType {
    pub const ALL: [ItemType; 2] = [ItemType::PaymentPlan, ItemType::UnitDesign];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentPlan => "payment-plan",
            Self::UnitDesign => "unit-design",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment-plan" => Ok(Self::PaymentPlan),
            "unit-design" => Ok(Self::UnitDesign),
            other => Err(TypeError::UnknownItemType(other.to_string())),
        }
    }
}

/// Which per-item record family a partition holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionFamily {
    Reviewed,
    Issues,
}

impl PartitionFamily {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Reviewed => "reviewed",
            Self::Issues => "issues",
        }
    }
}

/// Composite key partitioning per-item records by release and item type.
///
/// Renders as `reviewed-<releaseId>-<itemType>` or
/// `issues-<releaseId>-<itemType>`. Release ids may themselves contain
/// dashes, so parsing anchors on the known prefix and item-type suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub family: PartitionFamily,
    pub release_id: String,
    pub item_type: ItemType,
}

impl PartitionKey {
    pub fn reviewed(release_id: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            family: PartitionFamily::Reviewed,
            release_id: release_id.into(),
            item_type,
        }
    }

    pub fn issues(release_id: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            family: PartitionFamily::Issues,
            release_id: release_id.into(),
            item_type,
        }
    }

    /// Every partition key a release can own.
    pub fn all_for_release(release_id: &str) -> Vec<Self> {
        ItemType::ALL
            .iter()
            .flat_map(|&item_type| {
                [
                    Self::reviewed(release_id, item_type),
                    Self::issues(release_id, item_type),
                ]
            })
            .collect()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.family.prefix(),
            self.release_id,
            self.item_type
        )
    }
}

impl FromStr for PartitionKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidPartitionKey(s.to_string());

        let (family, rest) = [PartitionFamily::Reviewed, PartitionFamily::Issues]
            .into_iter()
            .find_map(|family| {
                s.strip_prefix(family.prefix())
                    .and_then(|r| r.strip_prefix('-'))
                    .map(|r| (family, r))
            })
            .ok_or_else(invalid)?;

        let (release_id, item_type) = ItemType::ALL
            .into_iter()
            .find_map(|item_type| {
                rest.strip_suffix(item_type.as_str())
                    .and_then(|r| r.strip_suffix('-'))
                    .map(|r| (r, item_type))
            })
            .ok_or_else(invalid)?;

        if release_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            family,
            release_id: release_id.to_string(),
            item_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_literal_composite_keys() {
        assert_eq!(
            PartitionKey::reviewed("R1", ItemType::UnitDesign).to_string(),
            "reviewed-R1-unit-design"
        );
        assert_eq!(
            PartitionKey::issues("R1", ItemType::PaymentPlan).to_string(),
            "issues-R1-payment-plan"
        );
    }

    #[test]
    fn parses_release_ids_containing_dashes() {
        let key: PartitionKey = "issues-rel-2024-q1-unit-design".parse().unwrap();
        assert_eq!(key.family, PartitionFamily::Issues);
        assert_eq!(key.release_id, "rel-2024-q1");
        assert_eq!(key.item_type, ItemType::UnitDesign);
    }

    #[test]
    fn parse_rejects_unknown_shapes() {
        assert!("reviewed--unit-design".parse::<PartitionKey>().is_err());
        assert!("notes-R1-unit-design".parse::<PartitionKey>().is_err());
        assert!("reviewed-R1-villa".parse::<PartitionKey>().is_err());
    }

    #[test]
    fn all_for_release_covers_both_families_and_types() {
        let keys = PartitionKey::all_for_release("R9");
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&PartitionKey::issues("R9", ItemType::PaymentPlan)));
        assert!(keys.contains(&PartitionKey::reviewed("R9", ItemType::UnitDesign)));
    }

    #[test]
    fn item_type_serde_uses_kebab_names() {
        let json = serde_json::to_string(&ItemType::PaymentPlan).unwrap();
        assert_eq!(json, "\"payment-plan\"");
        assert_eq!("unit-design".parse::<ItemType>().unwrap(), ItemType::UnitDesign);
    }

    proptest::proptest! {
        #[test]
        fn display_parse_roundtrip(
            release in "[A-Za-z0-9][A-Za-z0-9-]{0,24}",
            issues in proptest::bool::ANY,
            unit in proptest::bool::ANY,
        ) {
            let item_type = if unit { ItemType::UnitDesign } else { ItemType::PaymentPlan };
            let key = if issues {
                PartitionKey::issues(release, item_type)
            } else {
                PartitionKey::reviewed(release, item_type)
            };
            proptest::prop_assert_eq!(key.to_string().parse::<PartitionKey>().unwrap(), key);
        }
    }
}
