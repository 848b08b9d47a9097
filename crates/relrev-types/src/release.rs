use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPlan {
    pub id: String,
    pub name: String,
    /// Percentage, 0-100.
    pub down_payment: f64,
    pub years: u32,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub includes_maintenance: bool,
    #[serde(default)]
    pub includes_club_fees: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDesignMedia {
    #[serde(default)]
    pub offer_gallery: Vec<String>,
    #[serde(default)]
    pub unit_gallery: Vec<String>,
    #[serde(default)]
    pub floor_plans: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDesign {
    pub id: String,
    pub name: String,
    pub beds: u32,
    /// Built-up area in square metres.
    pub bua: f64,
    #[serde(default)]
    pub media: UnitDesignMedia,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub price: f64,
    pub unit_design_id: String,
}

/// A release under review.
///
/// Saved as a whole record. `created_at` is filled on first save and kept
/// across every later save of the same id. Fields this version does not
/// know about are carried through untouched in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: String,
    pub compound_name: String,
    pub release_name: String,
    pub release_date: String,
    #[serde(default)]
    pub payment_plans: Vec<PaymentPlan>,
    #[serde(default)]
    pub unit_designs: Vec<UnitDesign>,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Release {
    pub fn new(
        id: impl Into<String>,
        compound_name: impl Into<String>,
        release_name: impl Into<String>,
        release_date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            compound_name: compound_name.into(),
            release_name: release_name.into(),
            release_date: release_date.into(),
            payment_plans: Vec::new(),
            unit_designs: Vec::new(),
            units: Vec::new(),
            created_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Sort key for newest-first listings; unsaved releases sort last.
    pub fn created_sort_key(&self) -> Timestamp {
        self.created_at.unwrap_or_else(Timestamp::epoch)
    }

    /// Display name of an item, falling back to its id.
    pub fn item_name(&self, item_type: crate::ItemType, item_id: &str) -> String {
        let found = match item_type {
            crate::ItemType::PaymentPlan => self
                .payment_plans
                .iter()
                .find(|p| p.id == item_id)
                .map(|p| p.name.clone()),
            crate::ItemType::UnitDesign => self
                .unit_designs
                .iter()
                .find(|d| d.id == item_id)
                .map(|d| d.name.clone()),
        };
        found.unwrap_or_else(|| item_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemType;

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let raw = serde_json::json!({
            "id": "R1",
            "compoundName": "Palm Hills",
            "releaseName": "Phase 2",
            "releaseDate": "2024-05-01",
            "paymentPlans": [],
            "unitDesigns": [],
            "units": [],
            "createdAt": "2024-04-01T08:00:00.000Z",
            "notes": "launch event"
        });
        let release: Release = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(release.extra["notes"], "launch event");
        assert_eq!(serde_json::to_value(&release).unwrap(), raw);
    }

    #[test]
    fn missing_created_at_sorts_at_epoch() {
        let release = Release::new("R1", "c", "r", "2024-01-01");
        assert_eq!(release.created_sort_key(), Timestamp::epoch());
        let json = serde_json::to_value(&release).unwrap();
        assert!(json.get("createdAt").is_none());
    }

    #[test]
    fn item_name_falls_back_to_id() {
        let mut release = Release::new("R1", "c", "r", "2024-01-01");
        release.unit_designs.push(UnitDesign {
            id: "U1".into(),
            name: "Villa A".into(),
            beds: 4,
            bua: 320.0,
            media: UnitDesignMedia::default(),
            preview_url: String::new(),
            amenities: None,
        });
        assert_eq!(release.item_name(ItemType::UnitDesign, "U1"), "Villa A");
        assert_eq!(release.item_name(ItemType::PaymentPlan, "P9"), "P9");
    }
}
