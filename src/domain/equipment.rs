//! Equipment tracked for a project

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patch::nullable;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EquipmentStatus {
    #[default]
    Pending,
    Ordered,
    Shipped,
    Received,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Equipment {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub description: String,
    pub model_number: Option<String>,
    pub quantity: i32,
    pub status: EquipmentStatus,
    pub ordered_at: Option<DateTime<Utc>>,
    pub expected_date: Option<NaiveDate>,
    pub received_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const EQUIPMENT_COLUMNS: &str = "id, bid_id, vendor_id, description, model_number, quantity, \
                                     status, ordered_at, expected_date, received_at, notes, \
                                     created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEquipmentRequest {
    pub description: String,
    #[serde(default)]
    pub vendor_id: Option<Uuid>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub status: EquipmentStatus,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

/// Partial equipment update; `null` clears the vendor, model, expected date
/// or notes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEquipmentRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub vendor_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub model_number: Option<Option<String>>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub status: Option<EquipmentStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub expected_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

/// Checks shared by create and update
pub fn validate_equipment(description: Option<&str>, quantity: Option<i32>) -> Result<(), String> {
    if let Some(d) = description {
        if d.trim().is_empty() {
            return Err("Equipment description is required".to_string());
        }
    }
    if let Some(q) = quantity {
        if q < 1 {
            return Err("Quantity must be at least 1".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_defaults_to_one() {
        let req: CreateEquipmentRequest =
            serde_json::from_str(r#"{"description": "RTU-1 rooftop unit"}"#).unwrap();
        assert_eq!(req.quantity, 1);
        assert_eq!(req.status, EquipmentStatus::Pending);
    }

    #[test]
    fn validation() {
        assert!(validate_equipment(Some("VAV box"), Some(4)).is_ok());
        assert!(validate_equipment(None, None).is_ok());
        assert!(validate_equipment(Some("  "), None).is_err());
        assert!(validate_equipment(None, Some(0)).is_err());
    }

    #[test]
    fn update_null_clears_and_absent_keeps() {
        let req: UpdateEquipmentRequest = serde_json::from_str(
            r#"{"vendor_id": null, "expected_date": "2026-11-20", "status": "ordered"}"#,
        )
        .unwrap();
        assert_eq!(req.vendor_id, Some(None));
        assert_eq!(req.expected_date, Some(NaiveDate::from_ymd_opt(2026, 11, 20)));
        assert_eq!(req.status, Some(EquipmentStatus::Ordered));
        assert_eq!(req.model_number, None);
        assert_eq!(req.notes, None);
    }
}
