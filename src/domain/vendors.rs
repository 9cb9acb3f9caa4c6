//! Vendor directory types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::patch::nullable;

/// Vendor entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vendor {
    pub id: Uuid,
    pub company_name: String,
    pub specialty: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub is_priority: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const VENDOR_COLUMNS: &str = "id, company_name, specialty, contact_person, email, phone, \
                                  address, notes, is_priority, created_at, updated_at";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateVendorRequest {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub specialty: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Email address is not valid"))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_priority: bool,
}

/// Partial vendor update. Absent fields are kept; `null` or a blank string
/// clears an optional one.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateVendorRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 120))]
    pub specialty: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub contact_person: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(email(message = "Email address is not valid"))]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 40))]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub is_priority: Option<bool>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl CreateVendorRequest {
    /// Trims text, drops blank fields and lowercases the email. Run before
    /// validating so a blank email reads as no email.
    pub fn normalized(self) -> Self {
        Self {
            company_name: self.company_name.trim().to_string(),
            specialty: clean(self.specialty),
            contact_person: clean(self.contact_person),
            email: clean(self.email).map(|e| e.to_lowercase()),
            phone: clean(self.phone),
            address: clean(self.address),
            notes: clean(self.notes),
            is_priority: self.is_priority,
        }
    }
}

impl UpdateVendorRequest {
    /// Same cleanup as on create; a blank optional field becomes a clear
    pub fn normalized(self) -> Self {
        Self {
            company_name: self.company_name.map(|n| n.trim().to_string()),
            specialty: self.specialty.map(clean),
            contact_person: self.contact_person.map(clean),
            email: self.email.map(|e| clean(e).map(|e| e.to_lowercase())),
            phone: self.phone.map(clean),
            address: self.address.map(clean),
            notes: self.notes.map(clean),
            is_priority: self.is_priority,
        }
    }
}

/// Query params for listing vendors
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl Vendor {
    /// Case-insensitive match on company, contact and specialty
    pub fn matches(&self, query: &VendorQuery) -> bool {
        if let Some(specialty) = query.specialty.as_deref().filter(|s| !s.trim().is_empty()) {
            let matches_specialty = self
                .specialty
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(specialty.trim()));
            if !matches_specialty {
                return false;
            }
        }

        match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [
                    Some(self.company_name.as_str()),
                    self.contact_person.as_deref(),
                    self.specialty.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: Option<&str>) -> CreateVendorRequest {
        CreateVendorRequest {
            company_name: "Northside Sheet Metal".into(),
            specialty: Some("Ductwork".into()),
            contact_person: None,
            email: email.map(String::from),
            phone: None,
            address: None,
            notes: None,
            is_priority: false,
        }
    }

    fn vendor() -> Vendor {
        let now = Utc::now();
        Vendor {
            id: Uuid::new_v4(),
            company_name: "Northside Sheet Metal".into(),
            specialty: Some("Ductwork".into()),
            contact_person: Some("Dana Reyes".into()),
            email: None,
            phone: None,
            address: None,
            notes: None,
            is_priority: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn rejects_malformed_email() {
        assert!(request(Some("estimating@northside.test")).validate().is_ok());
        assert!(request(None).validate().is_ok());
        assert!(request(Some("not-an-email")).validate().is_err());
        assert!(request(Some("a@")).validate().is_err());
    }

    #[test]
    fn rejects_blank_company_name() {
        let mut req = request(None);
        req.company_name = "   ".into();
        assert!(req.normalized().validate().is_err());
    }

    #[test]
    fn blank_email_is_no_email() {
        let req = request(Some("  ")).normalized();
        assert!(req.validate().is_ok());
        assert_eq!(req.email, None);

        let req = request(Some(" Estimating@Northside.TEST ")).normalized();
        assert!(req.validate().is_ok());
        assert_eq!(req.email.as_deref(), Some("estimating@northside.test"));
    }

    #[test]
    fn update_blank_or_null_clears_and_absent_keeps() {
        let req: UpdateVendorRequest = serde_json::from_value(serde_json::json!({
            "email": "",
            "phone": null,
            "specialty": " Controls "
        }))
        .unwrap();
        let req = req.normalized();
        assert!(req.validate().is_ok());
        assert_eq!(req.email, Some(None));
        assert_eq!(req.phone, Some(None));
        assert_eq!(req.specialty, Some(Some("Controls".to_string())));
        assert_eq!(req.address, None);
        assert_eq!(req.notes, None);

        let bad: UpdateVendorRequest =
            serde_json::from_value(serde_json::json!({ "email": "nope" })).unwrap();
        assert!(bad.normalized().validate().is_err());
    }

    #[test]
    fn search_matches_company_contact_or_specialty() {
        let v = vendor();
        let by = |s: &str| VendorQuery {
            search: Some(s.into()),
            ..Default::default()
        };
        assert!(v.matches(&by("northside")));
        assert!(v.matches(&by("REYES")));
        assert!(v.matches(&by("duct")));
        assert!(!v.matches(&by("controls")));
        assert!(v.matches(&VendorQuery::default()));
    }

    #[test]
    fn specialty_filter_is_exact() {
        let v = vendor();
        let q = VendorQuery {
            specialty: Some("ductwork".into()),
            ..Default::default()
        };
        assert!(v.matches(&q));
        let q = VendorQuery {
            specialty: Some("Duct".into()),
            ..Default::default()
        };
        assert!(!v.matches(&q));
    }
}
