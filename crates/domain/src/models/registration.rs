//! Registration domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::normalize_optional;
use validator::Validate;

/// Maximum length of free-text registration fields.
pub const MAX_TEXT_LENGTH: u64 = 200;

/// Maximum length of the phone field.
pub const MAX_PHONE_LENGTH: u64 = 40;

/// One attendee's reservation for the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: i64,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub organization: Option<String>,
    pub sponsor: Option<String>,
    pub attendance_confirmed: bool,
    pub checked_in: bool,
    pub created_at: DateTime<Utc>,
}

/// Public registration form as submitted by an attendee.
///
/// Field aliases accept the form names used by the event landing page.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    #[serde(default, alias = "nombre")]
    #[validate(length(max = 200, message = "Full name must be at most 200 characters"))]
    pub full_name: String,

    #[serde(default, alias = "telefono")]
    #[validate(length(max = 40, message = "Phone must be at most 40 characters"))]
    pub phone: String,

    #[serde(default, alias = "direccion")]
    #[validate(length(max = 200, message = "Address must be at most 200 characters"))]
    pub address: String,

    #[serde(default, alias = "iglesia")]
    #[validate(length(max = 200, message = "Organization must be at most 200 characters"))]
    pub organization: Option<String>,

    #[serde(default, alias = "pastor")]
    #[validate(length(max = 200, message = "Sponsor must be at most 200 characters"))]
    pub sponsor: Option<String>,

    #[serde(default, alias = "confirmado")]
    pub attendance_confirmed: bool,
}

impl RegistrationForm {
    /// Trims every field; blank optional fields become `None`.
    pub fn normalized(&self) -> NewRegistration {
        NewRegistration {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            organization: normalize_optional(self.organization.clone()),
            sponsor: normalize_optional(self.sponsor.clone()),
        }
    }
}

/// A validated registration ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub organization: Option<String>,
    pub sponsor: Option<String>,
}

/// Administrator edit of an existing registration.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRegistrationRequest {
    #[validate(length(min = 1, max = 200, message = "Full name must be between 1 and 200 characters"))]
    pub full_name: Option<String>,

    #[validate(length(min = 1, max = 40, message = "Phone must be between 1 and 40 characters"))]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Address must be between 1 and 200 characters"))]
    pub address: Option<String>,

    /// An empty string clears the value.
    #[validate(length(max = 200, message = "Organization must be at most 200 characters"))]
    pub organization: Option<String>,

    /// An empty string clears the value.
    #[validate(length(max = 200, message = "Sponsor must be at most 200 characters"))]
    pub sponsor: Option<String>,

    pub attendance_confirmed: Option<bool>,
}

impl UpdateRegistrationRequest {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.organization.is_none()
            && self.sponsor.is_none()
            && self.attendance_confirmed.is_none()
    }

    /// Applies the edit on top of an existing registration.
    pub fn apply_to(&self, current: &Registration) -> Registration {
        let mut updated = current.clone();
        if let Some(name) = &self.full_name {
            updated.full_name = name.trim().to_string();
        }
        if let Some(phone) = &self.phone {
            updated.phone = phone.trim().to_string();
        }
        if let Some(address) = &self.address {
            updated.address = address.trim().to_string();
        }
        if self.organization.is_some() {
            updated.organization = normalize_optional(self.organization.clone());
        }
        if self.sponsor.is_some() {
            updated.sponsor = normalize_optional(self.sponsor.clone());
        }
        if let Some(confirmed) = self.attendance_confirmed {
            updated.attendance_confirmed = confirmed;
        }
        updated
    }
}

/// Explicit check-in flag change from the dashboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCheckInRequest {
    pub checked_in: bool,
}

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStats {
    pub total: i64,
    pub checked_in: i64,
    pub capacity: i64,
    pub available: i64,
    pub registration_enabled: bool,
}

impl RegistrationStats {
    pub fn new(total: i64, checked_in: i64, capacity: i64, registration_enabled: bool) -> Self {
        Self {
            total,
            checked_in,
            capacity,
            available: (capacity - total).max(0),
            registration_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registration() -> Registration {
        Registration {
            id: 7,
            full_name: "Ana Lopez".to_string(),
            phone: "555-1111".to_string(),
            address: "Calle 1".to_string(),
            organization: Some("Iglesia Central".to_string()),
            sponsor: None,
            attendance_confirmed: true,
            checked_in: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_form_accepts_landing_page_field_names() {
        let json = r#"{
            "nombre": "Ana Lopez",
            "telefono": "555-1111",
            "direccion": "Calle 1",
            "iglesia": "Iglesia Central",
            "pastor": "",
            "confirmado": true
        }"#;
        let form: RegistrationForm = serde_json::from_str(json).unwrap();
        assert_eq!(form.full_name, "Ana Lopez");
        assert_eq!(form.phone, "555-1111");
        assert!(form.attendance_confirmed);
    }

    #[test]
    fn test_form_missing_fields_default_to_empty() {
        let form: RegistrationForm = serde_json::from_str(r#"{"fullName": "Ana"}"#).unwrap();
        assert_eq!(form.phone, "");
        assert!(!form.attendance_confirmed);
    }

    #[test]
    fn test_form_normalized_trims_and_drops_blank_optionals() {
        let form = RegistrationForm {
            full_name: "  Ana Lopez ".to_string(),
            phone: " 555-1111".to_string(),
            address: "Calle 1 ".to_string(),
            organization: Some("   ".to_string()),
            sponsor: Some(" Pastor Ruiz ".to_string()),
            attendance_confirmed: true,
        };
        let new = form.normalized();
        assert_eq!(new.full_name, "Ana Lopez");
        assert_eq!(new.phone, "555-1111");
        assert_eq!(new.organization, None);
        assert_eq!(new.sponsor, Some("Pastor Ruiz".to_string()));
    }

    #[test]
    fn test_form_length_validation() {
        let form = RegistrationForm {
            full_name: "x".repeat(201),
            phone: "555-1111".to_string(),
            address: "Calle 1".to_string(),
            attendance_confirmed: true,
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("full_name"));
    }

    #[test]
    fn test_form_phone_is_free_text_up_to_limit() {
        let mut form = RegistrationForm {
            full_name: "Ana".to_string(),
            phone: "55-1111".to_string(),
            address: "Calle 1".to_string(),
            attendance_confirmed: true,
            ..Default::default()
        };
        assert!(form.validate().is_ok());

        form.phone = "555-1111 ext 2".to_string();
        assert!(form.validate().is_ok());

        form.phone = "5".repeat(40);
        assert!(form.validate().is_ok());

        form.phone = "5".repeat(41);
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));
    }

    #[test]
    fn test_update_apply_to() {
        let current = sample_registration();
        let update = UpdateRegistrationRequest {
            full_name: Some(" Ana M. Lopez ".to_string()),
            organization: Some(String::new()),
            ..Default::default()
        };
        let updated = update.apply_to(&current);
        assert_eq!(updated.full_name, "Ana M. Lopez");
        assert_eq!(updated.organization, None);
        assert_eq!(updated.phone, current.phone);
        assert_eq!(updated.id, current.id);
        assert_eq!(updated.created_at, current.created_at);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(UpdateRegistrationRequest::default().is_empty());
        let update = UpdateRegistrationRequest {
            attendance_confirmed: Some(false),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_stats_available_never_negative() {
        let stats = RegistrationStats::new(1502, 10, 1500, false);
        assert_eq!(stats.available, 0);
        let stats = RegistrationStats::new(1000, 10, 1500, true);
        assert_eq!(stats.available, 500);
    }

    #[test]
    fn test_registration_serializes_camel_case() {
        let json = serde_json::to_string(&sample_registration()).unwrap();
        assert!(json.contains("\"fullName\":\"Ana Lopez\""));
        assert!(json.contains("\"checkedIn\":false"));
    }
}
