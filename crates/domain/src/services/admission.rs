//! Admission controller for public registrations.
//!
//! A submission passes through an ordered list of rules; the first failing
//! rule decides the outcome and nothing is written. Form rules run before any
//! store access. Store rules run against a snapshot of the event settings
//! taken once per submission.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

use super::store::{bounded, InsertOutcome, RegistrationStore, SettingsStore, StoreError};
use crate::models::registration::{NewRegistration, Registration, RegistrationForm};

/// Required form inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    FullName,
    Phone,
    Address,
    AttendanceConfirmation,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredField::FullName => write!(f, "fullName"),
            RequiredField::Phone => write!(f, "phone"),
            RequiredField::Address => write!(f, "address"),
            RequiredField::AttendanceConfirmation => write!(f, "attendanceConfirmed"),
        }
    }
}

/// Why a submission was not admitted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Required field is empty: {0}")]
    EmptyRequiredField(RequiredField),

    #[error("Invalid {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Registration is currently closed")]
    RegistrationClosed,

    #[error("The event has reached its maximum capacity")]
    CapacityReached,

    #[error("This phone number is already registered")]
    DuplicatePhone,

    #[error("The registration store did not respond in time")]
    StoreTimeout,

    #[error(transparent)]
    Store(StoreError),
}

impl AdmissionError {
    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::EmptyRequiredField(_) => "empty_required_field",
            AdmissionError::InvalidField { .. } => "validation_error",
            AdmissionError::RegistrationClosed => "registration_closed",
            AdmissionError::CapacityReached => "capacity_reached",
            AdmissionError::DuplicatePhone => "duplicate_phone",
            AdmissionError::StoreTimeout => "store_timeout",
            AdmissionError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(_) => AdmissionError::StoreTimeout,
            other => AdmissionError::Store(other),
        }
    }
}

/// A rule that inspects only the submitted form.
pub trait FormRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, form: &RegistrationForm) -> Result<(), AdmissionError>;
}

/// Inputs available to store-backed rules.
pub struct AdmissionContext<'a> {
    pub registration: &'a NewRegistration,
    /// Value of the registration switch read at the start of this submission.
    pub registration_enabled: bool,
    pub capacity: i64,
    pub store: &'a dyn RegistrationStore,
    pub store_timeout: Duration,
}

/// A rule that may consult the store.
#[async_trait::async_trait]
pub trait StoreRule: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self, ctx: &AdmissionContext<'_>) -> Result<(), AdmissionError>;
}

/// Name, phone and address must be non-blank and attendance confirmed.
pub struct RequiredFields;

impl FormRule for RequiredFields {
    fn name(&self) -> &'static str {
        "required_fields"
    }

    fn check(&self, form: &RegistrationForm) -> Result<(), AdmissionError> {
        if form.full_name.trim().is_empty() {
            return Err(AdmissionError::EmptyRequiredField(RequiredField::FullName));
        }
        if form.phone.trim().is_empty() {
            return Err(AdmissionError::EmptyRequiredField(RequiredField::Phone));
        }
        if form.address.trim().is_empty() {
            return Err(AdmissionError::EmptyRequiredField(RequiredField::Address));
        }
        if !form.attendance_confirmed {
            return Err(AdmissionError::EmptyRequiredField(
                RequiredField::AttendanceConfirmation,
            ));
        }
        Ok(())
    }
}

/// Length limits declared on the form.
pub struct FieldLimits;

impl FormRule for FieldLimits {
    fn name(&self) -> &'static str {
        "field_limits"
    }

    fn check(&self, form: &RegistrationForm) -> Result<(), AdmissionError> {
        let Err(errors) = form.validate() else {
            return Ok(());
        };

        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let (field, message) = fields
            .into_iter()
            .find_map(|(field, errs)| {
                errs.first().map(|e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    (field.to_string(), message)
                })
            })
            .unwrap_or_else(|| ("form".to_string(), "Invalid form".to_string()));

        Err(AdmissionError::InvalidField { field, message })
    }
}

/// The registration switch must be on.
pub struct RegistrationOpen;

#[async_trait::async_trait]
impl StoreRule for RegistrationOpen {
    fn name(&self) -> &'static str {
        "registration_open"
    }

    async fn check(&self, ctx: &AdmissionContext<'_>) -> Result<(), AdmissionError> {
        if ctx.registration_enabled {
            Ok(())
        } else {
            Err(AdmissionError::RegistrationClosed)
        }
    }
}

/// Fewer registrations than the configured capacity.
pub struct Capacity;

#[async_trait::async_trait]
impl StoreRule for Capacity {
    fn name(&self) -> &'static str {
        "capacity"
    }

    async fn check(&self, ctx: &AdmissionContext<'_>) -> Result<(), AdmissionError> {
        let count = bounded(ctx.store_timeout, ctx.store.count()).await?;
        if count >= ctx.capacity {
            Err(AdmissionError::CapacityReached)
        } else {
            Ok(())
        }
    }
}

/// No existing registration with the same phone.
pub struct UniquePhone;

#[async_trait::async_trait]
impl StoreRule for UniquePhone {
    fn name(&self) -> &'static str {
        "unique_phone"
    }

    async fn check(&self, ctx: &AdmissionContext<'_>) -> Result<(), AdmissionError> {
        let exists = bounded(
            ctx.store_timeout,
            ctx.store.phone_exists(&ctx.registration.phone),
        )
        .await?;
        if exists {
            Err(AdmissionError::DuplicatePhone)
        } else {
            Ok(())
        }
    }
}

/// Runs the admission pipeline and performs the insert.
pub struct AdmissionController {
    registrations: Arc<dyn RegistrationStore>,
    settings: Arc<dyn SettingsStore>,
    capacity: i64,
    store_timeout: Duration,
    form_rules: Vec<Box<dyn FormRule>>,
    store_rules: Vec<Box<dyn StoreRule>>,
}

impl AdmissionController {
    pub fn new(
        registrations: Arc<dyn RegistrationStore>,
        settings: Arc<dyn SettingsStore>,
        capacity: i64,
        store_timeout: Duration,
    ) -> Self {
        Self {
            registrations,
            settings,
            capacity,
            store_timeout,
            form_rules: vec![Box::new(RequiredFields), Box::new(FieldLimits)],
            store_rules: vec![
                Box::new(RegistrationOpen),
                Box::new(Capacity),
                Box::new(UniquePhone),
            ],
        }
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Admits a registration or explains why not. On success exactly one
    /// record was inserted; on failure none was.
    pub async fn register(&self, form: &RegistrationForm) -> Result<Registration, AdmissionError> {
        let result = self.run(form).await;
        match &result {
            Ok(registration) => {
                metrics::counter!("registrations_admitted_total").increment(1);
                tracing::info!(registration_id = registration.id, "Registration admitted");
            }
            Err(err) => {
                metrics::counter!("registrations_rejected_total", "reason" => err.code())
                    .increment(1);
                match err {
                    AdmissionError::Store(e) => {
                        tracing::error!(error = %e, "Registration failed on store error")
                    }
                    _ => tracing::info!(reason = err.code(), "Registration rejected"),
                }
            }
        }
        result
    }

    async fn run(&self, form: &RegistrationForm) -> Result<Registration, AdmissionError> {
        for rule in &self.form_rules {
            rule.check(form)?;
        }

        let registration_enabled =
            bounded(self.store_timeout, self.settings.registration_enabled()).await?;
        let registration = form.normalized();
        let ctx = AdmissionContext {
            registration: &registration,
            registration_enabled,
            capacity: self.capacity,
            store: self.registrations.as_ref(),
            store_timeout: self.store_timeout,
        };

        for rule in &self.store_rules {
            if let Err(err) = rule.check(&ctx).await {
                tracing::debug!(rule = rule.name(), "Admission rule failed");
                return Err(err);
            }
        }

        match bounded(
            self.store_timeout,
            self.registrations.insert(registration.clone(), self.capacity),
        )
        .await?
        {
            InsertOutcome::Inserted(created) => Ok(created),
            InsertOutcome::CapacityReached => Err(AdmissionError::CapacityReached),
            InsertOutcome::DuplicatePhone => Err(AdmissionError::DuplicatePhone),
        }
    }
}
