//! Domain models for event registration.

pub mod event_setting;
pub mod registration;
pub mod staff;
pub mod ticket;

pub use event_setting::RegistrationSwitch;
pub use registration::{NewRegistration, Registration, RegistrationForm, RegistrationStats};
pub use staff::{Capability, CapabilitySet, GatedAction, StaffIdentity, StaffRole};
pub use ticket::{TicketFormat, TicketImage, TicketPayload};
