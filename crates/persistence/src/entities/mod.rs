//! Database entity definitions.
//!
//! Entities map directly to database rows and are converted to domain models.

pub mod registration;
pub mod staff;

pub use registration::RegistrationEntity;
pub use staff::{StaffAccountEntity, StaffRoleEntity, StaffSessionEntity};
