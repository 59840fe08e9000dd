//! Repository implementations for database operations.

pub mod event_setting;
pub mod registration;
pub mod staff;

pub use event_setting::EventSettingRepository;
pub use registration::RegistrationRepository;
pub use staff::StaffRepository;
