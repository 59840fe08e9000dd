//! Domain services for event registration.
//!
//! Services contain business logic that operates on domain models and
//! reaches storage only through the traits in [`store`].

pub mod access;
pub mod admission;
pub mod checkin;
pub mod memory;
pub mod store;
pub mod ticket_codec;

pub use access::{resolve_access, AccessController, AccessDenied, AccessError, AccessLevel};
pub use admission::{AdmissionController, AdmissionError, RequiredField};
pub use checkin::{
    Camera, CameraLease, CheckInError, CheckInState, CheckInWorkflow, DeviceError,
    ExclusiveCamera, ScanOutcome,
};
pub use memory::InMemoryStore;
pub use store::{
    bounded, InsertOutcome, RegistrationPage, RegistrationStore, SettingsStore, StaffStore,
    StoreError,
};
pub use ticket_codec::{DecodeError, TicketCodec, TicketError};
