//! Custom Axum extractors.

pub mod staff_auth;

pub use staff_auth::{bearer_token, StaffAccess, StaffSession};
