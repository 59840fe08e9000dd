//! Shared utilities for the event registration backend.
//!
//! - Session token fingerprints (SHA-256)
//! - Staff JWT issuing and validation
//! - Password hashing with Argon2id and the staff password policy
//! - Cursor pagination for registration listings
//! - Field validators used by request models

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod validation;
