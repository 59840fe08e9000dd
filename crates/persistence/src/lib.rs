//! Persistence layer for the event registration backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits
//! - SQL migrations (embedded by the api binary)

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;
