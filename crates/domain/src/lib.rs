//! Domain layer for the event registration backend.
//!
//! This crate contains:
//! - Domain models (Registration, TicketPayload, staff roles and capabilities)
//! - Store traits and an in-memory store
//! - Core services: ticket codec, admission, check-in workflow, access control

pub mod models;
pub mod services;
