//! HTTP route handlers.

pub mod admin;
pub mod auth;
pub mod checkin;
pub mod health;
pub mod registrations;
pub mod staff;
