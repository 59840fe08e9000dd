//! Application services that sit between the routes and the domain.

pub mod admin_bootstrap;
pub mod auth;
pub mod scanner_registry;

pub use admin_bootstrap::{bootstrap_super_admin, BootstrapError};
pub use auth::{AuthError, AuthTokens, Authenticated, SessionService};
pub use scanner_registry::{ScannerRegistry, ScannerSnapshot};
