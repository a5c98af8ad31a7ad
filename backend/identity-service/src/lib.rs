/// Identity Service Library
///
/// Owns user records, runs two-phase registration and the token lifecycle,
/// and serves the internal Directory API.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: User repository (PostgreSQL and in-memory)
/// - `error`: Error types and their HTTP mapping
/// - `handlers`: actix-web routes
/// - `models`: Data models
/// - `security`: Password hashing and principal loading
/// - `services`: Registration, tokens, user management
/// - `state`: Wiring shared by `main` and the HTTP tests
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod security;
pub mod services;
pub mod state;

pub use error::{IdentityError, Result};
pub use state::AppState;

/// `source` stamped on every envelope this service emits
pub const SERVICE_NAME: &str = "identity-service";
