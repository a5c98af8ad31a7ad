/// Community Service Library
///
/// Spectors, threaded messages and reactions, plus the membership rules that
/// decide who may post where.
///
/// ## Modules
///
/// - `auth`: Principal loading for the bearer-token gate
/// - `config`: Service configuration
/// - `db`: Spector, membership, message and reaction storage
/// - `error`: Error types and their HTTP mapping
/// - `events`: Outbound event construction and the `UserDeleted` consumer
/// - `handlers`: actix-web routes
/// - `models`: Data models
/// - `services`: Business rules and the message cache
/// - `state`: Wiring shared by `main` and the HTTP tests
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

pub use error::{CommunityError, Result};
pub use state::AppState;

/// `source` stamped on every envelope this service emits
pub const SERVICE_NAME: &str = "community-service";
