//! # Actix Middleware Library
//!
//! Request authentication shared by the Spectra HTTP services
//!
//! ## Modules
//! - `jwt_auth`: bearer-token gate, principal loading and the `Authenticated` extractor

pub mod jwt_auth;

pub use jwt_auth::{authenticate, AuthError, Authenticated, JwtAuth, PrincipalLoader};
