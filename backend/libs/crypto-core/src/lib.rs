//! Token signing and hashing primitives shared by the Spectra services.

pub mod hash;
pub mod jwt;

pub use jwt::{Claims, JwtCodec, JwtConfig, JwtError, JwtKeys, TokenPair, TokenType};
