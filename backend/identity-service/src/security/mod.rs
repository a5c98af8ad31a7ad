pub mod password;
pub mod principal;

pub use password::{hash_password, verify_password};
pub use principal::{UserPrincipal, UserPrincipalLoader};
