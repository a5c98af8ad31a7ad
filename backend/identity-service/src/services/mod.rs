/// Business logic for identity-service
pub mod registration;
pub mod tokens;
pub mod users;

pub use registration::{CodeGenerator, RandomCodeGenerator, RegistrationService};
pub use tokens::TokenService;
pub use users::UserService;
