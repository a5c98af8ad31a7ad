/// Notification Service Library
///
/// Consumes community and registration events and turns them into email.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `dispatch`: Per-recipient fan-out with delivery receipts
/// - `error`: Error types
/// - `mailer`: Mail transport (SMTP via lettre, or in-memory)
/// - `templates`: Subjects and bodies per event kind
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mailer;
pub mod templates;

pub use dispatch::NotificationDispatcher;
pub use error::{NotificationError, Result};
pub use mailer::{Email, Mailer, MemoryMailer, SmtpMailer};
