pub mod auth_service;
pub mod email_service;
pub mod password_service;
pub mod token_service;

pub use auth_service::AuthService;
pub use email_service::{create_notifier, EmailError, LoggingNotifier, Notifier, SmtpNotifier};
pub use password_service::{CredentialHasher, HashCost, HashingError};
pub use token_service::{Claims, TokenError, TokenPurpose, TokenService, TokenSubject};
