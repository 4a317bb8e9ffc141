use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_LOCALE: &str = "ko";

/// A row of the `users` table.
///
/// `password_hash`, `email_verification_token` and `email_verification_expires`
/// never leave the server; use the `*View` types for responses.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub locale: String,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
    /// Unix seconds.
    pub email_verification_expires: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl User {
    pub fn has_pending_verification(&self) -> bool {
        self.email_verification_token.is_some() && self.email_verification_expires.is_some()
    }
}

/// Fields needed to insert an account. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub locale: String,
    pub email_verified: bool,
}

/// Returned by signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub locale: String,
    pub created_at: Option<String>,
}

impl From<&User> for RegisteredUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            locale: user.locale.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// Returned by login, refresh and `/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub locale: String,
    pub email_verified: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            locale: user.locale.clone(),
            email_verified: user.email_verified,
        }
    }
}

/// Returned by email verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VerifiedUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User {
            id: 7,
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: Some("Ann".to_string()),
            locale: DEFAULT_LOCALE.to_string(),
            email_verified: false,
            email_verification_token: Some("tok".to_string()),
            email_verification_expires: Some(1_700_000_000),
            created_at: Some("2025-06-01 00:00:00".to_string()),
            updated_at: None,
        }
    }

    #[test]
    fn public_views_never_serialize_secrets() {
        let user = sample();
        let registered = serde_json::to_string(&RegisteredUser::from(&user)).unwrap();
        let profile = serde_json::to_string(&UserProfile::from(&user)).unwrap();

        for body in [registered, profile] {
            assert!(!body.contains("argon2"));
            assert!(!body.contains("password"));
            assert!(!body.contains("tok"));
        }
    }

    #[test]
    fn pending_verification_requires_token_and_expiry() {
        let mut user = sample();
        assert!(user.has_pending_verification());
        user.email_verification_token = None;
        user.email_verification_expires = None;
        assert!(!user.has_pending_verification());
    }
}
