use crate::error::{AuthError, Result};
use crate::models::user::{
    NewUser, RegisteredUser, User, UserProfile, VerifiedUser, DEFAULT_LOCALE,
};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::Notifier;
use crate::services::password_service::CredentialHasher;
use crate::services::token_service::{Claims, TokenPurpose, TokenService, TokenSubject};
use chrono::Utc;
use std::sync::Arc;

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub token: String,
    pub user: UserProfile,
}

/// Registration, email verification and login.
///
/// The email pre-check in [`register`](Self::register) is only a fast path;
/// the store's uniqueness constraint decides concurrent duplicates and both
/// paths end in [`AuthError::Conflict`].
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    hasher: CredentialHasher,
    notifier: Arc<dyn Notifier>,
    verification_base_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        hasher: CredentialHasher,
        notifier: Arc<dyn Notifier>,
        verification_base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            notifier,
            verification_base_url: verification_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.verification_base_url,
            urlencoding::encode(token)
        )
    }

    pub async fn register(&self, request: SignupRequest) -> Result<RegisteredUser> {
        let user = self.create_account(request, false).await?;
        self.start_verification(&user).await?;

        Ok(RegisteredUser::from(&user))
    }

    /// Creates an account that is already verified. No token is issued and
    /// nothing is mailed. Used by the admin CLI.
    pub async fn register_verified(&self, request: SignupRequest) -> Result<RegisteredUser> {
        let user = self.create_account(request, true).await?;
        Ok(RegisteredUser::from(&user))
    }

    async fn create_account(&self, request: SignupRequest, email_verified: bool) -> Result<User> {
        let email = request.email.trim().to_string();
        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation(
                "Valid email format is required".to_string(),
            ));
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;

        let new_user = NewUser {
            email,
            password_hash,
            name: non_blank(request.name),
            locale: non_blank(request.locale).unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            email_verified,
        };
        let user = match self.users.create_user(new_user).await {
            Ok(user) => user,
            Err(RepositoryError::AlreadyExists) => return Err(AuthError::Conflict),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(user_id = user.id, email_verified, "registered new account");

        Ok(user)
    }

    /// Redeems an email-verification token. One-shot: a second call with the
    /// same token fails with [`AuthError::TokenInvalidOrExpired`].
    pub async fn verify_email(&self, token: &str) -> Result<VerifiedUser> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Validation("Token is required".to_string()));
        }

        self.tokens
            .verify_purpose(token, TokenPurpose::EmailVerification)?;

        let verified = self
            .users
            .consume_verification_token(token, Utc::now().timestamp())
            .await?
            .ok_or(AuthError::TokenInvalidOrExpired)?;

        tracing::info!(user_id = verified.id, "email verified");
        Ok(verified)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome> {
        let email = request.email.trim();
        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let valid = self
            .hasher
            .verify_blocking(request.password, user.password_hash.clone())
            .await?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        let access = self.tokens.issue_for(
            TokenPurpose::Access,
            TokenSubject::user(user.id, user.email.clone()),
        )?;
        let refresh = self
            .tokens
            .issue_for(TokenPurpose::Refresh, TokenSubject::user_id(user.id))?;

        tracing::info!(user_id = user.id, "login succeeded");
        Ok(LoginOutcome {
            token: access.token,
            refresh_token: refresh.token,
            user: UserProfile::from(&user),
        })
    }

    /// Re-sends a verification link. Unknown and already verified addresses
    /// succeed silently so the endpoint cannot be used to probe accounts.
    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("Valid email is required".to_string()));
        }

        match self.users.find_by_email(email).await? {
            Some(user) if !user.email_verified => self.start_verification(&user).await,
            Some(user) => {
                tracing::debug!(user_id = user.id, "verification requested for verified account");
                Ok(())
            }
            None => {
                tracing::debug!("verification requested for unknown email");
                Ok(())
            }
        }
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::Validation(
                "Refresh token is required".to_string(),
            ));
        }

        let claims = self
            .tokens
            .verify_purpose(refresh_token, TokenPurpose::Refresh)
            .map_err(|_| AuthError::InvalidBearerToken)?;
        let user = self.user_for_claims(&claims).await?;
        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let access = self.tokens.issue_for(
            TokenPurpose::Access,
            TokenSubject::user(user.id, user.email.clone()),
        )?;

        Ok(RefreshOutcome {
            token: access.token,
            user: UserProfile::from(&user),
        })
    }

    /// Validates a bearer access token. Any failure, including a token minted
    /// for another purpose, is [`AuthError::InvalidBearerToken`].
    pub fn authenticate_access(&self, token: &str) -> Result<Claims> {
        self.tokens
            .verify_purpose(token, TokenPurpose::Access)
            .map_err(|_| AuthError::InvalidBearerToken)
    }

    pub async fn current_user(&self, claims: &Claims) -> Result<UserProfile> {
        let user = self.user_for_claims(claims).await?;
        Ok(UserProfile::from(&user))
    }

    async fn user_for_claims(&self, claims: &Claims) -> Result<User> {
        let user_id = claims
            .subject
            .user_id
            .ok_or(AuthError::InvalidBearerToken)?;
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidBearerToken)
    }

    /// Issues a verification token, records it with its expiry on the
    /// account, then mails the link. The account stays unverified if the
    /// notifier fails.
    async fn start_verification(&self, user: &User) -> Result<()> {
        let issued = self.tokens.issue_for(
            TokenPurpose::EmailVerification,
            TokenSubject::email(user.email.clone()),
        )?;

        let stored = self
            .users
            .set_verification_token(user.id, &issued.token, issued.expires_at)
            .await?;
        if !stored {
            // Verified between lookup and update; nothing left to send.
            tracing::debug!(user_id = user.id, "account no longer awaiting verification");
            return Ok(());
        }

        self.notifier
            .send_verification(&user.email, &self.verification_link(&issued.token))
            .await?;

        tracing::info!(user_id = user.id, "verification email sent");
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
