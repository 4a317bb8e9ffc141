use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token signature or structure is invalid")]
    Invalid,
    #[error("Token has expired")]
    Expired,
    #[error("Token purpose mismatch: expected {expected}, got {actual}")]
    WrongPurpose {
        expected: TokenPurpose,
        actual: TokenPurpose,
    },
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Which flow a token may be presented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    Access,
    Refresh,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            TokenPurpose::EmailVerification => Duration::hours(24),
            TokenPurpose::Access => Duration::days(7),
            TokenPurpose::Refresh => Duration::days(30),
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a token was minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSubject {
    #[serde(rename = "uid", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TokenSubject {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            user_id: None,
            email: Some(email.into()),
        }
    }

    pub fn user(user_id: i64, email: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            email: Some(email.into()),
        }
    }

    pub fn user_id(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            email: None,
        }
    }
}

/// Everything carried inside a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub purpose: TokenPurpose,
    #[serde(flatten)]
    pub subject: TokenSubject,
    /// Unix seconds.
    pub iat: i64,
    /// Unix seconds.
    pub exp: i64,
    /// Random nonce; two tokens issued in the same second still differ.
    pub jti: String,
}

/// A freshly signed token and the expiry baked into it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Stateless HS256 token signing and validation with one process-wide key.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `verify_at` with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(
        &self,
        purpose: TokenPurpose,
        subject: TokenSubject,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            purpose,
            subject,
            iat: now,
            exp: now + ttl.num_seconds(),
            jti: new_token_id(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Issues with the purpose's standard TTL.
    pub fn issue_for(
        &self,
        purpose: TokenPurpose,
        subject: TokenSubject,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(purpose, subject, purpose.ttl())
    }

    /// Checks signature and expiry against the current clock. The purpose is
    /// returned, not checked; see [`verify_purpose`](Self::verify_purpose).
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock (unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if now >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    pub fn verify_purpose(
        &self,
        token: &str,
        expected: TokenPurpose,
    ) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.purpose != expected {
            return Err(TokenError::WrongPurpose {
                expected,
                actual: claims.purpose,
            });
        }
        Ok(claims)
    }
}

fn new_token_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}
