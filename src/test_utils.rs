use crate::services::email_service::{EmailError, Notifier};
use async_trait::async_trait;
use std::sync::Mutex;

/// Notifier that remembers what it was asked to send. Optionally fails every
/// delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// `(to_email, verification_link)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Token embedded in the most recent link sent to `email`.
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|(to, _)| to == email)
            .and_then(|(_, link)| {
                link.split_once("token=")
                    .and_then(|(_, token)| urlencoding::decode(token).ok())
                    .map(|token| token.into_owned())
            })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification(
        &self,
        to_email: &str,
        verification_link: &str,
    ) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::SendFailed("recording notifier set to fail".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to_email.to_string(), verification_link.to_string()));
        }
        Ok(())
    }
}

pub mod test_helpers {
    use super::RecordingNotifier;
    use crate::{
        repositories::user_repository::SqliteUserRepository,
        services::{
            auth_service::AuthService, password_service::CredentialHasher,
            token_service::TokenService,
        },
        AppState,
    };
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    pub const TEST_JWT_SECRET: &[u8] = b"integration-test-signing-key-0123456789";
    pub const TEST_BASE_URL: &str = "http://localhost:3000";

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing.
    /// Needed when several connections must hit the database concurrently.
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        password: &str,
        verified: bool,
    ) -> Result<i64, sqlx::Error> {
        let password_hash = CredentialHasher::insecure_fast()
            .hash(password)
            .map_err(|e| sqlx::Error::Configuration(e.to_string().into()))?;

        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, email_verified) VALUES (?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(verified)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Push the stored verification expiry of `email` to `expires_at` (unix seconds).
    pub async fn set_verification_expiry(
        pool: &SqlitePool,
        email: &str,
        expires_at: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET email_verification_expires = ? WHERE email = ?")
            .bind(expires_at)
            .bind(email)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub fn test_token_service() -> Arc<TokenService> {
        Arc::new(TokenService::new(TEST_JWT_SECRET))
    }

    /// Auth service over `pool` with a cheap hasher and the given notifier.
    pub fn create_auth_service(
        pool: &SqlitePool,
        notifier: Arc<RecordingNotifier>,
    ) -> AuthService {
        AuthService::new(
            Arc::new(SqliteUserRepository::new(pool.clone())),
            test_token_service(),
            CredentialHasher::insecure_fast(),
            notifier,
            TEST_BASE_URL,
        )
    }

    pub fn create_test_state(pool: &SqlitePool, notifier: Arc<RecordingNotifier>) -> AppState {
        AppState {
            auth_service: Arc::new(create_auth_service(pool, notifier)),
        }
    }
}
