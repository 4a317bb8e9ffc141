use crate::models::user::{NewUser, User, VerifiedUser};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable account storage.
///
/// Email uniqueness is enforced here, not by callers: `create_user` must
/// report a concurrent duplicate insert as `AlreadyExists`. Every mutating
/// method is a single statement so an interrupted request never leaves a
/// half-applied change behind.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    /// Account whose pending token equals `token` and whose expiry is after `now`.
    async fn find_by_verification_token(
        &self,
        token: &str,
        now: i64,
    ) -> RepositoryResult<Option<User>>;
    /// Stores a pending token for an unverified account. Returns `false` when
    /// no unverified account with that id exists.
    async fn set_verification_token(
        &self,
        id: i64,
        token: &str,
        expires_at: i64,
    ) -> RepositoryResult<bool>;
    /// Marks the matching account verified and clears its pending token in
    /// one statement. `None` when the token is unknown or expired.
    async fn consume_verification_token(
        &self,
        token: &str,
        now: i64,
    ) -> RepositoryResult<Option<VerifiedUser>>;
    /// Administrative verification that bypasses the token.
    async fn mark_verified(&self, id: i64) -> RepositoryResult<()>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
}

const USER_COLUMNS: &str = "id, email, password_hash, name, locale, email_verified, \
     email_verification_token, email_verification_expires, created_at, updated_at";

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, name, locale, email_verified) \
             VALUES (?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.locale)
            .bind(user.email_verified)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(created) => Ok(created),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_verification_token(
        &self,
        token: &str,
        now: i64,
    ) -> RepositoryResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email_verification_token = ? AND email_verification_expires > ?"
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn set_verification_token(
        &self,
        id: i64,
        token: &str,
        expires_at: i64,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verification_token = ?,
                email_verification_expires = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND email_verified = 0
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: i64,
    ) -> RepositoryResult<Option<VerifiedUser>> {
        let row = sqlx::query_as::<_, VerifiedUser>(
            r#"
            UPDATE users
            SET email_verified = 1,
                email_verification_token = NULL,
                email_verification_expires = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE email_verification_token = ? AND email_verification_expires > ?
            RETURNING id, email, name
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn mark_verified(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = 1,
                email_verification_token = NULL,
                email_verification_expires = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
