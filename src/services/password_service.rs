use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, PasswordVerifier, Version,
};

#[derive(Debug, thiserror::Error)]
pub enum HashingError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),
    #[error("Password hashing failed: {0}")]
    HashFailed(String),
    #[error("Stored password hash is not a valid PHC string: {0}")]
    MalformedHash(String),
    #[error("Hashing task failed: {0}")]
    TaskFailed(String),
}

/// Argon2id work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// One-way, salted password hashing.
///
/// Holds nothing but the validated parameter set; cloning is cheap and every
/// clone produces interchangeable hashes.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(cost: HashCost) -> Result<Self, HashingError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| HashingError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    /// Smallest parameters argon2 accepts. Only for tests.
    pub fn insecure_fast() -> Self {
        Self {
            params: Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
                .unwrap_or_default(),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes with a fresh random salt; the salt and cost are embedded in the
    /// returned PHC string.
    pub fn hash(&self, password: &str) -> Result<String, HashingError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashingError::HashFailed(e.to_string()))
    }

    /// `Ok(false)` on mismatch. Only an unparseable stored hash is an error.
    pub fn verify(&self, password: &str, password_hash: &str) -> Result<bool, HashingError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| HashingError::MalformedHash(e.to_string()))?;
        // Cost comes from the hash itself, so hashes made under older
        // parameters keep verifying.
        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, password: String) -> Result<String, HashingError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashingError::TaskFailed(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(
        &self,
        password: String,
        password_hash: String,
    ) -> Result<bool, HashingError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &password_hash))
            .await
            .map_err(|e| HashingError::TaskFailed(e.to_string()))?
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}
