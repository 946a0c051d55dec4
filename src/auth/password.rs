//! Password hashing with Argon2id and the registration password policy.

use argon2::{
    password_hash::{
        Error as HashError, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_mixed_case: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_mixed_case: false,
            require_digit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {0} characters")]
    TooShort(usize),
    #[error("Password must be at most {0} characters")]
    TooLong(usize),
    #[error("Password must contain upper and lower case letters")]
    MissingMixedCase,
    #[error("Password must contain at least one digit")]
    MissingDigit,
}

impl PasswordPolicy {
    pub fn strict(min_length: usize) -> Self {
        Self {
            min_length,
            require_mixed_case: true,
            require_digit: true,
            ..Self::default()
        }
    }

    pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
        let len = password.chars().count();
        if len < self.min_length {
            return Err(PasswordPolicyError::TooShort(self.min_length));
        }
        if len > self.max_length {
            return Err(PasswordPolicyError::TooLong(self.max_length));
        }
        if self.require_mixed_case
            && !(password.chars().any(|c| c.is_uppercase())
                && password.chars().any(|c| c.is_lowercase()))
        {
            return Err(PasswordPolicyError::MissingMixedCase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }
        Ok(())
    }
}

/// Argon2id hasher. `memory_cost_log2` sets memory to 2^n KiB; low values
/// keep tests fast, production should use 16 or more.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    memory_cost_log2: u32,
}

impl PasswordHasher {
    pub fn new(memory_cost_log2: u32) -> Self {
        Self {
            memory_cost_log2: memory_cost_log2.clamp(3, 22),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = Params::new(1u32 << self.memory_cost_log2, 3, 1, None)
            .map_err(|_| HashError::Algorithm)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
    }

    /// Parameters are read from the stored PHC string, so hashes made with
    /// a different cost still verify.
    pub fn verify(&self, password: &str, password_hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(password_hash)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(12)
    }
}
