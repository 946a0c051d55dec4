//! Identity: password hashing and access tokens.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtConfig, JwtKeyError};
pub use password::{PasswordHasher, PasswordPolicy, PasswordPolicyError};
