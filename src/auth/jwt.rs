//! Access tokens: Ed25519-signed JWTs carrying the user's id, e-mail and role.

use std::collections::HashSet;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_TTL_SECS: i64 = 3600;

/// Custom claims signed into every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserClaims {
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

/// A verified token. The role string is passed through untouched; whether it
/// names a known role is for the access layer to decide.
#[derive(Debug, Clone)]
pub struct Claims {
    pub subject: String,
    pub email: String,
    pub role: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtKeyError {
    #[error("JWT_PRIVATE_KEY must be set")]
    Missing,
    #[error("JWT_PRIVATE_KEY must be valid base64")]
    InvalidBase64,
    #[error("JWT_PRIVATE_KEY must be a valid Ed25519 key")]
    InvalidKey,
}

fn key_from_base64(encoded: &str) -> Result<Ed25519KeyPair, JwtKeyError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| JwtKeyError::InvalidBase64)?;
    Ed25519KeyPair::from_bytes(&bytes).map_err(|_| JwtKeyError::InvalidKey)
}

#[derive(Clone)]
pub struct JwtConfig {
    signing: Arc<Ed25519KeyPair>,
    verifying: Arc<Ed25519PublicKey>,
    /// Lifetime of an access token, in seconds.
    pub access_token_expiry: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl JwtConfig {
    /// Loads the signing key from `JWT_PRIVATE_KEY` (base64 of the raw
    /// Ed25519 key pair bytes).
    pub fn from_env(
        access_token_expiry: i64,
        issuer: Option<String>,
        audience: Option<String>,
    ) -> Result<Self, JwtKeyError> {
        let encoded = std::env::var("JWT_PRIVATE_KEY").map_err(|_| JwtKeyError::Missing)?;
        Ok(Self {
            access_token_expiry,
            issuer,
            audience,
            ..Self::from_key_pair(key_from_base64(&encoded)?)
        })
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        Self {
            verifying: Arc::new(key_pair.public_key()),
            signing: Arc::new(key_pair),
            access_token_expiry: DEFAULT_TTL_SECS,
            issuer: None,
            audience: None,
        }
    }

    /// Fresh `(private, public)` pair, base64-encoded, for provisioning.
    pub fn generate_key_pair() -> (String, String) {
        let key_pair = Ed25519KeyPair::generate();
        (
            BASE64.encode(key_pair.to_bytes()),
            BASE64.encode(key_pair.public_key().to_bytes()),
        )
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role: &str,
    ) -> Result<String, jwt_simple::Error> {
        let ttl = Duration::from_secs(self.access_token_expiry.max(1) as u64);
        let user = UserClaims {
            email: email.to_owned(),
            role: Some(role.to_owned()),
        };

        let mut claims = jwt_simple::claims::Claims::with_custom_claims(user, ttl)
            .with_subject(user_id);
        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            claims = claims.with_audience(audience);
        }

        self.signing.sign(claims)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jwt_simple::Error> {
        let options = VerificationOptions {
            allowed_issuers: self.issuer.as_ref().map(|i| HashSet::from([i.clone()])),
            allowed_audiences: self.audience.as_ref().map(|a| HashSet::from([a.clone()])),
            ..Default::default()
        };

        let verified = self.verifying.verify_token::<UserClaims>(token, Some(options))?;
        let seconds = |t: Option<UnixTimeStamp>| t.map_or(0, |t| t.as_secs() as i64);

        Ok(Claims {
            subject: verified.subject.unwrap_or_default(),
            email: verified.custom.email,
            role: verified.custom.role,
            issued_at: seconds(verified.issued_at),
            expires_at: seconds(verified.expires_at),
        })
    }
}
