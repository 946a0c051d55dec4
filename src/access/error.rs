use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use super::invites::InviteRejection;
use super::policy::DenyReason;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("access denied: {0}")]
    Forbidden(DenyReason),

    #[error("{0}")]
    InvalidState(InviteRejection),

    #[error("{entity} already exists")]
    AlreadyExists { entity: &'static str },

    #[error("store failure: {0}")]
    Store(#[source] DieselError),

    #[error("connection pool failure: {0}")]
    Pool(String),
}

impl AccessError {
    pub fn not_found(entity: &'static str) -> Self {
        AccessError::NotFound { entity }
    }
}

impl From<DieselError> for AccessError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AccessError::NotFound { entity: "record" },
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AccessError::AlreadyExists { entity: "record" }
            }
            other => AccessError::Store(other),
        }
    }
}

impl From<diesel::r2d2::PoolError> for AccessError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AccessError::Pool(err.to_string())
    }
}

impl From<DenyReason> for AccessError {
    fn from(reason: DenyReason) -> Self {
        AccessError::Forbidden(reason)
    }
}

impl From<InviteRejection> for AccessError {
    fn from(rejection: InviteRejection) -> Self {
        AccessError::InvalidState(rejection)
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diesel_not_found_maps_to_not_found() {
        let err = AccessError::from(DieselError::NotFound);
        assert!(matches!(err, AccessError::NotFound { .. }));
    }

    #[test]
    fn test_other_diesel_errors_are_store_failures() {
        let err = AccessError::from(DieselError::RollbackTransaction);
        assert!(matches!(err, AccessError::Store(_)));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(AccessError::not_found("dog").to_string(), "dog not found");
        assert_eq!(
            AccessError::from(InviteRejection::Expired).to_string(),
            "invite expired"
        );
    }
}
