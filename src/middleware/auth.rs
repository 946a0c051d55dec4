//! Authentication middleware.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::access::{Role, Subject};
use crate::auth::jwt::Claims;
use crate::telemetry::{record_auth_attempt, AuthOutcome};
use crate::AppState;

fn unauthorized(error: &str, code: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": error, "code": code})),
    )
        .into_response()
}

/// Builds the acting subject from verified claims. A role the access model
/// does not know is kept as `None` rather than rejected here.
pub fn subject_from_claims(claims: &Claims) -> Option<Subject> {
    let user_id = Uuid::parse_str(&claims.subject).ok()?;
    let role = claims.role.as_deref().and_then(|r| r.parse::<Role>().ok());
    Some(Subject { user_id, role })
}

/// Validates the bearer token and stores the [`Claims`] and [`Subject`] in
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing authorization header", "MISSING_AUTH_HEADER"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid authorization header format", "INVALID_AUTH_FORMAT"))?;

    let claims = state.jwt_config.verify(token).map_err(|e| {
        debug!(error = %e, "Access token rejected");
        record_auth_attempt("verify", AuthOutcome::InvalidToken);
        unauthorized("Invalid or expired token", "INVALID_TOKEN")
    })?;

    let subject = subject_from_claims(&claims)
        .ok_or_else(|| unauthorized("Invalid token subject", "INVALID_TOKEN"))?;

    tracing::Span::current().record("user_id", tracing::field::display(subject.user_id));
    req.extensions_mut().insert(subject);
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: Option<&str>) -> Claims {
        Claims {
            subject: sub.to_string(),
            email: "k@example.com".to_string(),
            role: role.map(str::to_string),
            expires_at: 0,
            issued_at: 0,
        }
    }

    #[test]
    fn test_subject_from_claims_with_known_role() {
        let id = Uuid::new_v4();
        let subject = subject_from_claims(&claims(&id.to_string(), Some("consultant"))).unwrap();
        assert_eq!(subject, Subject::new(id, Role::Consultant));
    }

    #[test]
    fn test_unknown_role_becomes_unrecognized() {
        let id = Uuid::new_v4();
        let subject = subject_from_claims(&claims(&id.to_string(), Some("vet"))).unwrap();
        assert_eq!(subject.role, None);

        let subject = subject_from_claims(&claims(&id.to_string(), None)).unwrap();
        assert_eq!(subject.role, None);
    }

    #[test]
    fn test_invalid_subject_is_rejected() {
        assert!(subject_from_claims(&claims("not-a-uuid", Some("owner"))).is_none());
    }
}
