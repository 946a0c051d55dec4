//! Registration, login and the current-user endpoint.

use axum::{extract::State, http::StatusCode, Extension, Json};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{catalog::grant_role_defaults, Role, Subject},
    error::{db_err, get_db_conn, ApiError, ApiResult},
    events::{DomainEvent, EventType, OutboxService},
    handlers::validation_error,
    models::{NewUser, User},
    schema::users,
    telemetry::{record_auth_attempt, AuthOutcome},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[schema(example = "Ana")]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[schema(example = "securepassword123", min_length = 8)]
    pub password: String,
    /// Only read by `/auth/register`. Defaults to `owner`.
    #[schema(example = "consultant")]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 3600)]
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "Ana")]
    pub name: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[schema(example = "owner")]
    pub role: String,
    pub created_at: chrono::NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Self-registration never yields an admin.
fn requested_role(role: Option<&str>) -> ApiResult<Role> {
    match role.map(|r| r.trim().to_lowercase()) {
        None => Ok(Role::Owner),
        Some(r) => match r.parse::<Role>() {
            Ok(Role::Admin) => Err(ApiError::bad_request(
                "Admin accounts cannot be self-registered",
                "ROLE_NOT_ALLOWED",
            )),
            Ok(role) => Ok(role),
            Err(e) => Err(ApiError::bad_request(e.to_string(), "INVALID_ROLE")),
        },
    }
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    state
        .jwt_config
        .issue(user.id, &user.email, &user.role)
        .map_err(|e| {
            error!(error = %e, "Failed to generate access token");
            ApiError::internal("Failed to generate token", "TOKEN_GENERATION_ERROR")
        })
}

fn auth_response(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_token = issue_token(state, &user)?;
    Ok(AuthResponse {
        user: user.into(),
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_config.access_token_expiry,
    })
}

async fn register_as(
    state: AppState,
    payload: RegisterRequest,
    role: Role,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    payload.validate().map_err(validation_error)?;

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let password_hash = state.password_hasher.hash(&payload.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
    })?;

    let new_user = NewUser {
        name: payload.name.trim().to_string(),
        email: payload.email.to_lowercase(),
        password_hash,
        role: role.as_str().to_string(),
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let user = conn
        .transaction::<_, DieselError, _>(|conn| {
            let user: User = diesel::insert_into(users::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result(conn)?;

            grant_role_defaults(conn, user.id, Some(role));

            OutboxService::record(
                conn,
                DomainEvent::new(
                    EventType::UserRegistered,
                    user.id,
                    serde_json::json!({ "email": user.email, "role": user.role }),
                )
                .by(user.id),
            )?;
            Ok(user)
        })
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                warn!(email = %new_user.email, "Registration with existing email");
                ApiError::conflict("User with this email already exists", "USER_EXISTS")
            }
            other => db_err(other),
        })?;

    info!(user_id = %user.id, role = %role, "User registered");

    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Validation error or admin role requested", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let role = requested_role(payload.role.as_deref())?;
    register_as(state, payload, role).await
}

#[utoipa::path(
    post,
    path = "/auth/register/owner",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Owner registered", body = AuthResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError)
    )
)]
pub async fn register_owner(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    register_as(state, payload, Role::Owner).await
}

#[utoipa::path(
    post,
    path = "/auth/register/consultant",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Consultant registered", body = AuthResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError)
    )
)]
pub async fn register_consultant(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    register_as(state, payload, Role::Consultant).await
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.validate().map_err(validation_error)?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: Option<User> = users::table
        .filter(users::email.eq(payload.email.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .optional()
        .map_err(db_err)?;

    let Some(user) = user else {
        warn!("Login attempt for unknown email");
        record_auth_attempt("login", AuthOutcome::InvalidCredentials);
        return Err(ApiError::unauthorized(
            "Invalid credentials",
            "INVALID_CREDENTIALS",
        ));
    };

    let is_valid = state
        .password_hasher
        .verify(&payload.password, &user.password_hash)
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error", "PASSWORD_VERIFY_ERROR")
        })?;

    if !is_valid {
        warn!(user_id = %user.id, "Failed login attempt - invalid password");
        record_auth_attempt("login", AuthOutcome::InvalidCredentials);
        return Err(ApiError::unauthorized(
            "Invalid credentials",
            "INVALID_CREDENTIALS",
        ));
    }

    record_auth_attempt("login", AuthOutcome::Success);
    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(auth_response(&state, user)?))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .find(subject.user_id)
        .select(User::as_select())
        .first(&mut conn)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_role_defaults_to_owner() {
        assert_eq!(requested_role(None).unwrap(), Role::Owner);
        assert_eq!(requested_role(Some("Consultant")).unwrap(), Role::Consultant);
    }

    #[test]
    fn test_admin_cannot_self_register() {
        let (status, Json(body)) = requested_role(Some("admin")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "ROLE_NOT_ALLOWED");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let (status, Json(body)) = requested_role(Some("vet")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_ROLE");
    }

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            name: String::new(),
            email: "not-an-email".to_string(),
            password: "password123".to_string(),
            role: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("email"));
    }
}
