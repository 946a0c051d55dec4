//! Per-user permission grants.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    access::{AccessError, Operation, Resource, Subject},
    error::{db_err, get_db_conn, ApiResult},
    schema::users,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionsResponse {
    pub user_id: Uuid,
    #[schema(example = json!(["DOGS_CREATE", "DOGS_VIEW_OWN"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantPermissionRequest {
    #[schema(example = "EVENTS_VIEW_ALL")]
    pub permission: String,
}

fn ensure_user_exists(state: &AppState, user_id: Uuid) -> ApiResult<()> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let exists: bool = diesel::select(diesel::dsl::exists(users::table.find(user_id)))
        .get_result(&mut conn)
        .map_err(db_err)?;
    if exists {
        Ok(())
    } else {
        Err(AccessError::not_found("user").into())
    }
}

async fn permissions_of(state: &AppState, user_id: Uuid) -> ApiResult<PermissionsResponse> {
    let permissions = state.permissions.list_permissions(user_id).await?;
    Ok(PermissionsResponse {
        user_id,
        permissions: permissions.into_iter().collect(),
    })
}

#[utoipa::path(
    get,
    path = "/users/me/permissions",
    tag = "Permissions",
    responses(
        (status = 200, description = "Permissions held by the caller", body = PermissionsResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_permissions(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> ApiResult<Json<PermissionsResponse>> {
    state
        .authorizer
        .ensure(
            &subject,
            Operation::Read,
            &Resource::UserPermissions {
                user_id: subject.user_id,
            },
        )
        .await?;

    Ok(Json(permissions_of(&state, subject.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}/permissions",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Permissions held by the user", body = PermissionsResponse),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn user_permissions(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<PermissionsResponse>> {
    state
        .authorizer
        .ensure(&subject, Operation::Read, &Resource::UserPermissions { user_id })
        .await?;
    ensure_user_exists(&state, user_id)?;

    Ok(Json(permissions_of(&state, user_id).await?))
}

#[utoipa::path(
    post,
    path = "/users/{id}/permissions",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = GrantPermissionRequest,
    responses(
        (status = 200, description = "Permission granted", body = PermissionsResponse),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "User or permission not found", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn grant_user_permission(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<GrantPermissionRequest>,
) -> ApiResult<Json<PermissionsResponse>> {
    state
        .authorizer
        .ensure(&subject, Operation::Create, &Resource::UserPermissions { user_id })
        .await?;
    ensure_user_exists(&state, user_id)?;

    state.permissions.grant(user_id, &payload.permission).await?;
    info!(
        user_id = %user_id,
        permission = %payload.permission,
        granted_by = %subject.user_id,
        "Permission granted"
    );

    Ok(Json(permissions_of(&state, user_id).await?))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/permissions/{name}",
    tag = "Permissions",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("name" = String, Path, description = "Permission name")
    ),
    responses(
        (status = 204, description = "Permission revoked (or was not held)"),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "Unknown permission", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_user_permission(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path((user_id, name)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    state
        .authorizer
        .ensure(&subject, Operation::Delete, &Resource::UserPermissions { user_id })
        .await?;

    let removed = state.permissions.revoke(user_id, &name).await?;
    info!(
        user_id = %user_id,
        permission = %name,
        removed,
        revoked_by = %subject.user_id,
        "Permission revoked"
    );

    Ok(StatusCode::NO_CONTENT)
}
