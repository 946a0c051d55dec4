//! Invite redemption.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    access::Subject,
    error::{get_db_conn, ApiError, ApiResult},
    models::{ConsultantAccess, Invite},
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AcceptInviteQuery {
    /// Token from the create-invite response.
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptInviteResponse {
    pub invite: Invite,
    pub access: ConsultantAccess,
    /// Assigned permissions that were granted.
    pub granted: Vec<String>,
    /// Assigned permissions that could not be granted. Acceptance still succeeds.
    pub failed: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/invites/accept",
    tag = "Invites",
    params(AcceptInviteQuery),
    responses(
        (
            status = 200,
            description = "Invite accepted; access granted to the dog",
            body = AcceptInviteResponse
        ),
        (
            status = 400,
            description = "Invite not pending, expired, or for another consultant",
            body = ApiError
        ),
        (status = 404, description = "Unknown token", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<AcceptInviteQuery>,
) -> ApiResult<Json<AcceptInviteResponse>> {
    let token = query.token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("token is required", "TOKEN_REQUIRED"));
    }

    let accepted = {
        let mut conn = get_db_conn(&state.db_pool)?;
        state.invites.accept_invite(&mut conn, token, subject.user_id)?
    };

    // Grants were written inside the acceptance transaction, bypassing the store.
    state.permissions.invalidate(subject.user_id).await;

    let failed = accepted
        .grants
        .failed_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok(Json(AcceptInviteResponse {
        invite: accepted.invite,
        access: accepted.access,
        granted: accepted.grants.granted,
        failed,
    }))
}
