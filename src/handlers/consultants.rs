//! Consultant profiles, consultant search and invitations to a dog.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{
        catalog::{CONSULTANTS_INVITE, CONSULTANTS_SEARCH},
        Operation, Resource, Role, Subject,
    },
    error::{db_err, get_db_conn, ApiError, ApiResult},
    handlers::{dog_ref, like_pattern, load_dog, validation_error},
    models::{ConsultantProfile, ConsultantProfileUpsert, Invite, User},
    pagination::{PaginatedResponse, PaginationParams},
    schema::{consultant_profiles, users},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProfileRequest {
    #[validate(length(max = 255, message = "Surname must be at most 255 characters"))]
    #[schema(example = "Petrović")]
    pub surname: String,
    pub description: String,
    #[schema(example = "training, behaviour")]
    pub services: String,
    #[schema(example = "border collie, kelpie")]
    pub breeds: String,
    #[validate(length(max = 255, message = "Location must be at most 255 characters"))]
    #[schema(example = "Belgrade")]
    pub location: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsultantResponse {
    pub id: Uuid,
    #[schema(example = "Ana")]
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub profile: Option<ConsultantProfile>,
}

impl ConsultantResponse {
    fn new(user: User, profile: Option<ConsultantProfile>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            profile,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchConsultantsQuery {
    /// Matches name, surname or description.
    pub query: Option<String>,
    pub services: Option<String>,
    pub breeds: Option<String>,
    pub location: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteRequest {
    pub dog_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InviteResponse {
    pub invite: Invite,
    /// Shown once. Only its digest is stored.
    pub token: String,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn consultant_search(query: &SearchConsultantsQuery) -> users::BoxedQuery<'static, Pg> {
    let mut q = users::table
        .filter(users::role.eq(Role::Consultant.as_str()))
        .into_boxed();

    if let Some(term) = non_blank(&query.query) {
        let pattern = like_pattern(term);
        q = q.filter(
            users::name.ilike(pattern.clone()).or(users::id.eq_any(
                consultant_profiles::table
                    .filter(
                        consultant_profiles::surname
                            .ilike(pattern.clone())
                            .or(consultant_profiles::description.ilike(pattern)),
                    )
                    .select(consultant_profiles::user_id),
            )),
        );
    }
    if let Some(services) = non_blank(&query.services) {
        q = q.filter(
            users::id.eq_any(
                consultant_profiles::table
                    .filter(consultant_profiles::services.ilike(like_pattern(services)))
                    .select(consultant_profiles::user_id),
            ),
        );
    }
    if let Some(breeds) = non_blank(&query.breeds) {
        q = q.filter(
            users::id.eq_any(
                consultant_profiles::table
                    .filter(consultant_profiles::breeds.ilike(like_pattern(breeds)))
                    .select(consultant_profiles::user_id),
            ),
        );
    }
    if let Some(location) = non_blank(&query.location) {
        q = q.filter(
            users::id.eq_any(
                consultant_profiles::table
                    .filter(consultant_profiles::location.ilike(like_pattern(location)))
                    .select(consultant_profiles::user_id),
            ),
        );
    }

    q
}

/// A user with the consultant role, or 404.
fn load_consultant(conn: &mut PgConnection, user_id: Uuid) -> ApiResult<User> {
    users::table
        .find(user_id)
        .filter(users::role.eq(Role::Consultant.as_str()))
        .select(User::as_select())
        .first(conn)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| ApiError::not_found("Consultant not found", "CONSULTANT_NOT_FOUND"))
}

#[utoipa::path(
    put,
    path = "/consultants/profile",
    tag = "Consultants",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = ConsultantProfile),
        (status = 403, description = "Unrecognized role", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(payload): Json<ProfileRequest>,
) -> ApiResult<Json<ConsultantProfile>> {
    payload.validate().map_err(validation_error)?;

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Update,
            &Resource::ConsultantProfile {
                user_id: subject.user_id,
            },
        )
        .await?;

    let upsert = ConsultantProfileUpsert {
        user_id: subject.user_id,
        surname: payload.surname,
        description: payload.description,
        services: payload.services,
        breeds: payload.breeds,
        location: payload.location,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = get_db_conn(&state.db_pool)?;
    let profile = diesel::insert_into(consultant_profiles::table)
        .values(&upsert)
        .on_conflict(consultant_profiles::user_id)
        .do_update()
        .set(&upsert)
        .returning(ConsultantProfile::as_returning())
        .get_result(&mut conn)
        .map_err(db_err)?;

    info!(user_id = %subject.user_id, "Consultant profile saved");
    Ok(Json(profile))
}

#[utoipa::path(
    get,
    path = "/consultants/{id}",
    tag = "Consultants",
    params(("id" = Uuid, Path, description = "Consultant user ID")),
    responses(
        (status = 200, description = "Consultant with profile", body = ConsultantResponse),
        (status = 404, description = "Consultant not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_consultant(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ConsultantResponse>> {
    state
        .authorizer
        .ensure(&subject, Operation::Read, &Resource::ConsultantProfile { user_id })
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let user = load_consultant(&mut conn, user_id)?;
    let profile = consultant_profiles::table
        .find(user_id)
        .select(ConsultantProfile::as_select())
        .first(&mut conn)
        .optional()
        .map_err(db_err)?;

    Ok(Json(ConsultantResponse::new(user, profile)))
}

#[utoipa::path(
    get,
    path = "/consultants",
    tag = "Consultants",
    params(SearchConsultantsQuery),
    responses(
        (
            status = 200,
            description = "Matching consultants",
            body = PaginatedResponse<ConsultantResponse>
        ),
        (status = 403, description = "Missing search permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_consultants(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<SearchConsultantsQuery>,
) -> ApiResult<Json<PaginatedResponse<ConsultantResponse>>> {
    state
        .authorizer
        .ensure(&subject, Operation::List, &Resource::ConsultantProfiles)
        .await?;
    state
        .authorizer
        .require_any_permission(&subject, &[CONSULTANTS_SEARCH])
        .await?;

    let params = PaginationParams::from_parts(query.page, query.per_page);
    let (limit, offset) = params.limit_offset();

    let mut conn = get_db_conn(&state.db_pool)?;
    let total: i64 = consultant_search(&query)
        .count()
        .get_result(&mut conn)
        .map_err(db_err)?;

    let consultants: Vec<User> = consultant_search(&query)
        .order((users::name.asc(), users::id.asc()))
        .limit(limit)
        .offset(offset)
        .select(User::as_select())
        .load(&mut conn)
        .map_err(db_err)?;

    let ids: Vec<Uuid> = consultants.iter().map(|u| u.id).collect();
    let mut profiles: HashMap<Uuid, ConsultantProfile> = consultant_profiles::table
        .filter(consultant_profiles::user_id.eq_any(ids))
        .select(ConsultantProfile::as_select())
        .load(&mut conn)
        .map_err(db_err)?
        .into_iter()
        .map(|p| (p.user_id, p))
        .collect();

    let items = consultants
        .into_iter()
        .map(|user| {
            let profile = profiles.remove(&user.id);
            ConsultantResponse::new(user, profile)
        })
        .collect();

    Ok(Json(PaginatedResponse::from_params(items, &params, total)))
}

#[utoipa::path(
    post,
    path = "/consultants/{id}/invite",
    tag = "Consultants",
    params(("id" = Uuid, Path, description = "Consultant user ID")),
    request_body = InviteRequest,
    responses(
        (
            status = 201,
            description = "Invite created; the token is returned once",
            body = InviteResponse
        ),
        (status = 403, description = "Not the dog's owner", body = ApiError),
        (status = 404, description = "Consultant or dog not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn invite_consultant(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(consultant_id): Path<Uuid>,
    Json(payload): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<InviteResponse>)> {
    state
        .authorizer
        .require_any_permission(&subject, &[CONSULTANTS_INVITE])
        .await?;

    let dog = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_consultant(&mut conn, consultant_id)?;
        load_dog(&mut conn, payload.dog_id)?
    };

    state
        .authorizer
        .ensure(&subject, Operation::Update, &Resource::Dog(dog_ref(&dog)))
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let issued = state
        .invites
        .create_invite(&mut conn, subject.user_id, consultant_id, dog_ref(&dog))?;

    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            invite: issued.invite,
            token: issued.token,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&Some("  trainer ".to_string())), Some("trainer"));
        assert_eq!(non_blank(&Some("   ".to_string())), None);
        assert_eq!(non_blank(&None), None);
    }

    #[test]
    fn test_profile_validation() {
        let request = ProfileRequest {
            surname: "x".repeat(256),
            description: String::new(),
            services: String::new(),
            breeds: String::new(),
            location: "Novi Sad".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
