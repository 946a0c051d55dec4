//! Dog registration and management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{
        catalog::{DOGS_VIEW_ALL, DOGS_VIEW_ASSIGNED, DOGS_VIEW_OWN},
        AccessError, Operation, Resource, Role, Subject,
    },
    error::{db_err, get_db_conn, ApiError, ApiResult},
    events::{DomainEvent, EventType, OutboxService},
    handlers::{dog_ref, load_dog, validation_error},
    models::{Dog, DogChanges, NewDog},
    pagination::{PaginatedResponse, PaginationParams},
    schema::{consultant_access, dogs},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDogRequest {
    #[validate(length(min = 2, max = 255, message = "Name must be 2-255 characters"))]
    #[schema(example = "Rex")]
    pub name: String,
    #[validate(length(max = 255, message = "Breed must be at most 255 characters"))]
    #[schema(example = "Border Collie")]
    pub breed: Option<String>,
    /// RFC 3339 timestamp.
    #[schema(example = "2021-05-04T00:00:00Z")]
    pub birth_date: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDogRequest {
    #[validate(length(min = 2, max = 255, message = "Name must be 2-255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "Breed must be at most 255 characters"))]
    pub breed: Option<String>,
    pub birth_date: Option<String>,
}

fn parse_birth_date(value: Option<&str>) -> ApiResult<Option<NaiveDateTime>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc).naive_utc())
                .map_err(|_| {
                    ApiError::bad_request(
                        "birth_date must be an RFC 3339 timestamp",
                        "INVALID_BIRTH_DATE",
                    )
                })
        })
        .transpose()
}

#[utoipa::path(
    post,
    path = "/dogs",
    tag = "Dogs",
    request_body = CreateDogRequest,
    responses(
        (status = 201, description = "Dog created", body = Dog),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Only owners can register dogs", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_dog(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(payload): Json<CreateDogRequest>,
) -> ApiResult<(StatusCode, Json<Dog>)> {
    payload.validate().map_err(validation_error)?;
    let birth_date = parse_birth_date(payload.birth_date.as_deref())?;

    state
        .authorizer
        .ensure(&subject, Operation::Create, &Resource::Dogs)
        .await?;

    let new_dog = NewDog {
        owner_id: subject.user_id,
        name: payload.name.trim().to_string(),
        breed: payload.breed,
        birth_date,
    };

    let mut conn = get_db_conn(&state.db_pool)?;
    let dog = conn
        .transaction::<_, AccessError, _>(|conn| {
            let dog: Dog = diesel::insert_into(dogs::table)
                .values(&new_dog)
                .returning(Dog::as_returning())
                .get_result(conn)?;

            OutboxService::record(
                conn,
                DomainEvent::new(
                    EventType::DogCreated,
                    dog.id,
                    serde_json::json!({ "owner_id": dog.owner_id, "name": dog.name }),
                )
                .by(subject.user_id),
            )?;
            Ok(dog)
        })?;

    info!(dog_id = %dog.id, owner_id = %dog.owner_id, "Dog created");
    Ok((StatusCode::CREATED, Json(dog)))
}

#[utoipa::path(
    get,
    path = "/dogs",
    tag = "Dogs",
    params(PaginationParams),
    responses(
        (status = 200, description = "Dogs visible to the caller", body = PaginatedResponse<Dog>),
        (status = 403, description = "Not allowed to list dogs", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_dogs(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Dog>>> {
    let Some(role) = subject.role else {
        return Err(ApiError::forbidden("Unrecognized role", "UNRECOGNIZED_ROLE"));
    };

    state
        .authorizer
        .require_any_permission(&subject, &[DOGS_VIEW_OWN, DOGS_VIEW_ASSIGNED, DOGS_VIEW_ALL])
        .await?;

    let scoped = || {
        let query: dogs::BoxedQuery<'static, Pg> = dogs::table.into_boxed();
        match role {
            Role::Admin => query,
            Role::Owner => query.filter(dogs::owner_id.eq(subject.user_id)),
            Role::Consultant => query.filter(
                dogs::id.eq_any(
                    consultant_access::table
                        .filter(consultant_access::consultant_id.eq(subject.user_id))
                        .filter(consultant_access::revoked_at.is_null())
                        .select(consultant_access::dog_id),
                ),
            ),
        }
    };

    let mut conn = get_db_conn(&state.db_pool)?;
    let (limit, offset) = params.limit_offset();

    let total: i64 = scoped()
        .count()
        .get_result(&mut conn)
        .map_err(db_err)?;

    let items = scoped()
        .order(dogs::created_at.desc())
        .limit(limit)
        .offset(offset)
        .select(Dog::as_select())
        .load(&mut conn)
        .map_err(db_err)?;

    Ok(Json(PaginatedResponse::from_params(items, &params, total)))
}

#[utoipa::path(
    get,
    path = "/dogs/{id}",
    tag = "Dogs",
    params(("id" = Uuid, Path, description = "Dog ID")),
    responses(
        (status = 200, description = "Dog", body = Dog),
        (status = 403, description = "No access to this dog", body = ApiError),
        (status = 404, description = "Dog not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_dog(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(dog_id): Path<Uuid>,
) -> ApiResult<Json<Dog>> {
    let dog = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_dog(&mut conn, dog_id)?
    };

    state
        .authorizer
        .ensure(&subject, Operation::Read, &Resource::Dog(dog_ref(&dog)))
        .await?;

    Ok(Json(dog))
}

#[utoipa::path(
    put,
    path = "/dogs/{id}",
    tag = "Dogs",
    params(("id" = Uuid, Path, description = "Dog ID")),
    request_body = UpdateDogRequest,
    responses(
        (status = 200, description = "Dog updated", body = Dog),
        (status = 403, description = "Not allowed to modify this dog", body = ApiError),
        (status = 404, description = "Dog not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_dog(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(dog_id): Path<Uuid>,
    Json(payload): Json<UpdateDogRequest>,
) -> ApiResult<Json<Dog>> {
    payload.validate().map_err(validation_error)?;
    let birth_date = parse_birth_date(payload.birth_date.as_deref())?;

    let dog = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_dog(&mut conn, dog_id)?
    };

    state
        .authorizer
        .ensure(&subject, Operation::Update, &Resource::Dog(dog_ref(&dog)))
        .await?;

    let changes = DogChanges {
        name: payload.name.map(|n| n.trim().to_string()),
        breed: payload.breed,
        birth_date,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = get_db_conn(&state.db_pool)?;
    let dog = diesel::update(dogs::table.find(dog_id))
        .set(&changes)
        .returning(Dog::as_returning())
        .get_result(&mut conn)
        .map_err(db_err)?;

    Ok(Json(dog))
}

#[utoipa::path(
    delete,
    path = "/dogs/{id}",
    tag = "Dogs",
    params(("id" = Uuid, Path, description = "Dog ID")),
    responses(
        (status = 204, description = "Dog deleted"),
        (status = 403, description = "Not allowed to delete this dog", body = ApiError),
        (status = 404, description = "Dog not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_dog(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(dog_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let dog = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_dog(&mut conn, dog_id)?
    };

    state
        .authorizer
        .ensure(&subject, Operation::Delete, &Resource::Dog(dog_ref(&dog)))
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    diesel::delete(dogs::table.find(dog_id))
        .execute(&mut conn)
        .map_err(db_err)?;

    info!(dog_id = %dog_id, deleted_by = %subject.user_id, "Dog deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_birth_date() {
        let parsed = parse_birth_date(Some("2021-05-04T10:00:00+02:00")).unwrap().unwrap();
        assert_eq!(parsed.to_string(), "2021-05-04 08:00:00");
        assert!(parse_birth_date(None).unwrap().is_none());
        assert!(parse_birth_date(Some("04/05/2021")).is_err());
    }

    #[test]
    fn test_create_dog_validation() {
        let request = CreateDogRequest {
            name: "R".to_string(),
            breed: None,
            birth_date: None,
        };
        assert!(request.validate().is_err());
    }
}
