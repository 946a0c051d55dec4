//! Event log: walks, feeding, medication and the like.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{
        catalog::{EVENTS_VIEW_ALL, EVENTS_VIEW_ASSIGNED, EVENTS_VIEW_OWN},
        Operation, Resource, Role, Subject,
    },
    error::{db_err, get_db_conn, ApiError, ApiResult},
    handlers::{day_range, dog_ref, event_dog, like_pattern, load_dog, validation_error, SortOrder},
    models::{Event, NewEvent},
    pagination::{PaginatedResponse, PaginationParams},
    schema::{consultant_access, dogs, events},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEventRequest {
    pub dog_id: Option<Uuid>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50, message = "Type must be 1-50 characters"))]
    #[schema(example = "walk")]
    pub event_type: String,
    #[validate(length(max = 255, message = "Note must be at most 255 characters"))]
    #[schema(example = "45 minutes in the park")]
    pub note: Option<String>,
    /// When the event happened. Defaults to now.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventSortField {
    #[default]
    CreatedAt,
    At,
    Type,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEventsQuery {
    /// First day to include (YYYY-MM-DD).
    pub from_date: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD).
    pub to_date: Option<NaiveDate>,
    /// Comma separated event types.
    #[param(example = "walk,feeding")]
    pub types: Option<String>,
    /// Substring of the note or the dog's name.
    pub search: Option<String>,
    /// Exact dog name.
    pub dog_name: Option<String>,
    #[param(inline)]
    pub sort_by: Option<EventSortField>,
    #[param(inline)]
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListEventsQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams::from_parts(self.page, self.per_page)
    }

    fn type_list(&self) -> Vec<String> {
        self.types
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Events visible to `role`, narrowed by the query filters.
fn filtered_events(
    subject: &Subject,
    role: Role,
    query: &ListEventsQuery,
) -> events::BoxedQuery<'static, Pg> {
    let mut q = events::table.into_boxed();

    q = match role {
        Role::Admin => q,
        Role::Owner => q.filter(
            events::dog_id.eq_any(
                dogs::table
                    .filter(dogs::owner_id.eq(subject.user_id))
                    .select(dogs::id.nullable()),
            ),
        ),
        Role::Consultant => q.filter(
            events::dog_id.eq_any(
                consultant_access::table
                    .filter(consultant_access::consultant_id.eq(subject.user_id))
                    .filter(consultant_access::revoked_at.is_null())
                    .select(consultant_access::dog_id.nullable()),
            ),
        ),
    };

    let (start, end) = day_range(query.from_date, query.to_date);
    if let Some(start) = start {
        q = q.filter(events::at.ge(start));
    }
    if let Some(end) = end {
        q = q.filter(events::at.lt(end));
    }

    let types = query.type_list();
    if !types.is_empty() {
        q = q.filter(events::event_type.eq_any(types));
    }

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(term);
        q = q.filter(
            events::note.ilike(pattern.clone()).or(events::dog_id.eq_any(
                dogs::table
                    .filter(dogs::name.ilike(pattern))
                    .select(dogs::id.nullable()),
            )),
        );
    }

    if let Some(name) = query.dog_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        q = q.filter(
            events::dog_id.eq_any(
                dogs::table
                    .filter(dogs::name.eq(name.to_string()))
                    .select(dogs::id.nullable()),
            ),
        );
    }

    q
}

#[utoipa::path(
    post,
    path = "/events",
    tag = "Events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "No access to the dog", body = ApiError),
        (status = 404, description = "Dog not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(payload): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    payload.validate().map_err(validation_error)?;

    let dog = match payload.dog_id {
        Some(dog_id) => {
            let mut conn = get_db_conn(&state.db_pool)?;
            Some(dog_ref(&load_dog(&mut conn, dog_id)?))
        }
        None => None,
    };

    state
        .authorizer
        .ensure(&subject, Operation::Create, &Resource::Event { dog })
        .await?;

    let new_event = NewEvent {
        dog_id: payload.dog_id,
        event_type: payload.event_type.trim().to_string(),
        note: payload.note,
        at: payload.at.unwrap_or_else(Utc::now).naive_utc(),
    };

    let mut conn = get_db_conn(&state.db_pool)?;
    let event = diesel::insert_into(events::table)
        .values(&new_event)
        .returning(Event::as_returning())
        .get_result(&mut conn)
        .map_err(db_err)?;

    info!(event_id = %event.id, dog_id = ?event.dog_id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    params(ListEventsQuery),
    responses(
        (
            status = 200,
            description = "Events visible to the caller",
            body = PaginatedResponse<Event>
        ),
        (status = 403, description = "Missing event view permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Json<PaginatedResponse<Event>>> {
    let params = query.pagination();

    // Unlike the other lists, an unrecognized role sees an empty page here.
    let Some(role) = subject.role else {
        return Ok(Json(PaginatedResponse::empty(&params)));
    };

    state
        .authorizer
        .require_any_permission(
            &subject,
            &[EVENTS_VIEW_OWN, EVENTS_VIEW_ASSIGNED, EVENTS_VIEW_ALL],
        )
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let (limit, offset) = params.limit_offset();

    let total: i64 = filtered_events(&subject, role, &query)
        .count()
        .get_result(&mut conn)
        .map_err(db_err)?;

    let q = filtered_events(&subject, role, &query);
    let q = match (
        query.sort_by.unwrap_or_default(),
        query.sort_order.unwrap_or_default(),
    ) {
        (EventSortField::CreatedAt, SortOrder::Asc) => q.order(events::created_at.asc()),
        (EventSortField::CreatedAt, SortOrder::Desc) => q.order(events::created_at.desc()),
        (EventSortField::At, SortOrder::Asc) => q.order(events::at.asc()),
        (EventSortField::At, SortOrder::Desc) => q.order(events::at.desc()),
        (EventSortField::Type, SortOrder::Asc) => q.order(events::event_type.asc()),
        (EventSortField::Type, SortOrder::Desc) => q.order(events::event_type.desc()),
    };

    let items = q
        .then_order_by(events::id.asc())
        .limit(limit)
        .offset(offset)
        .select(Event::as_select())
        .load(&mut conn)
        .map_err(db_err)?;

    Ok(Json(PaginatedResponse::from_params(items, &params, total)))
}

fn load_event(
    state: &AppState,
    event_id: Uuid,
) -> ApiResult<(Event, Option<crate::access::DogRef>)> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let event: Event = events::table
        .find(event_id)
        .select(Event::as_select())
        .first(&mut conn)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| ApiError::not_found("Event not found", "EVENT_NOT_FOUND"))?;
    let dog = event_dog(&mut conn, &event)?;
    Ok((event, dog))
}

#[utoipa::path(
    get,
    path = "/events/{id}",
    tag = "Events",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event", body = Event),
        (status = 403, description = "No access to the event's dog", body = ApiError),
        (status = 404, description = "Event not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_event(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    let (event, dog) = load_event(&state, event_id)?;

    state
        .authorizer
        .ensure(&subject, Operation::Read, &Resource::Event { dog })
        .await?;

    Ok(Json(event))
}

#[utoipa::path(
    delete,
    path = "/events/{id}",
    tag = "Events",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 403, description = "No access to the event's dog", body = ApiError),
        (status = 404, description = "Event not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (_, dog) = load_event(&state, event_id)?;

    state
        .authorizer
        .ensure(&subject, Operation::Delete, &Resource::Event { dog })
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    diesel::delete(events::table.find(event_id))
        .execute(&mut conn)
        .map_err(db_err)?;

    info!(event_id = %event_id, deleted_by = %subject.user_id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}
