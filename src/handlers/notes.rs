//! Private consultant notes about a dog. Only the author (or an admin) can see them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{
        catalog::{CONSULTANT_NOTES_VIEW_ALL, CONSULTANT_NOTES_VIEW_OWN},
        Operation, Resource, Subject,
    },
    error::{db_err, get_db_conn, ApiError, ApiResult},
    handlers::{day_range, dog_ref, like_pattern, load_dog, validation_error, SortOrder},
    models::{ConsultantNote, ConsultantNoteChanges, NewConsultantNote},
    pagination::{PaginatedResponse, PaginationParams},
    schema::consultant_notes,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNoteRequest {
    pub dog_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    #[schema(example = "Leash reactivity")]
    pub title: String,
    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateNoteRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotesQuery {
    pub dog_id: Option<Uuid>,
    /// Substring of the title or content.
    pub search: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    #[param(inline)]
    pub sort_by: Option<NoteSortField>,
    #[param(inline)]
    pub sort_order: Option<SortOrder>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

fn filtered_notes(
    subject: &Subject,
    query: &ListNotesQuery,
) -> consultant_notes::BoxedQuery<'static, Pg> {
    let mut q = consultant_notes::table.into_boxed();

    if !subject.is_admin() {
        q = q.filter(consultant_notes::consultant_id.eq(subject.user_id));
    }
    if let Some(dog_id) = query.dog_id {
        q = q.filter(consultant_notes::dog_id.eq(dog_id));
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(term);
        q = q.filter(
            consultant_notes::title
                .ilike(pattern.clone())
                .or(consultant_notes::content.ilike(pattern)),
        );
    }

    let (start, end) = day_range(query.from_date, query.to_date);
    if let Some(start) = start {
        q = q.filter(consultant_notes::created_at.ge(start));
    }
    if let Some(end) = end {
        q = q.filter(consultant_notes::created_at.lt(end));
    }

    q
}

fn load_note(state: &AppState, note_id: Uuid) -> ApiResult<ConsultantNote> {
    let mut conn = get_db_conn(&state.db_pool)?;
    consultant_notes::table
        .find(note_id)
        .select(ConsultantNote::as_select())
        .first(&mut conn)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| ApiError::not_found("Note not found", "NOTE_NOT_FOUND"))
}

#[utoipa::path(
    post,
    path = "/consultant-notes",
    tag = "Consultant Notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = ConsultantNote),
        (status = 403, description = "Not a consultant with access to the dog", body = ApiError),
        (status = 404, description = "Dog not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_note(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(payload): Json<CreateNoteRequest>,
) -> ApiResult<(StatusCode, Json<ConsultantNote>)> {
    payload.validate().map_err(validation_error)?;

    let dog = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_dog(&mut conn, payload.dog_id)?
    };

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Create,
            &Resource::NewConsultantNote { dog: dog_ref(&dog) },
        )
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let note = diesel::insert_into(consultant_notes::table)
        .values(&NewConsultantNote {
            consultant_id: subject.user_id,
            dog_id: dog.id,
            title: payload.title,
            content: payload.content,
        })
        .returning(ConsultantNote::as_returning())
        .get_result(&mut conn)
        .map_err(db_err)?;

    info!(note_id = %note.id, dog_id = %note.dog_id, "Consultant note created");
    Ok((StatusCode::CREATED, Json(note)))
}

#[utoipa::path(
    get,
    path = "/consultant-notes",
    tag = "Consultant Notes",
    params(ListNotesQuery),
    responses(
        (
            status = 200,
            description = "The caller's notes (all notes for admins)",
            body = PaginatedResponse<ConsultantNote>
        ),
        (status = 403, description = "Missing note view permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notes(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<ListNotesQuery>,
) -> ApiResult<Json<PaginatedResponse<ConsultantNote>>> {
    state
        .authorizer
        .ensure(&subject, Operation::List, &Resource::ConsultantNotes)
        .await?;
    state
        .authorizer
        .require_any_permission(
            &subject,
            &[CONSULTANT_NOTES_VIEW_OWN, CONSULTANT_NOTES_VIEW_ALL],
        )
        .await?;

    let params = PaginationParams::from_parts(query.page, query.per_page);
    let (limit, offset) = params.limit_offset();

    let mut conn = get_db_conn(&state.db_pool)?;
    let total: i64 = filtered_notes(&subject, &query)
        .count()
        .get_result(&mut conn)
        .map_err(db_err)?;

    let q = filtered_notes(&subject, &query);
    let q = match (
        query.sort_by.unwrap_or_default(),
        query.sort_order.unwrap_or_default(),
    ) {
        (NoteSortField::CreatedAt, SortOrder::Asc) => q.order(consultant_notes::created_at.asc()),
        (NoteSortField::CreatedAt, SortOrder::Desc) => q.order(consultant_notes::created_at.desc()),
        (NoteSortField::UpdatedAt, SortOrder::Asc) => q.order(consultant_notes::updated_at.asc()),
        (NoteSortField::UpdatedAt, SortOrder::Desc) => q.order(consultant_notes::updated_at.desc()),
        (NoteSortField::Title, SortOrder::Asc) => q.order(consultant_notes::title.asc()),
        (NoteSortField::Title, SortOrder::Desc) => q.order(consultant_notes::title.desc()),
    };

    let items = q
        .then_order_by(consultant_notes::id.asc())
        .limit(limit)
        .offset(offset)
        .select(ConsultantNote::as_select())
        .load(&mut conn)
        .map_err(db_err)?;

    Ok(Json(PaginatedResponse::from_params(items, &params, total)))
}

#[utoipa::path(
    get,
    path = "/consultant-notes/{id}",
    tag = "Consultant Notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note", body = ConsultantNote),
        (status = 403, description = "Only the author can read this note", body = ApiError),
        (status = 404, description = "Note not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_note(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Json<ConsultantNote>> {
    let note = load_note(&state, note_id)?;

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Read,
            &Resource::ConsultantNote {
                author_id: note.consultant_id,
            },
        )
        .await?;

    Ok(Json(note))
}

#[utoipa::path(
    put,
    path = "/consultant-notes/{id}",
    tag = "Consultant Notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = ConsultantNote),
        (status = 403, description = "Only the author can edit this note", body = ApiError),
        (status = 404, description = "Note not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_note(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(note_id): Path<Uuid>,
    Json(payload): Json<UpdateNoteRequest>,
) -> ApiResult<Json<ConsultantNote>> {
    payload.validate().map_err(validation_error)?;
    let note = load_note(&state, note_id)?;

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Update,
            &Resource::ConsultantNote {
                author_id: note.consultant_id,
            },
        )
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let note = diesel::update(consultant_notes::table.find(note_id))
        .set(&ConsultantNoteChanges {
            title: payload.title,
            content: payload.content,
            updated_at: Utc::now().naive_utc(),
        })
        .returning(ConsultantNote::as_returning())
        .get_result(&mut conn)
        .map_err(db_err)?;

    Ok(Json(note))
}

#[utoipa::path(
    delete,
    path = "/consultant-notes/{id}",
    tag = "Consultant Notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 403, description = "Only the author can delete this note", body = ApiError),
        (status = 404, description = "Note not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_note(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let note = load_note(&state, note_id)?;

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Delete,
            &Resource::ConsultantNote {
                author_id: note.consultant_id,
            },
        )
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    diesel::delete(consultant_notes::table.find(note_id))
        .execute(&mut conn)
        .map_err(db_err)?;

    Ok(StatusCode::NO_CONTENT)
}
