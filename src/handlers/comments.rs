//! Comment threads on events.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{DogRef, Operation, Resource, Subject},
    error::{db_err, get_db_conn, ApiError, ApiResult},
    handlers::{event_dog, validation_error},
    models::{Event, EventComment, NewEventComment},
    schema::{event_comments, events, users},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    #[schema(example = "He pulled on the leash less today")]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[schema(example = "Ana")]
    pub author_name: String,
    #[schema(example = "consultant")]
    pub author_role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CommentResponse {
    fn new(comment: EventComment, author_name: String, author_role: String) -> Self {
        Self {
            id: comment.id,
            event_id: comment.event_id,
            user_id: comment.user_id,
            content: comment.content,
            author_name,
            author_role,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

fn event_and_dog(conn: &mut PgConnection, event_id: Uuid) -> ApiResult<Option<DogRef>> {
    let event: Event = events::table
        .find(event_id)
        .select(Event::as_select())
        .first(conn)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| ApiError::not_found("Event not found", "EVENT_NOT_FOUND"))?;
    event_dog(conn, &event)
}

/// Loads a comment with its author and the dog of its event.
fn load_comment(
    conn: &mut PgConnection,
    comment_id: Uuid,
) -> ApiResult<(EventComment, String, String, Option<DogRef>)> {
    let (comment, name, role): (EventComment, String, String) = event_comments::table
        .inner_join(users::table)
        .filter(event_comments::id.eq(comment_id))
        .select((EventComment::as_select(), users::name, users::role))
        .first(conn)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| ApiError::not_found("Comment not found", "COMMENT_NOT_FOUND"))?;
    let dog = event_and_dog(conn, comment.event_id)?;
    Ok((comment, name, role, dog))
}

#[utoipa::path(
    post,
    path = "/events/{id}/comments",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 403, description = "No access to the event's dog", body = ApiError),
        (status = 404, description = "Event not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    payload.validate().map_err(validation_error)?;

    let event_dog = {
        let mut conn = get_db_conn(&state.db_pool)?;
        event_and_dog(&mut conn, event_id)?
    };

    state
        .authorizer
        .ensure(&subject, Operation::Create, &Resource::EventComments { event_dog })
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let comment: EventComment = diesel::insert_into(event_comments::table)
        .values(&NewEventComment {
            event_id,
            user_id: subject.user_id,
            content: payload.content,
        })
        .returning(EventComment::as_returning())
        .get_result(&mut conn)
        .map_err(db_err)?;

    let (name, role): (String, String) = users::table
        .find(subject.user_id)
        .select((users::name, users::role))
        .first(&mut conn)
        .map_err(db_err)?;

    Ok((StatusCode::CREATED, Json(CommentResponse::new(comment, name, role))))
}

#[utoipa::path(
    get,
    path = "/events/{id}/comments",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (
            status = 200,
            description = "Comments on the event, oldest first",
            body = [CommentResponse]
        ),
        (status = 403, description = "No access to the event's dog", body = ApiError),
        (status = 404, description = "Event not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let event_dog = {
        let mut conn = get_db_conn(&state.db_pool)?;
        event_and_dog(&mut conn, event_id)?
    };

    state
        .authorizer
        .ensure(&subject, Operation::List, &Resource::EventComments { event_dog })
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let rows: Vec<(EventComment, String, String)> = event_comments::table
        .inner_join(users::table)
        .filter(event_comments::event_id.eq(event_id))
        .order(event_comments::created_at.asc())
        .select((EventComment::as_select(), users::name, users::role))
        .load(&mut conn)
        .map_err(db_err)?;

    Ok(Json(
        rows.into_iter()
            .map(|(comment, name, role)| CommentResponse::new(comment, name, role))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/event-comments/{id}",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment", body = CommentResponse),
        (status = 403, description = "No access to the event's dog", body = ApiError),
        (status = 404, description = "Comment not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<CommentResponse>> {
    let (comment, name, role, event_dog) = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_comment(&mut conn, comment_id)?
    };

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Read,
            &Resource::EventComment {
                author_id: comment.user_id,
                event_dog,
            },
        )
        .await?;

    Ok(Json(CommentResponse::new(comment, name, role)))
}

#[utoipa::path(
    put,
    path = "/event-comments/{id}",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 403, description = "Only the author can edit", body = ApiError),
        (status = 404, description = "Comment not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    payload.validate().map_err(validation_error)?;

    let (comment, name, role, event_dog) = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_comment(&mut conn, comment_id)?
    };

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Update,
            &Resource::EventComment {
                author_id: comment.user_id,
                event_dog,
            },
        )
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let updated: EventComment = diesel::update(event_comments::table.find(comment_id))
        .set((
            event_comments::content.eq(payload.content),
            event_comments::updated_at.eq(Utc::now().naive_utc()),
        ))
        .returning(EventComment::as_returning())
        .get_result(&mut conn)
        .map_err(db_err)?;

    Ok(Json(CommentResponse::new(updated, name, role)))
}

#[utoipa::path(
    delete,
    path = "/event-comments/{id}",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Only the author can delete", body = ApiError),
        (status = 404, description = "Comment not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (comment, _, _, event_dog) = {
        let mut conn = get_db_conn(&state.db_pool)?;
        load_comment(&mut conn, comment_id)?
    };

    state
        .authorizer
        .ensure(
            &subject,
            Operation::Delete,
            &Resource::EventComment {
                author_id: comment.user_id,
                event_dog,
            },
        )
        .await?;

    let mut conn = get_db_conn(&state.db_pool)?;
    diesel::delete(event_comments::table.find(comment_id))
        .execute(&mut conn)
        .map_err(db_err)?;

    Ok(StatusCode::NO_CONTENT)
}
