use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::catalog::Role;
use crate::access::invites::InviteStatus;

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// `None` when the stored role is not one the access model knows about.
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::permissions)]
pub struct Permission {
    pub id: Uuid,
    #[schema(example = "EVENTS_VIEW_OWN")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::user_permissions)]
pub struct UserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub granted_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_permissions)]
pub struct NewUserPermission {
    pub user_id: Uuid,
    pub permission_id: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::consultant_access)]
pub struct ConsultantAccess {
    pub id: Uuid,
    pub consultant_id: Uuid,
    pub dog_id: Uuid,
    pub granted_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
}

impl ConsultantAccess {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::consultant_access)]
pub struct NewConsultantAccess {
    pub consultant_id: Uuid,
    pub dog_id: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::invites)]
pub struct Invite {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub consultant_id: Uuid,
    pub dog_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    #[schema(example = "pending")]
    pub status: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Invite {
    pub fn status(&self) -> Option<InviteStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::invites)]
pub struct NewInvite {
    pub owner_id: Uuid,
    pub consultant_id: Uuid,
    pub dog_id: Uuid,
    pub token_hash: String,
    pub status: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::dogs)]
pub struct Dog {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[schema(example = "Rex")]
    pub name: String,
    #[schema(example = "Border Collie")]
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::dogs)]
pub struct NewDog {
    pub owner_id: Uuid,
    pub name: String,
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDateTime>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::dogs)]
pub struct DogChanges {
    pub name: Option<String>,
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::events)]
pub struct Event {
    pub id: Uuid,
    pub dog_id: Option<Uuid>,
    #[serde(rename = "type")]
    #[schema(example = "walk")]
    pub event_type: String,
    #[schema(example = "45 minutes in the park")]
    pub note: Option<String>,
    pub at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::events)]
pub struct NewEvent {
    pub dog_id: Option<Uuid>,
    pub event_type: String,
    pub note: Option<String>,
    pub at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::event_comments)]
pub struct EventComment {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::event_comments)]
pub struct NewEventComment {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::consultant_notes)]
pub struct ConsultantNote {
    pub id: Uuid,
    pub consultant_id: Uuid,
    pub dog_id: Uuid,
    #[schema(example = "Leash reactivity")]
    pub title: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::consultant_notes)]
pub struct NewConsultantNote {
    pub consultant_id: Uuid,
    pub dog_id: Uuid,
    pub title: String,
    pub content: String,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = crate::schema::consultant_notes)]
pub struct ConsultantNoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::consultant_profiles)]
pub struct ConsultantProfile {
    pub user_id: Uuid,
    pub surname: String,
    pub description: String,
    #[schema(example = "training, behaviour")]
    pub services: String,
    #[schema(example = "border collie, kelpie")]
    pub breeds: String,
    #[schema(example = "Belgrade")]
    pub location: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::consultant_profiles, primary_key(user_id))]
pub struct ConsultantProfileUpsert {
    pub user_id: Uuid,
    pub surname: String,
    pub description: String,
    pub services: String,
    pub breeds: String,
    pub location: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::outbox_events)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
    pub published: bool,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::outbox_events)]
pub struct NewOutboxEvent {
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
}
