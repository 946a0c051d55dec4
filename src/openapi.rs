//! OpenAPI documentation, served through Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{auth, comments, consultants, dogs, events, health, invites, notes, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pawtrack API",
        version = "1.0.0",
        description = "Pet-care tracking: dogs, events, comments and consultant notes.\n\n\
        ## Access model\n\
        Every request is decided from the caller's role (owner, consultant, admin), \
        the permissions granted to the caller, and for consultants the dogs they \
        were invited to.\n\n\
        ## Authentication\n\
        1. Register or login to get an access token\n\
        2. Include the token in requests: `Authorization: Bearer <token>`",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Authentication", description = "Registration, login and the current user"),
        (name = "Permissions", description = "Per-user permission grants"),
        (name = "Dogs", description = "Dogs and their owners"),
        (name = "Events", description = "Walks, feeding, medication and other dog events"),
        (name = "Comments", description = "Comment threads on events"),
        (name = "Consultant Notes", description = "Private notes written by consultants"),
        (name = "Consultants", description = "Consultant profiles, search and invitations"),
        (name = "Invites", description = "Invite redemption")
    ),
    paths(
        health::health_check,
        health::ready_check,

        auth::register,
        auth::register_owner,
        auth::register_consultant,
        auth::login,
        auth::me,

        users::my_permissions,
        users::user_permissions,
        users::grant_user_permission,
        users::revoke_user_permission,

        dogs::create_dog,
        dogs::list_dogs,
        dogs::get_dog,
        dogs::update_dog,
        dogs::delete_dog,

        events::create_event,
        events::list_events,
        events::get_event,
        events::delete_event,

        comments::create_comment,
        comments::list_comments,
        comments::get_comment,
        comments::update_comment,
        comments::delete_comment,

        notes::create_note,
        notes::list_notes,
        notes::get_note,
        notes::update_note,
        notes::delete_note,

        consultants::upsert_profile,
        consultants::get_consultant,
        consultants::search_consultants,
        consultants::invite_consultant,

        invites::accept_invite,
    ),
    components(
        schemas(
            crate::error::ApiError,
            crate::pagination::PaginationMeta,
            crate::handlers::SortOrder,
            crate::access::InviteStatus,

            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::UserResponse,

            users::PermissionsResponse,
            users::GrantPermissionRequest,

            crate::models::Dog,
            dogs::CreateDogRequest,
            dogs::UpdateDogRequest,

            crate::models::Event,
            events::CreateEventRequest,
            events::EventSortField,

            comments::CommentRequest,
            comments::CommentResponse,

            crate::models::ConsultantNote,
            notes::CreateNoteRequest,
            notes::UpdateNoteRequest,
            notes::NoteSortField,

            crate::models::ConsultantProfile,
            consultants::ProfileRequest,
            consultants::ConsultantResponse,
            consultants::InviteRequest,
            consultants::InviteResponse,

            crate::models::Invite,
            crate::models::ConsultantAccess,
            invites::AcceptInviteResponse,

            health::HealthResponse,
            health::ReadinessResponse,
            health::ReadinessChecks,
            health::ComponentStatus,
            health::CheckState,
            health::Readiness,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token from /auth/login or /auth/register.\n\
                            Send as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
