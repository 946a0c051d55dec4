//! Pawtrack - dog care tracking for owners and the consultants they invite.

pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod schema;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use diesel::r2d2::{self, ConnectionManager, PoolError};
use diesel::PgConnection;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use access::{AppAuthorizer, Authorizer, InviteService, PgAccessGrants, PgPermissionStore};
use auth::{JwtConfig, PasswordHasher, PasswordPolicy};
use cache::CacheServices;
use config::DatabaseConfig;
use error::ApiError;
use handlers::{
    auth as auth_h, comments, consultants, dogs, events as events_h, health, invites, notes, users,
};
use telemetry::MetricsState;

pub use config::Config;
pub use telemetry::tracing::shutdown_telemetry;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub jwt_config: Arc<JwtConfig>,
    pub cache: CacheServices,
    pub permissions: PgPermissionStore,
    pub authorizer: Arc<AppAuthorizer>,
    pub invites: InviteService,
    pub password_policy: PasswordPolicy,
    pub password_hasher: PasswordHasher,
    pub metrics: MetricsState,
}

impl AppState {
    /// Wires the stores and services. Without a Redis pool, permission
    /// lookups go straight to Postgres.
    pub fn new(
        db_pool: DbPool,
        redis_pool: Option<deadpool_redis::Pool>,
        jwt_config: JwtConfig,
        config: &Config,
    ) -> Self {
        let cache = CacheServices::new(redis_pool, config.redis.permission_cache_ttl_secs);
        let permissions = PgPermissionStore::new(db_pool.clone(), cache.permission_cache.clone());
        let authorizer = Authorizer::new(permissions.clone(), PgAccessGrants::new(db_pool.clone()));

        let security = &config.security;
        let password_policy = if security.require_password_complexity {
            PasswordPolicy::strict(security.min_password_length)
        } else {
            PasswordPolicy {
                min_length: security.min_password_length,
                ..Default::default()
            }
        };

        Self {
            jwt_config: Arc::new(jwt_config),
            authorizer: Arc::new(authorizer),
            invites: InviteService::new(security.invite_ttl_hours),
            password_hasher: PasswordHasher::new(security.password_hash_cost),
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
            password_policy,
            permissions,
            cache,
            db_pool,
        }
    }
}

fn public_routes(state: &AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::ready_check))
        .route("/auth/register", post(auth_h::register))
        .route("/auth/register/owner", post(auth_h::register_owner))
        .route("/auth/register/consultant", post(auth_h::register_consultant))
        .route("/auth/login", post(auth_h::login))
        .with_state(state.clone())
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(state.metrics.clone()),
        )
}

/// Everything behind a bearer token. Handlers receive the caller as an
/// `Extension<Subject>`.
fn protected_routes(state: &AppState) -> Router {
    Router::new()
        .route("/auth/me", get(auth_h::me))
        .route("/users/me/permissions", get(users::my_permissions))
        .route(
            "/users/{id}/permissions",
            get(users::user_permissions).post(users::grant_user_permission),
        )
        .route("/users/{id}/permissions/{name}", delete(users::revoke_user_permission))
        .route("/dogs", get(dogs::list_dogs).post(dogs::create_dog))
        .route(
            "/dogs/{id}",
            get(dogs::get_dog).put(dogs::update_dog).delete(dogs::delete_dog),
        )
        .route("/events", get(events_h::list_events).post(events_h::create_event))
        .route("/events/{id}", get(events_h::get_event).delete(events_h::delete_event))
        .route(
            "/events/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/event-comments/{id}",
            get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        )
        .route("/consultant-notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/consultant-notes/{id}",
            get(notes::get_note).put(notes::update_note).delete(notes::delete_note),
        )
        .route("/consultants", get(consultants::search_consultants))
        .route("/consultants/profile", put(consultants::upsert_profile))
        .route("/consultants/{id}", get(consultants::get_consultant))
        .route("/consultants/{id}/invite", post(consultants::invite_consultant))
        .route("/invites/accept", post(invites::accept_invite))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state.clone())
}

pub fn create_router(state: AppState, config: &Config) -> Router {
    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));
    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .merge(openapi::swagger_router())
        .merge(public_routes(&state))
        .merge(protected_routes(&state))
        .fallback(not_found)
        .layer(axum_middleware::from_fn(middleware::metrics_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(trace)
        .layer(timeout)
        .layer(RequestBodyLimitLayer::new(config.server.max_body_size))
        .layer(cors_layer(config))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiError::new("Not found", "NOT_FOUND")))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = &config.cors;
    let any_origin =
        cors.allowed_origins.is_empty() || cors.allowed_origins.iter().any(|o| o == "*");

    let origin = if !any_origin {
        AllowOrigin::list(cors.allowed_origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()))
    } else if cors.allow_credentials {
        // A literal `*` is not allowed together with credentials.
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(
            cors.allowed_methods
                .iter()
                .filter_map(|m| m.parse::<Method>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_headers(
            cors.allowed_headers
                .iter()
                .filter_map(|h| h.parse::<HeaderName>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_credentials(cors.allow_credentials)
        .max_age(Duration::from_secs(cors.max_age_secs))
}

fn build_db_pool(database: &DatabaseConfig) -> Result<DbPool, PoolError> {
    r2d2::Pool::builder()
        .max_size(database.max_connections)
        .min_idle(Some(database.min_connections))
        .connection_timeout(Duration::from_secs(database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(database.idle_timeout_secs)))
        .build(ConnectionManager::<PgConnection>::new(&database.url))
}

pub fn create_db_pool(config: &Config) -> Result<DbPool, PoolError> {
    build_db_pool(&config.database)
}

/// Pool for an explicit URL, sized like the `DATABASE_*` defaults.
pub fn create_db_pool_with_url(database_url: &str) -> Result<DbPool, PoolError> {
    build_db_pool(&DatabaseConfig {
        url: database_url.to_owned(),
        max_connections: 10,
        min_connections: 2,
        connection_timeout_secs: 30,
        idle_timeout_secs: 600,
    })
}

pub fn init_tracing(config: &Config) {
    telemetry::init_telemetry(config);
}
