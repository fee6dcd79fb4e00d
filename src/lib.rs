//! ProjectHub - project collaboration backend with memberships, tasks and live notifications.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod realtime;
pub mod schema;
pub mod services;
pub mod telemetry;

#[cfg(test)]
mod testing;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use auth::{PasswordPolicy, TokenIssuer};
use config::PageSizeConfig;
use error::ApiError;
use middleware::{metrics::metrics_middleware, request_id::request_id_middleware};
use realtime::{ConnectionRegistry, InMemoryConnectionRegistry};
use services::NotificationDispatcher;
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Per-connection SQLite settings applied when the pool opens a connection.
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL;",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub token_issuer: Arc<TokenIssuer>,
    pub registry: Arc<dyn ConnectionRegistry>,
    pub dispatcher: NotificationDispatcher,
    pub metrics: MetricsState,
    pub password_policy: PasswordPolicy,
    pub password_hash_cost: u32,
    pub pages: PageSizeConfig,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &Config) -> Self {
        let token_issuer =
            TokenIssuer::from_env(config.jwt.access_token_expiry_secs, config.jwt.issuer.clone());
        Self::with_token_issuer(db_pool, token_issuer, config)
    }

    pub fn with_token_issuer(db_pool: DbPool, token_issuer: TokenIssuer, config: &Config) -> Self {
        let password_policy = if config.security.require_password_complexity {
            PasswordPolicy::complex(config.security.min_password_length)
        } else {
            PasswordPolicy {
                min_length: config.security.min_password_length,
                ..Default::default()
            }
        };

        let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());

        Self {
            db_pool,
            token_issuer: Arc::new(token_issuer),
            dispatcher: NotificationDispatcher::new(registry.clone()),
            registry,
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
            password_policy,
            password_hash_cost: config.security.password_hash_cost,
            pages: config.pages,
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .route("/notifhub", get(realtime::socket::notification_hub))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::get_current_user))
        .route(
            "/projects",
            post(handlers::projects::create_project).get(handlers::projects::list_projects),
        )
        .route("/projects/recent", get(handlers::projects::recent_projects))
        .route("/projects/code/{code}", get(handlers::projects::project_by_code))
        .route(
            "/projects/{project_id}",
            get(handlers::projects::get_project).put(handlers::projects::update_project),
        )
        .route("/projects/{project_id}/open", post(handlers::projects::open_project))
        .route(
            "/projects/{project_id}/history",
            get(handlers::projects::project_history),
        )
        .route(
            "/projects/{project_id}/members",
            get(handlers::members::list_members).post(handlers::members::add_member),
        )
        .route(
            "/members/{member_id}",
            put(handlers::members::update_member).delete(handlers::members::remove_member),
        )
        .route("/projects/{project_id}/leave", post(handlers::members::leave_project))
        .route(
            "/projects/{project_id}/invitations",
            post(handlers::invitations::invite),
        )
        .route("/invitations", get(handlers::invitations::pending_invitations))
        .route(
            "/invitations/{invitation_id}/accept",
            post(handlers::invitations::accept_invitation),
        )
        .route("/requests", post(handlers::requests::request_join))
        .route(
            "/projects/{project_id}/requests",
            get(handlers::requests::list_requests),
        )
        .route("/requests/{request_id}", put(handlers::requests::resolve_request))
        .route(
            "/projects/{project_id}/tasks",
            post(handlers::tasks::create_task).get(handlers::tasks::list_tasks),
        )
        .route(
            "/tasks/{task_id}",
            get(handlers::tasks::get_task)
                .put(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        .route("/tasks/{task_id}/assignees", put(handlers::tasks::update_assignees))
        .route("/tasks/{task_id}/history", get(handlers::tasks::task_history))
        .route(
            "/tasks/{task_id}/comments",
            post(handlers::comments::add_comment).get(handlers::comments::list_comments),
        )
        .route(
            "/comment-attachments/{attachment_id}",
            get(handlers::comments::download_comment_attachment),
        )
        .route(
            "/tasks/{task_id}/attachments",
            post(handlers::attachments::upload_attachment)
                .get(handlers::attachments::list_attachments),
        )
        .route(
            "/attachments/{attachment_id}",
            get(handlers::attachments::download_attachment)
                .delete(handlers::attachments::delete_attachment),
        )
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route(
            "/notifications/read-all",
            put(handlers::notifications::mark_all_read),
        )
        .route(
            "/notifications/{notification_id}/read",
            put(handlers::notifications::mark_read),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state);

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new("Not found", "NOT_FOUND")),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let cors = if is_wildcard_origin && config.cors.allow_credentials {
        // Browsers reject `*` with credentials; echo the caller's origin instead.
        CorsLayer::new().allow_origin(tower_http::cors::AllowOrigin::mirror_request())
    } else if is_wildcard_origin {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(config.cors.allow_credentials)
        .max_age(Duration::from_secs(config.cors.max_age_secs))
}

pub fn create_db_pool(config: &config::Config) -> DbPool {
    build_pool(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.connection_timeout_secs),
    )
}

pub fn create_db_pool_with_url(database_url: &str) -> DbPool {
    build_pool(database_url, 4, Duration::from_secs(10))
}

fn build_pool(database_url: &str, max_size: u32, connection_timeout: Duration) -> DbPool {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(max_size)
        .connection_timeout(connection_timeout)
        .connection_customizer(Box::new(SqlitePragmas {
            busy_timeout_ms: 5_000,
        }))
        .build(manager)
        .expect("Failed to create database pool")
}

/// Applies any migrations not yet recorded in the database.
pub fn run_migrations(pool: &DbPool) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    for version in &applied {
        info!(version = %version, "Applied migration");
    }
    Ok(applied.len())
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::tracing::shutdown_telemetry;

pub use config::Config;
