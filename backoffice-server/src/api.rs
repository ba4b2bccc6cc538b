//! HTTP API: routes, handlers and shared state

pub mod auth;
pub mod error;
pub mod health;
pub mod middleware;
pub mod users;

pub use error::{ApiError, ValidatedJson};

use crate::config::{AppConfig, ServerConfig, ServerMode};
use crate::database::DatabaseManager;
use crate::services::{AuthService, UserService};
use axum::{
    Router,
    routing::{get, post},
};
use backoffice_core::TokenService;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    catch_panic::CatchPanicLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseManager>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub started_at: Instant,
}

impl AppState {
    /// Build the services over an already populated manager
    pub fn new(config: Arc<AppConfig>, db: Arc<DatabaseManager>) -> Self {
        let tokens = TokenService::new(
            &config.jwt.secret,
            config.jwt.issuer.clone(),
            config.jwt.expiration,
        );

        Self {
            auth: Arc::new(AuthService::new(Arc::clone(&db), tokens)),
            users: Arc::new(UserService::new(Arc::clone(&db))),
            config,
            db,
            started_at: Instant::now(),
        }
    }
}

/// The full application router with its middleware stack
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/refresh", post(auth::refresh));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        );

    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/users", user_routes);

    with_middleware(routes, &state.config.server).with_state(state)
}

/// Request logging, timeouts and panic recovery, outermost last
fn with_middleware<S>(routes: Router<S>, server: &ServerConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let routes = routes
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(TimeoutLayer::new(server.write_timeout))
        .layer(RequestBodyTimeoutLayer::new(server.read_timeout));

    let routes = match server.mode {
        ServerMode::Debug => routes.layer(TraceLayer::new_for_http()),
        ServerMode::Release | ServerMode::Test => routes,
    };

    routes.layer(CatchPanicLayer::custom(error::panic_response))
}
