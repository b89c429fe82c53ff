/// Router assembly and shared state
///
/// [`build_router`] wires every route group, hangs the bearer-auth layer on
/// the authenticated groups, and applies CORS and request tracing on the
/// outside. [`AppState`] is the only state handlers see.

use crate::config::Config;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskboard_shared::auth::{context::AuthContext, jwt};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared state cloned into every handler
///
/// The pool is already reference-counted and the config sits behind an
/// `Arc`, so clones are cheap.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Immutable configuration, built once at startup
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Signing key for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the full route tree
///
/// # Surface
///
/// ```text
/// /
/// ├── /health                                      # public
/// ├── /auth/
/// │   ├── POST /register                           # public
/// │   ├── POST /token                              # public
/// │   └── GET  /me                                 # bearer auth
/// ├── /tasks/                                      # bearer auth
/// │   ├── GET/POST /
/// │   ├── GET/PUT/PATCH/DELETE /:id
/// │   ├── POST /bulk-update
/// │   ├── POST /:task_id/dependencies/:depends_on_id
/// │   └── GET  /:task_id/dependencies
/// └── /analytics/                                  # bearer auth
///     ├── GET /task-distribution
///     └── GET /timeline
/// ```
///
/// Bearer auth is a per-group layer rather than a global one so the
/// public routes never see it; CORS and tracing wrap the whole tree.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health));

    // Public auth routes
    let auth_public = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/token", post(routes::auth::token));

    // Authenticated auth routes
    let auth_private = Router::new()
        .route("/me", get(routes::auth::me))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks))
        .route("/", post(routes::tasks::create_task))
        .route("/bulk-update", post(routes::tasks::bulk_update_tasks))
        .route("/:id", get(routes::tasks::get_task))
        .route("/:id", put(routes::tasks::update_task))
        .route("/:id", patch(routes::tasks::update_task))
        .route("/:id", delete(routes::tasks::delete_task))
        .route(
            "/:task_id/dependencies/:depends_on_id",
            post(routes::tasks::add_dependency),
        )
        .route(
            "/:task_id/dependencies",
            get(routes::tasks::list_dependencies),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let analytics_routes = Router::new()
        .route(
            "/task-distribution",
            get(routes::analytics::task_distribution),
        )
        .route("/timeline", get(routes::analytics::timeline))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/auth", auth_public.merge(auth_private))
        .nest("/tasks", task_routes)
        .nest("/analytics", analytics_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Middleware guarding the authenticated route groups
///
/// Pulls the bearer token out of the Authorization header, validates it,
/// and stashes the resulting [`AuthContext`] in request extensions for
/// handlers to extract.
async fn bearer_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, crate::error::ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            crate::error::ApiError::Unauthorized("Missing authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        crate::error::ApiError::Unauthorized("Expected a Bearer token".to_string())
    })?;

    let claims = jwt::validate_token(token, state.jwt_secret())?;

    let auth_context = AuthContext::from_claims(&claims);
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
