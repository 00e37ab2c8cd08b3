/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use reltrack_api::{app::AppState, config::Config};
/// use reltrack_shared::registry::PypiClient;
/// use reltrack_shared::store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = Arc::new(MemoryStore::new());
/// let pypi = PypiClient::new(&config.registry.base_url, config.registry.lookup_timeout())?;
/// let state = AppState::new(config, store.clone(), store, Arc::new(pypi));
/// let app = reltrack_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use reltrack_shared::auth::gate::CapabilityGate;
use reltrack_shared::import::Importer;
use reltrack_shared::models::user::UserRole;
use reltrack_shared::registry::{RegistryLookup, RegistryResolver, ResolverConfig};
use reltrack_shared::releases::ReleaseService;
use reltrack_shared::scan::ScanOrchestrator;
use reltrack_shared::store::{ReleaseStore, UserStore};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is an `Arc` or wraps one, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// User accounts
    pub users: Arc<dyn UserStore>,

    /// Raw release persistence, used for health checks
    pub release_store: Arc<dyn ReleaseStore>,

    /// Token issuing and validation
    pub gate: CapabilityGate,

    /// Capability-checked release operations
    pub releases: ReleaseService,

    /// Manifest scanning
    pub scanner: ScanOrchestrator,

    /// Scan row import
    pub importer: Importer,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        config: Config,
        release_store: Arc<dyn ReleaseStore>,
        users: Arc<dyn UserStore>,
        lookup: Arc<dyn RegistryLookup>,
    ) -> Self {
        let gate = CapabilityGate::new(config.jwt.secret.clone(), users.clone())
            .with_expiration(chrono::Duration::seconds(config.jwt.expiration_seconds));

        let resolver = RegistryResolver::new(
            lookup,
            ResolverConfig {
                max_concurrency: config.registry.max_concurrency,
                lookup_timeout: config.registry.lookup_timeout(),
            },
        );

        Self {
            config: Arc::new(config),
            users,
            gate,
            releases: ReleaseService::new(release_store.clone()),
            scanner: ScanOrchestrator::new(resolver),
            importer: Importer::new(release_store.clone()),
            release_store,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /register         # public
///     │   ├── POST /login            # public
///     │   └── GET  /me               # authenticated
///     ├── /releases/                 # authenticated
///     │   ├── GET    /               # scoped to the caller unless admin
///     │   ├── POST   /               # admin
///     │   ├── POST   /import-scan    # admin
///     │   ├── PATCH  /:id            # owner or admin
///     │   └── DELETE /:id            # owner or admin
///     ├── POST /scan                 # authenticated
///     └── /admin/users/              # admin role
///         ├── GET    /
///         └── DELETE /:id
/// ```
///
/// Capabilities below the role level (owner vs admin, who may import) are
/// decided by the shared services; the middleware here only establishes who
/// is calling.
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes; only /me needs a session
    let auth_routes = Router::new()
        .route(
            "/me",
            get(routes::auth::me).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                jwt_auth_layer,
            )),
        )
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let release_routes = Router::new()
        .route(
            "/",
            get(routes::releases::list_releases).post(routes::releases::create_release),
        )
        .route("/import-scan", post(routes::import::import_scan))
        .route(
            "/:id",
            patch(routes::releases::update_release_status).delete(routes::releases::delete_release),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let scan_routes = Router::new()
        .route("/scan", post(routes::scan::scan_manifest))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id", delete(routes::admin::delete_user))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/releases", release_routes)
        .merge(scan_routes)
        .nest("/admin", admin_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
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
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Extracts the token from an `Authorization: Bearer <token>` header
///
/// Any other scheme counts as no token at all.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn authenticate(
    state: &AppState,
    mut req: Request,
    next: Next,
    required: Option<UserRole>,
) -> Result<Response, ApiError> {
    let principal = state
        .gate
        .authorize(bearer_token(req.headers()), required)
        .await?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token through the capability gate, then injects the
/// resulting `Principal` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, req, next, None).await
}

/// Like [`jwt_auth_layer`], but the caller must hold the admin role
async fn admin_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, req, next, Some(UserRole::Admin)).await
}
