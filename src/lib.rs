//! Sidekiq auth: session tokens, user validation and hierarchical board
//! access control.

pub mod access;
pub mod auth;
pub mod boards;
pub mod cache;
pub mod config;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod telemetry;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use access::{AccessGate, CachePropagator, MembershipService, RoleResolver};
use auth::{TokenService, UserValidator};
use boards::BoardRepository;
use cache::{KvStore, MemoryKvStore, PermissionCache, RedisKvStore};
use grpc::PeopleService;
use middleware::{metrics::metrics_middleware, request_id::request_id_middleware};
use telemetry::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub auth_cookie: Arc<str>,
    pub tokens: Arc<TokenService>,
    pub validator: Arc<UserValidator>,
    pub boards: Arc<dyn BoardRepository>,
    pub permissions: PermissionCache,
    pub resolver: Arc<RoleResolver>,
    pub gate: Arc<AccessGate>,
    pub membership: Arc<MembershipService>,
    pub propagator: Arc<CachePropagator>,
    pub redis_pool: Option<deadpool_redis::Pool>,
    pub metrics: MetricsState,
}

impl AppState {
    /// Wires the services together. Without a Redis pool the permission
    /// cache lives in process memory.
    pub fn new(
        config: &Config,
        people: Arc<dyn PeopleService>,
        boards: Arc<dyn BoardRepository>,
        redis_pool: Option<deadpool_redis::Pool>,
    ) -> Self {
        let store: Arc<dyn KvStore> = match &redis_pool {
            Some(pool) => Arc::new(RedisKvStore::new(pool.clone())),
            None => Arc::new(MemoryKvStore::new()),
        };
        let permissions = PermissionCache::with_max_retries(store, config.access.cache_max_retries);
        info!(backend = permissions.backend(), "Permission cache ready");

        let tokens = Arc::new(TokenService::new(
            &config.jwt.key,
            config.jwt.token_expiration_hours,
        ));
        let validator = Arc::new(
            UserValidator::new(tokens.clone(), people)
                .with_call_timeout(Duration::from_secs(config.people.request_timeout_secs)),
        );

        let max_depth = config.access.hierarchy_max_depth;
        let resolver = Arc::new(RoleResolver::new(
            boards.clone(),
            permissions.clone(),
            max_depth,
        ));
        let gate = Arc::new(AccessGate::new(boards.clone(), resolver.clone()));
        let membership = Arc::new(MembershipService::new(
            boards.clone(),
            permissions.clone(),
            gate.clone(),
            resolver.clone(),
        ));
        let propagator = Arc::new(CachePropagator::new(
            boards.clone(),
            permissions.clone(),
            resolver.clone(),
            max_depth,
        ));

        Self {
            auth_cookie: Arc::from(config.jwt.cookie_name.as_str()),
            tokens,
            validator,
            boards,
            permissions,
            resolver,
            gate,
            membership,
            propagator,
            redis_pool,
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
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
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(state.metrics.clone()),
        )
        .route("/auth", post(handlers::auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::get_current_user))
        .route("/boards", post(handlers::boards::create_board))
        .route("/boards/{board_id}", delete(handlers::boards::delete_board))
        .route(
            "/boards/{board_id}/role",
            get(handlers::boards::get_board_role),
        )
        .route(
            "/boards/{board_id}/permissions/check",
            post(handlers::boards::check_board_permission),
        )
        .route("/boards/{board_id}/members", post(handlers::members::add_member))
        .route(
            "/boards/{board_id}/members/{profile_id}",
            delete(handlers::members::remove_member),
        )
        .route(
            "/boards/{board_id}/members/{profile_id}/role",
            put(handlers::members::change_member_role),
        )
        .route("/boards/{board_id}/block", post(handlers::members::block_profiles))
        .route("/boards/{board_id}/unblock", post(handlers::members::unblock_profiles))
        .route(
            "/boards/{board_id}/follow",
            post(handlers::members::follow_board).delete(handlers::members::unfollow_board),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(openapi::swagger_router())
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
        Json(error::ApiError::new("Not found", "NOT_FOUND")),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;
    use tower_http::cors::AllowOrigin;

    let cors = &config.cors;
    let wildcard = cors.allowed_origins.is_empty() || cors.allowed_origins.iter().any(|o| o == "*");

    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    let headers: Vec<HeaderName> = cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    // Credentials forbid a literal `*` origin, so wildcard mirrors the caller.
    let origin = match (wildcard, cors.allow_credentials) {
        (true, true) => AllowOrigin::mirror_request(),
        (true, false) => AllowOrigin::from(Any),
        (false, _) => AllowOrigin::list(
            cors.allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<axum::http::HeaderValue>>(),
        ),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(cors.allow_credentials)
        .max_age(Duration::from_secs(cors.max_age_secs))
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::tracing::shutdown_telemetry;

pub use config::Config;
