//! ResQ Backend
//!
//! Disaster-relief coordination service: relief missions with volunteer
//! sign-up and organizer access control, field team dispatch, emergency
//! reports, donations and a community feed. SQLite persistence and Tantivy
//! full-text search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod search;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::PinThrottle;
use config::Config;
use db::Repository;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub throttle: Arc<PinThrottle>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting ResQ Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (RESQ_API_PSK). The API is open to any client");
    }
    if config.pin_max_attempts == 0 {
        tracing::warn!("PIN throttling is disabled (RESQ_PIN_MAX_ATTEMPTS=0)");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    if config.seed_demo {
        repo.seed_demo_field_mission().await?;
    }

    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // The index is derived data; rebuild it from SQLite on every start
    tracing::info!("Building search index...");
    let missions = repo.list_missions().await?;
    search.rebuild(&missions).await?;

    let throttle = Arc::new(PinThrottle::new(
        config.pin_max_attempts,
        config.pin_lockout,
    ));
    let _prune_task = throttle.clone().start_prune_task();

    let state = AppState {
        repo,
        search,
        throttle,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    // Peer addresses key the access-PIN throttle
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Field missions
        .route("/missions/access", post(api::access_mission))
        .route("/missions/create", post(api::dispatch_field_mission))
        // Emergency reports
        .route("/report", post(api::submit_report))
        .route("/reports", get(api::list_reports))
        // Relief missions
        .route(
            "/missions",
            get(api::list_missions).post(api::create_mission),
        )
        .route("/missions/map", get(api::mission_map))
        .route("/missions/{id}", get(api::get_mission))
        .route("/missions/{id}/join", post(api::join_mission))
        .route("/missions/{id}/admin", post(api::unlock_admin))
        .route("/missions/{id}/complete", post(api::complete_mission))
        .route("/missions/{id}/priority", put(api::set_mission_priority))
        // Search
        .route("/search", get(api::search_missions))
        // Donations
        .route(
            "/donations",
            get(api::list_donations).post(api::create_donation),
        )
        .route("/donations/{id}/status", put(api::update_donation_status))
        // Community feed
        .route("/updates", get(api::list_updates).post(api::create_update))
        // Dashboard
        .route("/statistics", get(api::get_statistics))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
