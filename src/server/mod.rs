pub mod guard;
pub mod handlers;
pub mod state;

use crate::{config::Config, error::Result};
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get},
};
use handlers::{admin, health, statistics, youtube};
use state::AppState;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub const VERSION_HEADER: &str = "x-tubeproxy-version";

/// Add the crate version to every response.
async fn version_header(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        VERSION_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Build state from `config` and return the full application router.
pub async fn build_router(config: Config) -> Result<Router> {
    let state = AppState::new(config).await?;
    Ok(router(state))
}

/// Application router over prepared state.
pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/youtube/v3/search", get(youtube::search))
        .route("/youtube/v3/videos", get(youtube::videos))
        .route("/api/statistics/video/{video_id}", get(statistics::video))
        .route("/api/statistics/videos", get(statistics::videos))
        .route("/api/statistics/top-viewed", get(statistics::top_viewed))
        .route("/api/statistics/summary", get(statistics::summary))
        .route("/api/statistics/cache/clear", delete(admin::clear_all))
        .route("/api/statistics/cache/search", delete(admin::clear_searches))
        .route("/api/statistics/cache/videos", delete(admin::clear_videos))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::guard_middleware,
        ));

    Router::new()
        .route("/", get(health::health_check))
        .route("/health", get(health::health_check))
        .route("/youtube/v3/health", get(health::health_check))
        .route("/metrics", get(handlers::metrics::render))
        .merge(guarded)
        .layer(middleware::from_fn(version_header))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let state = AppState::new(config).await?;

    if let Some(limiter) = state.guard.limiter().cloned() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });
    }

    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
