//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());

    Router::new()
        .route("/health", get(health_handler))
        .route("/lobbies", get(lobbies_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins (comma-separated), or any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .collect();
            base.allow_origin(allowed_origins)
        }
        None => base.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_lobbies: usize,
    active_players: usize,
    connections: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_lobbies: state.registry.active_lobbies(),
        active_players: state.registry.total_players(),
        connections: state.gateway.connection_count(),
    })
}

// ============================================================================
// Lobby browser
// ============================================================================

#[derive(Serialize)]
struct LobbiesResponse {
    lobbies: Vec<String>,
}

async fn lobbies_handler(State(state): State<AppState>) -> Json<LobbiesResponse> {
    Json(LobbiesResponse {
        lobbies: state.registry.list_names(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn get_json(router: Router, uri: &str) -> serde_json::Value {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_lobbies_and_players() {
        let state = AppState::new(Config::default());
        let handle = state.registry.create("cup").unwrap();
        handle.join(Uuid::new_v4(), "Ann").unwrap();

        let json = get_json(build_router(state), "/health").await;

        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_lobbies"], 1);
        assert_eq!(json["active_players"], 1);
        assert_eq!(json["connections"], 0);
    }

    #[tokio::test]
    async fn lobbies_lists_names() {
        let state = AppState::new(Config::default());
        state.registry.create("beta").unwrap();
        state.registry.create("alpha").unwrap();

        let json = get_json(build_router(state), "/lobbies").await;

        assert_eq!(json["lobbies"], serde_json::json!(["alpha", "beta"]));
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let state = AppState::new(Config::default());
        let response = build_router(state)
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
