//! HTTP Endpoints
//!
//! Health, readiness, pool snapshots, and Prometheus metrics.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Pool diagnostics
        .route("/pools", get(list_pools))
        .route("/pools/:name", get(get_pool))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // Admin endpoints
        .route("/admin/reload-config", post(reload_config))
        .layer(TraceLayer::new_for_http())
        // Read-only diagnostics surface
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ready once every registered pool reports ready
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshots = state.registry.snapshots().await;
    let all_ready = !snapshots.is_empty() && snapshots.iter().all(|s| s.ready);

    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(snapshots))
}

async fn list_pools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.snapshots().await)
}

async fn get_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let pool = state
        .registry
        .get(&name)
        .ok_or(crate::ServerError::PoolNotFound(name))
        .map_err(StatusCode::from)?;
    Ok(Json(pool.snapshot().await))
}

async fn reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload_config() {
        Ok(()) => (StatusCode::OK, "reloaded".to_string()),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;
    use voice_relay_config::Settings;
    use voice_relay_core::PoolResource;
    use voice_relay_pool::{PoolConfig, PoolError, PoolRegistry, ResourceFactory, ResourcePool};

    struct Handle;
    impl PoolResource for Handle {}

    struct HandleFactory;

    #[async_trait]
    impl ResourceFactory<Handle> for HandleFactory {
        async fn create(&self) -> Result<Handle, PoolError> {
            Ok(Handle)
        }
    }

    async fn state_with_pool(prepare: bool) -> AppState {
        let registry = Arc::new(PoolRegistry::new());
        let pool = Arc::new(ResourcePool::new(
            PoolConfig {
                name: "synthesis".to_string(),
                warm_pool_size: 1,
                enable_background_warmup: false,
                ..Default::default()
            },
            Arc::new(HandleFactory),
        ));
        if prepare {
            pool.prepare().await;
        }
        registry.register(pool);
        AppState::new(Settings::default(), registry)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(state_with_pool(false).await);
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_pools_snapshot() {
        let router = create_router(state_with_pool(true).await);
        let response = router
            .oneshot(Request::builder().uri("/pools").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["name"], "synthesis");
        assert_eq!(body[0]["warm_pool_size"], 1);
        assert_eq!(body[0]["ready"], true);
    }

    #[tokio::test]
    async fn test_readiness_reflects_pool_state() {
        let router = create_router(state_with_pool(false).await);
        let response = router
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let router = create_router(state_with_pool(true).await);
        let response = router
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_pool_is_404() {
        let router = create_router(state_with_pool(true).await);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/pools/recognition")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
