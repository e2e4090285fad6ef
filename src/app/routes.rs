//! Container app route definitions.

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{health, index, render_metrics, AppState};

/// Create the app router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_serves_configured_message() {
        let app = create_router(AppState::new("Hello from Pulumi Cloud Run!"));
        let (status, body) = get_body(app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Hello from Pulumi Cloud Run!</h1>");
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(AppState::new("x"));
        let (status, body) = get_body(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn metrics_endpoint_is_404_without_recorder() {
        let app = create_router(AppState::new("x"));
        let (status, _) = get_body(app, "/metrics").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = create_router(AppState::new("x"));
        let (status, _) = get_body(app, "/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
