//! HTTP server module

mod api;
mod static_files;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use api::{
    CreateSessionResponse, HealthResponse, MessageResponse, QrResponse, SessionStatusResponse,
};
pub use static_files::static_service;

/// Create the HTTP router with all routes configured
///
/// When `public_dir` is given, every path outside `/api` is served from it;
/// unknown `/api` paths get a JSON 404.
pub fn create_router(state: Arc<AppState>, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/health", get(api::health))
        .route("/create-session", post(api::create_session))
        .route("/qr/:session_id", get(api::get_qr))
        .route("/start/:session_id", post(api::start_session))
        .route("/sessions/:session_id", get(api::get_session))
        .fallback(api::not_found)
        .with_state(state);

    // The API keeps its own JSON 404 so typos never reach the client page
    let router = Router::new().nest("/api", api);

    let router = match public_dir {
        Some(dir) => router.fallback_service(static_service(dir)),
        None => router,
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_router_has_health_endpoint() {
        let t = test_state();
        let server = TestServer::new(create_router(t.state.clone(), None)).unwrap();

        server.get("/api/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_api_routes_take_precedence_over_static_files() {
        let t = test_state();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "client").unwrap();
        let server = TestServer::new(create_router(t.state.clone(), Some(dir.path()))).unwrap();

        server.get("/api/health").await.assert_status_ok();
        server.get("/").await.assert_text("client");
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_404_not_client_page() {
        let t = test_state();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "client").unwrap();
        let server = TestServer::new(create_router(t.state.clone(), Some(dir.path()))).unwrap();

        let response = server.get("/api/qrcode/PAIRLINK-x").await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&serde_json::json!({ "error": "Not found" }));
        server.get("/pair/anything").await.assert_text("client");
    }

    #[tokio::test]
    async fn test_create_session_requires_post() {
        let t = test_state();
        let server = TestServer::new(create_router(t.state.clone(), None)).unwrap();

        server
            .get("/api/create-session")
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }
}
