//! Static file serving for the web client

use std::path::Path;

use tower_http::services::{ServeDir, ServeFile};

/// Serve files below `dir`, falling back to its `index.html`
///
/// Unknown paths get the client page so it can handle its own routing.
pub fn static_service(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(dir.join("index.html")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum_test::TestServer;

    #[tokio::test]
    async fn serves_index_for_root_and_unknown_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>pair</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();

        let router = Router::new().fallback_service(static_service(dir.path()));
        let server = TestServer::new(router).unwrap();

        server.get("/").await.assert_text("<h1>pair</h1>");
        server.get("/app.js").await.assert_text("console.log(1)");
        server.get("/some/page").await.assert_text("<h1>pair</h1>");
    }
}
