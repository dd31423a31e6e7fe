//! pairlink-server - HTTP server for the pairlink pairing service
//!
//! This crate owns the axum router over the session registry. The lifecycle
//! controller is built by the caller and handed in through [`AppState`], so
//! tests can swap in a mock transport.

mod error;
pub mod http;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::{ErrorBody, ServerError};
pub use http::create_router;
pub use state::AppState;

/// The main pairlink server
pub struct PairlinkServer {
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
}

impl PairlinkServer {
    /// Create a server over existing state
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self {
            config,
            state,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        self.run_with_listener(listener).await
    }

    /// Run the server on an already bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("pairlink server listening on {}", addr);

        let sweeper = self
            .state
            .controller
            .spawn_sweeper(self.shutdown.child_token());

        let router = create_router(self.state.clone(), self.config.public_dir.as_deref());
        let shutdown = self.shutdown.clone();
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        self.shutdown.cancel();
        let _ = sweeper.await;
        self.state.controller.shutdown().await;
        tracing::info!("pairlink server stopped");

        result
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory with the static web client
    pub public_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            public_dir: None,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            public_dir: None,
        }
    }

    /// Serve static files from `dir`
    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = Some(dir.into());
        self
    }

    /// Returns the socket address string (e.g., "0.0.0.0:5001")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5001);
        assert!(config.public_dir.is_none());
    }

    #[test]
    fn test_server_config_addr() {
        let config = ServerConfig::new("127.0.0.1", 8080).with_public_dir("./public");
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.public_dir, Some(PathBuf::from("./public")));
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_server() {
        let t = test_state();
        let server = PairlinkServer::new(ServerConfig::new("127.0.0.1", 0), t.state.clone());
        let token = server.shutdown_token();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let handle = tokio::spawn(server.run_with_listener(listener));
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
