//! Shared test utilities for pairlink-server integration tests

use std::net::SocketAddr;
use std::sync::Arc;

use pairlink_core::{
    ArchiveUploader, CredentialStore, LifecycleConfig, LifecycleController, MemoryBlobStore,
    MockTransportFactory, SessionRegistry,
};
use pairlink_server::{AppState, PairlinkServer, ServerConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// A running server plus the doubles behind it
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub factory: Arc<MockTransportFactory>,
    pub store: Arc<MemoryBlobStore>,
    pub shutdown: CancellationToken,
    _root: tempfile::TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Creates a test server with default lifecycle settings
#[allow(dead_code)]
pub async fn create_test_server() -> TestServer {
    create_test_server_with_config(LifecycleConfig::default()).await
}

/// Creates a test server with custom lifecycle settings
pub async fn create_test_server_with_config(config: LifecycleConfig) -> TestServer {
    let root = tempfile::tempdir().unwrap();
    let credentials = CredentialStore::new(root.path().join("auth"));
    let factory = Arc::new(MockTransportFactory::new());
    let store = Arc::new(MemoryBlobStore::new());
    let uploader = Arc::new(ArchiveUploader::new(credentials.clone(), store.clone()));
    let registry = Arc::new(SessionRegistry::new(config.registry_config()));
    let controller = Arc::new(LifecycleController::new(
        registry,
        factory.clone(),
        credentials,
        uploader,
        config,
    ));
    let state = Arc::new(AppState::new(controller));

    let server = PairlinkServer::new(ServerConfig::new("127.0.0.1", 0), state.clone());
    let shutdown = server.shutdown_token();
    let addr = spawn_server(server).await;

    TestServer {
        addr,
        state,
        factory,
        store,
        shutdown,
        _root: root,
    }
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: PairlinkServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    addr
}
