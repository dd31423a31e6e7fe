//! Shared application state for the pairlink server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pairlink_core::{LifecycleController, SessionRegistry};

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle controller driving every session
    pub controller: Arc<LifecycleController>,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state around an existing controller
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self {
            controller,
            started_at: Utc::now(),
        }
    }

    /// The session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.controller.registry()
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use pairlink_core::{
        ArchiveUploader, CredentialStore, LifecycleConfig, MemoryBlobStore, MockTransportFactory,
    };

    /// State backed by a mock transport and an in-memory blob store
    pub(crate) struct TestState {
        pub state: Arc<AppState>,
        pub factory: Arc<MockTransportFactory>,
        _root: tempfile::TempDir,
    }

    pub(crate) fn test_state() -> TestState {
        let root = tempfile::tempdir().unwrap();
        let credentials = CredentialStore::new(root.path());
        let factory = Arc::new(MockTransportFactory::new());
        let uploader = Arc::new(ArchiveUploader::new(
            credentials.clone(),
            Arc::new(MemoryBlobStore::new()),
        ));
        let config = LifecycleConfig::default();
        let registry = Arc::new(SessionRegistry::new(config.registry_config()));
        let controller = Arc::new(LifecycleController::new(
            registry,
            factory.clone(),
            credentials,
            uploader,
            config,
        ));
        TestState {
            state: Arc::new(AppState::new(controller)),
            factory,
            _root: root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::test_state;

    #[tokio::test]
    async fn test_app_state_new() {
        let t = test_state();
        assert!(t.state.uptime_seconds() >= 0);
        assert!(t.state.registry().is_empty().await);
    }
}
