//! SessionRegistry for tracking pairing sessions
//!
//! The registry owns every `Session` keyed by its identifier. All mutation
//! goes through [`SessionRegistry::with_session`], which runs the closure
//! under the write lock, so transitions on one session never interleave.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::id::generate_session_id;
use super::machine::SessionPhase;
use super::restart::RestartPolicy;
use super::state::{Session, SessionSnapshot};
use crate::error::SessionError;

/// Settings applied to every session the registry creates
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub reconnect_max_attempts: u32,
    pub reconnect_window: std::time::Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconnect_max_attempts: super::restart::DEFAULT_MAX_ATTEMPTS,
            reconnect_window: super::restart::DEFAULT_WINDOW,
        }
    }
}

/// Number of sessions per phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseCounts {
    pub created: usize,
    pub awaiting_scan: usize,
    pub connected: usize,
    pub suspended: usize,
}

impl PhaseCounts {
    /// Total number of sessions
    pub fn total(&self) -> usize {
        self.created + self.awaiting_scan + self.connected + self.suspended
    }
}

/// Owns all sessions of one server instance
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Allocate a new session in phase `Created`
    ///
    /// Returns the session ID.
    pub async fn create(&self) -> String {
        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = generate_session_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let policy = RestartPolicy::new(
            self.config.reconnect_max_attempts,
            self.config.reconnect_window,
        );
        sessions.insert(id.clone(), Session::new(id.clone(), policy));
        id
    }

    /// Snapshot of a session
    pub async fn get(&self, id: &str) -> Option<SessionSnapshot> {
        self.sessions.read().await.get(id).map(Session::snapshot)
    }

    /// Whether a session exists
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Run `f` against a session under the write lock
    ///
    /// Uses the callback pattern so no lock guard escapes the registry.
    pub async fn with_session<F, R>(&self, id: &str, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(f(session))
    }

    /// Remove a session, handing it back to the caller for cleanup
    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    /// Get the number of sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// List all session IDs
    pub async fn ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Count sessions per phase
    pub async fn phase_counts(&self) -> PhaseCounts {
        let sessions = self.sessions.read().await;
        let mut counts = PhaseCounts::default();
        for session in sessions.values() {
            match session.phase() {
                SessionPhase::Created => counts.created += 1,
                SessionPhase::AwaitingScan => counts.awaiting_scan += 1,
                SessionPhase::Connected => counts.connected += 1,
                SessionPhase::Suspended => counts.suspended += 1,
            }
        }
        counts
    }

    /// Sessions that never connected and were created before `cutoff`
    pub async fn never_connected_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| {
                s.connected_at().is_none()
                    && matches!(s.phase(), SessionPhase::Created | SessionPhase::AwaitingScan)
                    && s.created_at() < cutoff
            })
            .map(|s| s.id().to_string())
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::id::is_well_formed;
    use crate::session::machine::Input;
    use std::collections::HashSet;

    // ==================== Creation Tests ====================

    #[tokio::test]
    async fn create_returns_unique_well_formed_ids() {
        let registry = SessionRegistry::default();

        let mut ids = HashSet::new();
        for _ in 0..200 {
            let id = registry.create().await;
            assert!(is_well_formed(&id), "bad id: {id}");
            ids.insert(id);
        }

        assert_eq!(ids.len(), 200);
        assert_eq!(registry.len().await, 200);
    }

    #[tokio::test]
    async fn created_session_starts_in_created_phase() {
        let registry = SessionRegistry::default();
        let id = registry.create().await;

        let snapshot = registry.get(&id).await.unwrap();
        assert_eq!(snapshot.session_id, id);
        assert_eq!(snapshot.phase, SessionPhase::Created);
        assert!(snapshot.pairing_code.is_none());
        assert!(!snapshot.live);
    }

    // ==================== Lookup Tests ====================

    #[tokio::test]
    async fn get_unknown_session_is_none() {
        let registry = SessionRegistry::default();
        assert!(registry.get("PAIRLINK-nope").await.is_none());
        assert!(!registry.contains("PAIRLINK-nope").await);
    }

    #[tokio::test]
    async fn with_session_unknown_is_not_found() {
        let registry = SessionRegistry::default();
        let result = registry.with_session("missing", |_| ()).await;
        assert!(matches!(result, Err(SessionError::NotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn with_session_mutation_is_visible() {
        let registry = SessionRegistry::default();
        let id = registry.create().await;

        registry
            .with_session(&id, |s| s.apply(Input::PairingCode("qr".to_string())))
            .await
            .unwrap();

        let snapshot = registry.get(&id).await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::AwaitingScan);
        assert_eq!(snapshot.pairing_code.as_deref(), Some("qr"));
    }

    // ==================== Isolation Tests ====================

    #[tokio::test]
    async fn registries_are_isolated() {
        let a = SessionRegistry::default();
        let b = SessionRegistry::default();

        let id = a.create().await;

        assert!(a.contains(&id).await);
        assert!(!b.contains(&id).await);
        assert!(b.is_empty().await);
    }

    // ==================== Counting & Expiry Tests ====================

    #[tokio::test]
    async fn phase_counts_track_transitions() {
        let registry = SessionRegistry::default();
        let a = registry.create().await;
        registry.create().await;
        registry
            .with_session(&a, |s| s.apply(Input::PairingCode("qr".to_string())))
            .await
            .unwrap();

        let counts = registry.phase_counts().await;
        assert_eq!(counts.created, 1);
        assert_eq!(counts.awaiting_scan, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn never_connected_before_skips_connected_sessions() {
        let registry = SessionRegistry::default();
        let pending = registry.create().await;
        let linked = registry.create().await;
        registry
            .with_session(&linked, |s| {
                s.apply(Input::Connected {
                    identity: "1@x".to_string(),
                })
            })
            .await
            .unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let expired = registry.never_connected_before(cutoff).await;

        assert_eq!(expired, vec![pending]);
        assert!(
            registry
                .never_connected_before(Utc::now() - chrono::Duration::hours(1))
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn remove_returns_the_session() {
        let registry = SessionRegistry::default();
        let id = registry.create().await;

        let removed = registry.remove(&id).await.unwrap();
        assert_eq!(removed.id(), id);
        assert!(registry.get(&id).await.is_none());
    }
}
