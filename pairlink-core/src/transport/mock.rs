//! Scripted transport for tests
//!
//! `MockTransportFactory` hands out `MockTransport`s and keeps the sending end
//! of each event channel, so a test can play the remote side with
//! [`MockTransportFactory::emit`] and then inspect what the controller did.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{Transport, TransportEvent, TransportFactory, TransportOptions, TransportSession};
use crate::credentials::CredentialState;
use crate::error::TransportError;

/// A message captured by [`MockTransport::send_message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: String,
    pub text: String,
}

/// In-memory transport that records sends and closes
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockTransport {
    /// Messages sent so far, in order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, target: &str, text: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("mock send failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                target: target.to_string(),
                text: text.to_string(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Instance {
    transport: Arc<MockTransport>,
    events: mpsc::Sender<TransportEvent>,
    credentials: CredentialState,
}

/// Factory producing [`MockTransport`]s
#[derive(Default)]
pub struct MockTransportFactory {
    instances: Mutex<HashMap<String, Vec<Instance>>>,
    failures_pending: AtomicUsize,
}

impl MockTransportFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `create` fail
    pub fn fail_next(&self, n: usize) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// How many transports were created for a session
    pub fn created_count(&self, session_id: &str) -> usize {
        self.with_instances(session_id, |list| list.len())
    }

    /// How many transports for a session have not been closed
    pub fn open_count(&self, session_id: &str) -> usize {
        self.with_instances(session_id, |list| {
            list.iter().filter(|i| !i.transport.is_closed()).count()
        })
    }

    /// The most recently created transport for a session
    pub fn latest(&self, session_id: &str) -> Option<Arc<MockTransport>> {
        self.with_instances(session_id, |list| list.last().map(|i| i.transport.clone()))
    }

    /// Credential state handed to the most recent transport
    pub fn latest_credentials(&self, session_id: &str) -> Option<CredentialState> {
        self.with_instances(session_id, |list| list.last().map(|i| i.credentials.clone()))
    }

    /// Emit an event from the most recent transport of a session
    ///
    /// Returns false when there is no transport or its event stream has been
    /// dropped (e.g. after teardown detached it).
    pub async fn emit(&self, session_id: &str, event: TransportEvent) -> bool {
        let sender = self.with_instances(session_id, |list| list.last().map(|i| i.events.clone()));
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    fn with_instances<R>(&self, session_id: &str, f: impl FnOnce(&[Instance]) -> R) -> R {
        let instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        let list = instances.get(session_id).map(Vec::as_slice).unwrap_or(&[]);
        f(list)
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        credentials: CredentialState,
        options: TransportOptions,
    ) -> Result<TransportSession, TransportError> {
        let pending = self.failures_pending.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_pending.store(pending - 1, Ordering::SeqCst);
            return Err(TransportError::Other("mock instantiation failure".to_string()));
        }

        let (tx, rx) = mpsc::channel(32);
        let transport = Arc::new(MockTransport::default());

        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        instances
            .entry(options.session_id.clone())
            .or_default()
            .push(Instance {
                transport: transport.clone(),
                events: tx,
                credentials,
            });

        Ok(TransportSession {
            handle: transport,
            events: rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;

    fn options(id: &str) -> TransportOptions {
        TransportOptions {
            session_id: id.to_string(),
            browser_name: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn emitted_events_reach_the_session_stream() {
        let root = tempfile::tempdir().unwrap();
        let creds = CredentialStore::new(root.path()).open("s1").await.unwrap();
        let factory = MockTransportFactory::new();

        let mut session = factory.create(creds, options("s1")).await.unwrap();
        let event = TransportEvent::PairingCode {
            code: "abc".to_string(),
        };
        assert!(factory.emit("s1", event.clone()).await);

        assert_eq!(session.events.recv().await, Some(event));
        assert_eq!(factory.created_count("s1"), 1);
    }

    #[tokio::test]
    async fn fail_next_rejects_creation() {
        let root = tempfile::tempdir().unwrap();
        let creds = CredentialStore::new(root.path()).open("s1").await.unwrap();
        let factory = MockTransportFactory::new();
        factory.fail_next(1);

        assert!(factory.create(creds.clone(), options("s1")).await.is_err());
        assert!(factory.create(creds, options("s1")).await.is_ok());
        assert_eq!(factory.created_count("s1"), 1);
    }

    #[tokio::test]
    async fn closed_transport_rejects_sends() {
        let transport = MockTransport::default();
        transport.send_message("a@b", "hi").await.unwrap();
        transport.close().await.unwrap();

        assert!(matches!(
            transport.send_message("a@b", "again").await,
            Err(TransportError::Closed)
        ));
        assert_eq!(transport.sent().len(), 1);
    }
}
