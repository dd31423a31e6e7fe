//! Session lifecycle controller
//!
//! The controller is the only writer of session state. It starts transports,
//! pumps their events through [`transition`](super::machine::transition) and
//! carries out the effects each transition asks for: deferred welcome and
//! credential upload, deferred teardown, and reconnects after unexpected
//! drops.
//!
//! Every transport generation has its own event pump. Deferred work is bound
//! to the session's lifetime token and re-checks the generation before acting,
//! so timers that outlive their transport are harmless.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::LifecycleConfig;
use super::machine::{Effect, Input};
use super::registry::SessionRegistry;
use super::state::{Applied, Session};
use crate::credentials::CredentialStore;
use crate::error::{SessionError, TransportError};
use crate::render::render_pairing_code;
use crate::storage::ArchiveUploader;
use crate::transport::{
    DisconnectCause, Transport, TransportEvent, TransportFactory, TransportOptions, TransportSession,
};
use crate::welcome::send_welcome;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Drives sessions through their lifecycle
pub struct LifecycleController {
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn TransportFactory>,
    credentials: CredentialStore,
    uploader: Arc<ArchiveUploader>,
    config: LifecycleConfig,
}

impl LifecycleController {
    /// Create a controller over `registry`
    pub fn new(
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn TransportFactory>,
        credentials: CredentialStore,
        uploader: Arc<ArchiveUploader>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            registry,
            factory,
            credentials,
            uploader,
            config,
        }
    }

    /// The registry this controller drives
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Active settings
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Allocate a new session
    pub async fn create_session(&self) -> String {
        let id = self.registry.create().await;
        info!(session_id = %id, "Created session");
        id
    }

    /// Start a transport for `session_id`
    ///
    /// Returns once the transport has been instantiated and its event pump is
    /// running; pairing itself completes asynchronously. Returns the
    /// generation of the new transport.
    pub async fn start(self: &Arc<Self>, session_id: &str) -> Result<u64, SessionError> {
        let generation = self
            .registry
            .with_session(session_id, Session::begin_start)
            .await??;

        match self.instantiate(session_id, generation).await {
            Ok(()) => {
                info!(session_id = %session_id, generation, "Transport started");
                Ok(generation)
            }
            Err(source) => {
                // The session may have been evicted meanwhile; nothing to undo then
                let _ = self
                    .registry
                    .with_session(session_id, |s| s.abort_start(generation))
                    .await;
                warn!(session_id = %session_id, error = %source, "Transport instantiation failed");
                Err(SessionError::TransportInstantiation {
                    session_id: session_id.to_string(),
                    source,
                })
            }
        }
    }

    async fn instantiate(
        self: &Arc<Self>,
        session_id: &str,
        generation: u64,
    ) -> Result<(), TransportError> {
        let credentials = self.credentials.open(session_id).await?;
        if credentials.is_paired().await {
            info!(session_id = %session_id, "Resuming with stored credentials");
        } else {
            debug!(session_id = %session_id, "No stored credentials; a new pairing is needed");
        }
        let options = TransportOptions {
            session_id: session_id.to_string(),
            browser_name: self.config.browser_name.clone(),
        };

        let TransportSession { handle, events } = self.factory.create(credentials, options).await?;

        let attached = self
            .registry
            .with_session(session_id, |s| s.attach(generation, handle.clone()))
            .await;

        match attached {
            Ok(Some(pump)) => {
                tokio::spawn(self.clone().pump_events(
                    session_id.to_string(),
                    generation,
                    events,
                    pump,
                ));
                Ok(())
            }
            _ => {
                // Evicted while the factory was running
                close_quietly(session_id, handle).await;
                Err(TransportError::Closed)
            }
        }
    }

    fn pump_events(
        self: Arc<Self>,
        session_id: String,
        generation: u64,
        mut events: mpsc::Receiver<TransportEvent>,
        pump: CancellationToken,
    ) -> BoxFuture {
        Box::pin(async move {
            debug!(session_id = %session_id, generation, "Event pump started");

            loop {
                tokio::select! {
                    biased;
                    _ = pump.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => self.handle_event(&session_id, generation, event).await,
                        None => {
                            let cause = DisconnectCause::other("event stream closed");
                            self.handle_event(
                                &session_id,
                                generation,
                                TransportEvent::Disconnected { cause },
                            )
                            .await;
                            break;
                        }
                    },
                }
            }

            debug!(session_id = %session_id, generation, "Event pump stopped");
        })
    }

    async fn handle_event(self: &Arc<Self>, session_id: &str, generation: u64, event: TransportEvent) {
        let input = match event {
            TransportEvent::PairingCode { code } => match render_pairing_code(&code) {
                Ok(payload) => {
                    info!(session_id = %session_id, "Pairing code available");
                    Input::PairingCode(payload)
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Failed to render pairing code");
                    return;
                }
            },
            TransportEvent::Connected { identity } => {
                info!(session_id = %session_id, identity = %identity, "Session connected");
                Input::Connected { identity }
            }
            TransportEvent::Disconnected { cause } => {
                if cause.is_logout() {
                    warn!(session_id = %session_id, "Session logged out; not reconnecting");
                } else {
                    info!(session_id = %session_id, cause = %cause, "Transport disconnected");
                }
                Input::Disconnected { cause }
            }
        };

        self.apply(session_id, generation, input).await;
    }

    /// Apply `input` if transport `generation` is still attached
    async fn apply(self: &Arc<Self>, session_id: &str, generation: u64, input: Input) {
        let result = self
            .registry
            .with_session(session_id, |s| {
                if s.generation() != generation || !s.is_live() {
                    return None;
                }
                Some(s.apply(input))
            })
            .await;

        match result {
            Ok(Some(applied)) => self.run_effects(session_id, applied),
            Ok(None) => debug!(session_id = %session_id, generation, "Dropped stale input"),
            Err(_) => debug!(session_id = %session_id, "Session gone; input dropped"),
        }
    }

    fn run_effects(self: &Arc<Self>, session_id: &str, applied: Applied) {
        let Applied {
            effects,
            released,
            reconnect,
            generation,
            lifetime,
            ..
        } = applied;

        if let Some(handle) = released {
            let id = session_id.to_string();
            tokio::spawn(async move { close_quietly(&id, handle).await });
        }

        for effect in effects {
            let this = self.clone();
            let id = session_id.to_string();
            match effect {
                Effect::Welcome { identity } => {
                    spawn_deferred(lifetime.clone(), self.config.settle_delay, async move {
                        this.welcome(&id, generation, &identity).await;
                    });
                }
                Effect::UploadCredentials => {
                    spawn_deferred(lifetime.clone(), self.config.settle_delay, async move {
                        this.upload(&id).await;
                    });
                }
                Effect::ScheduleTeardown => {
                    spawn_deferred(lifetime.clone(), self.config.teardown_delay, async move {
                        this.teardown(&id, generation).await;
                    });
                }
                Effect::Reconnect => match reconnect {
                    Some(Some(delay)) => {
                        info!(session_id = %session_id, ?delay, "Scheduling reconnect");
                        spawn_deferred(lifetime.clone(), delay, async move {
                            this.reconnect(&id).await;
                        });
                    }
                    _ => {
                        error!(session_id = %session_id, "Reconnect limit reached; giving up");
                    }
                },
                Effect::ResetReconnect | Effect::ReleaseTransport | Effect::CloseTransport => {}
            }
        }
    }

    async fn welcome(&self, session_id: &str, generation: u64, identity: &str) {
        let handle = self
            .registry
            .with_session(session_id, |s| {
                if s.generation() == generation {
                    s.live_transport()
                } else {
                    None
                }
            })
            .await;

        let handle = match handle {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                info!(session_id = %session_id, "Connection gone before welcome; skipping");
                return;
            }
            Err(_) => return,
        };

        if let Err(e) = send_welcome(handle.as_ref(), &self.config.welcome, session_id, identity).await {
            error!(session_id = %session_id, error = %e, "Welcome message failed");
        }
    }

    async fn upload(&self, session_id: &str) {
        if !self.registry.contains(session_id).await {
            return;
        }
        if let Err(e) = self.uploader.upload(session_id).await {
            error!(session_id = %session_id, error = %e, "Credential upload failed");
        }
    }

    /// Suspend the session if `generation` is still the connected transport
    async fn teardown(self: &Arc<Self>, session_id: &str, generation: u64) {
        debug!(session_id = %session_id, generation, "Teardown due");
        self.apply(session_id, generation, Input::TeardownDue).await;
    }

    async fn reconnect(self: &Arc<Self>, session_id: &str) {
        match self.start(session_id).await {
            Ok(generation) => {
                info!(session_id = %session_id, generation, "Reconnected");
            }
            Err(SessionError::AlreadyActive(_)) => {
                debug!(session_id = %session_id, "Session restarted elsewhere; reconnect skipped");
            }
            Err(SessionError::NotFound(_)) => {}
            Err(e) => {
                let retry = self
                    .registry
                    .with_session(session_id, |s| {
                        let retry = s.record_reconnect_failure(e.to_string());
                        (retry, s.lifetime())
                    })
                    .await;

                match retry {
                    Ok((Some(delay), lifetime)) => {
                        let this = self.clone();
                        let id = session_id.to_string();
                        spawn_deferred(lifetime, delay, async move {
                            this.retry_reconnect(id).await;
                        });
                    }
                    Ok((None, _)) => {
                        error!(session_id = %session_id, "Reconnect limit reached; giving up");
                    }
                    Err(_) => {}
                }
            }
        }
    }

    fn retry_reconnect(self: Arc<Self>, session_id: String) -> BoxFuture {
        Box::pin(async move { self.reconnect(&session_id).await })
    }

    /// Remove a session, cancel its pending work and close its transport
    pub async fn evict(&self, session_id: &str) -> bool {
        let Some(mut session) = self.registry.remove(session_id).await else {
            return false;
        };
        if let Some(handle) = session.shut_down() {
            close_quietly(session_id, handle).await;
        }
        info!(session_id = %session_id, phase = %session.phase(), "Evicted session");
        true
    }

    /// Evict sessions that never connected within the pending TTL
    ///
    /// Returns the evicted ids.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let Some(ttl) = self.config.pending_ttl else {
            return Vec::new();
        };
        let Ok(ttl) = TimeDelta::from_std(ttl) else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        for id in self.registry.never_connected_before(now - ttl).await {
            if self.evict(&id).await {
                evicted.push(id);
            }
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted expired pending sessions");
        }
        evicted
    }

    /// Run [`sweep_expired`](Self::sweep_expired) periodically until `shutdown`
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if this.config.pending_ttl.is_none() {
                return;
            }
            let mut interval = tokio::time::interval(this.config.sweep_interval);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        this.sweep_expired(Utc::now()).await;
                    }
                }
            }
            debug!("Session sweeper stopped");
        })
    }

    /// Evict every session, closing all transports
    pub async fn shutdown(&self) {
        let ids = self.registry.ids().await;
        let count = ids.len();
        for id in ids {
            if let Some(mut session) = self.registry.remove(&id).await
                && let Some(handle) = session.shut_down()
            {
                close_quietly(&id, handle).await;
            }
        }
        info!(count, "Lifecycle controller shut down");
    }
}

/// Run `work` after `delay` unless `token` is cancelled first
fn spawn_deferred<F>(token: CancellationToken, delay: Duration, work: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => work.await,
        }
    });
}

async fn close_quietly(session_id: &str, handle: Arc<dyn Transport>) {
    if let Err(e) = handle.close().await {
        debug!(session_id = %session_id, error = %e, "Transport close failed");
    }
}
