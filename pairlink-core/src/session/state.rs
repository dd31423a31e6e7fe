//! Session struct and transport ownership
//!
//! A `Session` wraps the machine state with everything the controller needs
//! to act on it: the exclusively owned transport slot, the generation counter
//! used for staleness checks, the reconnect policy and the cancellation
//! tokens that bind background work to the session's lifetime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::machine::{Effect, Input, MachineState, SessionPhase, Transition, transition};
use super::restart::RestartPolicy;
use crate::error::SessionError;
use crate::transport::Transport;

/// Ownership cell for a session's transport
#[derive(Clone, Default)]
pub enum TransportSlot {
    /// No transport exists
    #[default]
    Empty,
    /// A factory call is in flight; the slot is reserved
    Starting,
    /// A transport is attached
    Live(Arc<dyn Transport>),
}

impl TransportSlot {
    fn label(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Starting => "starting",
            Self::Live(_) => "live",
        }
    }
}

impl std::fmt::Debug for TransportSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A pairing session
#[derive(Debug)]
pub struct Session {
    id: String,
    machine: MachineState,
    transport: TransportSlot,
    generation: u64,
    created_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
    restart_policy: RestartPolicy,
    /// Cancelled when the session is evicted
    lifetime: CancellationToken,
    /// Cancelled when the current transport's event stream must be detached
    pump: Option<CancellationToken>,
}

/// What the controller has to follow up on after a transition was committed
pub struct Applied {
    /// Effects requested by the state machine
    pub effects: Vec<Effect>,
    /// Transport removed from the slot; the caller closes it outside the lock
    pub released: Option<Arc<dyn Transport>>,
    /// `Some(Some(delay))` to reconnect after `delay`, `Some(None)` when the
    /// reconnect policy gave up
    pub reconnect: Option<Option<Duration>>,
    /// Generation the transition applied to
    pub generation: u64,
    /// Session lifetime token for deferred work
    pub lifetime: CancellationToken,
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: SessionPhase,
    pub pairing_code: Option<String>,
    pub remote_identity: Option<String>,
    /// Whether a transport is attached or being attached
    pub live: bool,
    pub logged_out: bool,
    pub last_disconnect: Option<String>,
    /// Automatic reconnects stopped after too many drops
    pub reconnect_gave_up: bool,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session in phase `Created`
    pub fn new(id: impl Into<String>, restart_policy: RestartPolicy) -> Self {
        Self {
            id: id.into(),
            machine: MachineState::default(),
            transport: TransportSlot::Empty,
            generation: 0,
            created_at: Utc::now(),
            connected_at: None,
            restart_policy,
            lifetime: CancellationToken::new(),
            pump: None,
        }
    }

    /// Get the session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase
    }

    /// Machine state
    pub fn machine(&self) -> &MachineState {
        &self.machine
    }

    /// Current transport generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the session was allocated
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session first connected
    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// The attached transport, if any
    pub fn live_transport(&self) -> Option<Arc<dyn Transport>> {
        match &self.transport {
            TransportSlot::Live(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Whether a transport is attached
    pub fn is_live(&self) -> bool {
        matches!(self.transport, TransportSlot::Live(_))
    }

    /// Session lifetime token
    pub fn lifetime(&self) -> CancellationToken {
        self.lifetime.clone()
    }

    /// Snapshot for callers outside the registry lock
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            phase: self.machine.phase,
            pairing_code: self.machine.pairing_code.clone(),
            remote_identity: self.machine.remote_identity.clone(),
            live: !matches!(self.transport, TransportSlot::Empty),
            logged_out: self.machine.logged_out,
            last_disconnect: self.machine.last_disconnect.clone(),
            reconnect_gave_up: self.restart_policy.gave_up(),
            generation: self.generation,
            created_at: self.created_at,
            connected_at: self.connected_at,
        }
    }

    /// Reserve the transport slot for a new instantiation
    ///
    /// Returns the generation the new transport will carry.
    pub fn begin_start(&mut self) -> Result<u64, SessionError> {
        if !matches!(self.transport, TransportSlot::Empty) {
            return Err(SessionError::AlreadyActive(self.id.clone()));
        }
        self.transport = TransportSlot::Starting;
        self.generation += 1;
        self.restart_policy.rearm();
        Ok(self.generation)
    }

    /// Give the reserved slot back after a failed instantiation
    pub fn abort_start(&mut self, generation: u64) {
        if self.generation == generation && matches!(self.transport, TransportSlot::Starting) {
            self.transport = TransportSlot::Empty;
        }
    }

    /// Attach a freshly created transport to the reserved slot
    ///
    /// Returns the token that detaches the transport's event pump, or `None`
    /// when the reservation is no longer current.
    pub fn attach(
        &mut self,
        generation: u64,
        handle: Arc<dyn Transport>,
    ) -> Option<CancellationToken> {
        if self.generation != generation || !matches!(self.transport, TransportSlot::Starting) {
            return None;
        }
        self.transport = TransportSlot::Live(handle);
        let pump = self.lifetime.child_token();
        self.pump = Some(pump.clone());
        self.commit(transition(&self.machine, Input::TransportStarted).state);
        Some(pump)
    }

    /// Apply an input and carry out the slot-level effects under the lock
    pub fn apply(&mut self, input: Input) -> Applied {
        let Transition { state, effects } = transition(&self.machine, input);
        self.commit(state);

        let mut released = None;
        let mut reconnect = None;
        for effect in &effects {
            match effect {
                Effect::ReleaseTransport | Effect::CloseTransport => {
                    released = self.release_transport().or(released);
                }
                Effect::ResetReconnect => self.restart_policy.connected(),
                Effect::Reconnect => reconnect = Some(self.restart_policy.next_attempt()),
                Effect::Welcome { .. } | Effect::UploadCredentials | Effect::ScheduleTeardown => {}
            }
        }

        if self.machine.phase == SessionPhase::Connected && self.connected_at.is_none() {
            self.connected_at = Some(Utc::now());
        }

        Applied {
            effects,
            released,
            reconnect,
            generation: self.generation,
            lifetime: self.lifetime.clone(),
        }
    }

    /// Record a failed reconnect attempt and ask the policy for another one
    ///
    /// Returns `None` when the policy gave up or the slot was taken meanwhile.
    pub fn record_reconnect_failure(&mut self, reason: impl Into<String>) -> Option<Duration> {
        self.machine.last_disconnect = Some(reason.into());
        if !matches!(self.transport, TransportSlot::Empty) {
            return None;
        }
        self.restart_policy.next_attempt()
    }

    /// Empty the slot and detach the event pump
    pub fn release_transport(&mut self) -> Option<Arc<dyn Transport>> {
        if let Some(pump) = self.pump.take() {
            pump.cancel();
        }
        match std::mem::take(&mut self.transport) {
            TransportSlot::Live(handle) => Some(handle),
            _ => None,
        }
    }

    /// Cancel everything bound to this session and hand back its transport
    pub fn shut_down(&mut self) -> Option<Arc<dyn Transport>> {
        self.lifetime.cancel();
        self.release_transport()
    }

    fn commit(&mut self, next: MachineState) {
        if next.phase != self.machine.phase {
            debug!(
                session_id = %self.id,
                "Session phase: {} -> {}", self.machine.phase, next.phase
            );
        }
        self.machine = next;
    }
}
