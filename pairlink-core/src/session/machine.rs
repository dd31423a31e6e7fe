//! Session state machine
//!
//! [`transition`] is a pure function from the current [`MachineState`] and an
//! [`Input`] to the next state plus the side effects the controller must
//! carry out. It knows nothing about timers, transports or the registry,
//! which keeps every lifecycle rule testable on plain values.

use serde::{Deserialize, Serialize};

use crate::transport::DisconnectCause;

/// Connection phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Allocated, no pairing code issued yet
    #[default]
    Created,
    /// A pairing code is waiting to be scanned
    AwaitingScan,
    /// The transport reports a live authenticated link
    Connected,
    /// The transport was closed on purpose after connecting; credentials stay valid
    Suspended,
}

impl SessionPhase {
    /// Wire/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingScan => "awaiting_scan",
            Self::Connected => "connected",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of a session the state machine owns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MachineState {
    pub phase: SessionPhase,
    /// Rendered pairing payload; only present while awaiting a scan
    pub pairing_code: Option<String>,
    /// Identity reported by the last successful connection
    pub remote_identity: Option<String>,
    /// The remote account logged this session out
    pub logged_out: bool,
    /// Cause of the most recent disconnect
    pub last_disconnect: Option<String>,
}

/// Things that happen to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A new transport was attached to the session
    TransportStarted,
    /// The transport issued a pairing code, already rendered for display
    PairingCode(String),
    /// The transport authenticated as `identity`
    Connected { identity: String },
    /// The transport went away
    Disconnected { cause: DisconnectCause },
    /// The deferred teardown timer fired
    TeardownDue,
}

/// Side effects requested by a transition, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Forget previous reconnect attempts
    ResetReconnect,
    /// After the settling delay, greet `identity`
    Welcome { identity: String },
    /// After the settling delay, archive and upload credentials
    UploadCredentials,
    /// Arm the deferred teardown for the current transport
    ScheduleTeardown,
    /// Drop the handle of a transport that is already gone
    ReleaseTransport,
    /// Close the live transport and drop its handle
    CloseTransport,
    /// Start a fresh transport for the same session
    Reconnect,
}

/// Result of applying one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: MachineState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &MachineState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// Compute the next state and effects for `input`
pub fn transition(current: &MachineState, input: Input) -> Transition {
    use SessionPhase::*;

    match input {
        Input::TransportStarted => {
            let mut state = current.clone();
            state.logged_out = false;
            match state.phase {
                // The identity survives a suspend; the credentials still hold it
                Suspended => state.phase = Created,
                // A fresh transport has not authenticated yet
                Connected => {
                    state.phase = Created;
                    state.remote_identity = None;
                }
                Created | AwaitingScan => {}
            }
            Transition {
                state,
                effects: Vec::new(),
            }
        }

        Input::PairingCode(payload) => {
            let mut state = current.clone();
            state.phase = AwaitingScan;
            state.pairing_code = Some(payload);
            state.remote_identity = None;
            Transition {
                state,
                effects: Vec::new(),
            }
        }

        Input::Connected { identity } => {
            let mut state = current.clone();
            state.phase = Connected;
            state.pairing_code = None;
            state.remote_identity = Some(identity.clone());
            state.logged_out = false;
            Transition {
                state,
                effects: vec![
                    Effect::ResetReconnect,
                    Effect::Welcome { identity },
                    Effect::UploadCredentials,
                    Effect::ScheduleTeardown,
                ],
            }
        }

        // A suspended session's transport was closed by teardown; whatever it
        // reports afterwards is noise.
        Input::Disconnected { .. } if current.phase == Suspended => Transition::unchanged(current),

        Input::Disconnected { cause } if cause.is_logout() => {
            let mut state = current.clone();
            state.logged_out = true;
            state.pairing_code = None;
            if state.phase == AwaitingScan {
                state.phase = Created;
            }
            state.last_disconnect = Some(cause.to_string());
            Transition {
                state,
                effects: vec![Effect::ReleaseTransport],
            }
        }

        Input::Disconnected { cause } => {
            let state = MachineState {
                phase: Created,
                pairing_code: None,
                remote_identity: None,
                logged_out: false,
                last_disconnect: Some(cause.to_string()),
            };
            Transition {
                state,
                effects: vec![Effect::ReleaseTransport, Effect::Reconnect],
            }
        }

        Input::TeardownDue if current.phase == Connected => {
            let mut state = current.clone();
            state.phase = Suspended;
            Transition {
                state,
                effects: vec![Effect::CloseTransport],
            }
        }

        Input::TeardownDue => Transition::unchanged(current),
    }
}
