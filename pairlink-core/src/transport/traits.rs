//! Transport trait and lifecycle event types
//!
//! A transport is one live connection to the messaging protocol, bound to a
//! single session's credential directory. The handshake itself is opaque to
//! pairlink: a transport only reports lifecycle events and accepts sends.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::credentials::CredentialState;
use crate::error::TransportError;

/// HTTP-style status code the protocol uses for an explicit logout
pub const LOGGED_OUT_STATUS: u16 = 401;

/// Why a transport connection went away
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisconnectCause {
    /// The remote account logged this device out; credentials are revoked
    LoggedOut,
    /// Anything else (network drop, restart requested, bridge exit, ...)
    Other { reason: String },
}

impl DisconnectCause {
    /// Build a cause from the reason/status pair a bridge reports
    pub fn from_report(reason: Option<&str>, status_code: Option<u16>) -> Self {
        if status_code == Some(LOGGED_OUT_STATUS) || reason == Some("logged_out") {
            return Self::LoggedOut;
        }
        let reason = match (reason, status_code) {
            (Some(reason), Some(code)) => format!("{reason} ({code})"),
            (Some(reason), None) => reason.to_string(),
            (None, Some(code)) => format!("status {code}"),
            (None, None) => "unknown".to_string(),
        };
        Self::Other { reason }
    }

    /// Convenience constructor for non-logout causes
    pub fn other(reason: impl Into<String>) -> Self {
        Self::Other {
            reason: reason.into(),
        }
    }

    /// Whether this cause is an explicit logout
    pub fn is_logout(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

impl std::fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::Other { reason } => write!(f, "{reason}"),
        }
    }
}

/// Lifecycle events emitted by a transport, in protocol order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    /// A fresh pairing token is ready to be scanned
    PairingCode { code: String },
    /// The link is authenticated as `identity`
    Connected { identity: String },
    /// The connection closed
    Disconnected { cause: DisconnectCause },
}

/// Options passed to a transport factory for each instantiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Session the transport is bound to
    pub session_id: String,
    /// Browser/device name announced to the remote side
    pub browser_name: String,
}

/// A live transport connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message to `target`
    async fn send_message(&self, target: &str, text: &str) -> Result<(), TransportError>;

    /// Close the underlying connection. Closing twice is not an error.
    async fn close(&self) -> Result<(), TransportError>;
}

/// A freshly created transport together with its event stream
pub struct TransportSession {
    pub handle: Arc<dyn Transport>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Factory for transports, injected into the lifecycle controller
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Instantiate a transport using the given credential state
    async fn create(
        &self,
        credentials: CredentialState,
        options: TransportOptions,
    ) -> Result<TransportSession, TransportError>;
}
