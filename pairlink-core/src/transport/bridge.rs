//! Transport backed by an external bridge process
//!
//! The messaging protocol handshake lives in a separate bridge program. It is
//! spawned once per transport with the session's credential directory and
//! speaks newline-delimited JSON:
//!
//! - stdout: `pairing_code`, `connected`, `disconnected` and `log` lines
//! - stdin: `send` and `close` commands
//!
//! A bridge that exits without reporting a disconnect is treated as an
//! unexpected drop.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use super::traits::{
    DisconnectCause, Transport, TransportEvent, TransportFactory, TransportOptions,
    TransportSession,
};
use crate::credentials::CredentialState;
use crate::error::TransportError;

/// Default bridge executable name, resolved through `PATH`
pub const DEFAULT_BRIDGE_COMMAND: &str = "pairlink-bridge";

/// How long a closing bridge may take to flush credentials before it is killed
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Configuration for spawning bridge processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Program to run
    pub command: String,
    /// Extra arguments placed before the generated ones
    pub args: Vec<String>,
    /// Wait this long for the bridge to exit after `close`
    pub close_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_BRIDGE_COMMAND.to_string(),
            args: Vec::new(),
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }
}

/// Lines a bridge writes to stdout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    PairingCode {
        code: String,
    },
    Connected {
        identity: String,
    },
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        status_code: Option<u16>,
    },
    Log {
        #[serde(default)]
        level: Option<String>,
        message: String,
    },
}

/// Commands written to a bridge's stdin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand<'a> {
    Send { to: &'a str, text: &'a str },
    Close,
}

/// Parse one stdout line; blank or unrecognised lines yield `None`
pub fn parse_line(line: &str) -> Option<BridgeMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(msg) => Some(msg),
        Err(e) => {
            debug!("Ignoring unparseable bridge line: {} ({})", line, e);
            None
        }
    }
}

/// Map a bridge message to a lifecycle event, if it is one
pub fn to_transport_event(msg: BridgeMessage) -> Option<TransportEvent> {
    match msg {
        BridgeMessage::PairingCode { code } => Some(TransportEvent::PairingCode { code }),
        BridgeMessage::Connected { identity } => Some(TransportEvent::Connected { identity }),
        BridgeMessage::Disconnected {
            reason,
            status_code,
        } => Some(TransportEvent::Disconnected {
            cause: DisconnectCause::from_report(reason.as_deref(), status_code),
        }),
        BridgeMessage::Log { .. } => None,
    }
}

/// Factory spawning one bridge process per transport
pub struct BridgeTransportFactory {
    config: BridgeConfig,
}

impl BridgeTransportFactory {
    /// Create a new factory with the given config
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Build the bridge command
    ///
    /// Extracted so argument construction can be checked without spawning.
    pub fn build_command(&self, credentials: &CredentialState, options: &TransportOptions) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .arg("--auth-dir")
            .arg(credentials.dir())
            .arg("--session")
            .arg(&options.session_id)
            .arg("--browser")
            .arg(&options.browser_name);

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TransportFactory for BridgeTransportFactory {
    async fn create(
        &self,
        credentials: CredentialState,
        options: TransportOptions,
    ) -> Result<TransportSession, TransportError> {
        let mut child = self
            .build_command(&credentials, &options)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TransportError::BridgeNotFound(self.config.command.clone())
                } else {
                    TransportError::SpawnFailed(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Other("Failed to capture bridge stdout".to_string()))?;
        let stdin = child.stdin.take();

        if let Some(stderr) = child.stderr.take() {
            let session_id = options.session_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(session_id = %session_id, "bridge stderr: {}", line);
                }
            });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(forward_events(options.session_id.clone(), stdout, tx));

        info!(session_id = %options.session_id, "Spawned transport bridge {}", self.config.command);

        Ok(TransportSession {
            handle: Arc::new(BridgeTransport {
                stdin: Mutex::new(stdin),
                child: Mutex::new(Some(child)),
                closed: AtomicBool::new(false),
                close_grace: self.config.close_grace,
            }),
            events: rx,
        })
    }
}

/// Read bridge stdout until EOF, forwarding lifecycle events
async fn forward_events(
    session_id: String,
    stdout: tokio::process::ChildStdout,
    tx: mpsc::Sender<TransportEvent>,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut reported_disconnect = false;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(msg) = parse_line(&line) else {
                    continue;
                };
                if let BridgeMessage::Log { level, message } = &msg {
                    match level.as_deref() {
                        Some("error") | Some("warn") => {
                            warn!(session_id = %session_id, "bridge: {}", message)
                        }
                        _ => debug!(session_id = %session_id, "bridge: {}", message),
                    }
                    continue;
                }
                if let Some(event) = to_transport_event(msg) {
                    reported_disconnect |= matches!(event, TransportEvent::Disconnected { .. });
                    if tx.send(event).await.is_err() {
                        // Subscriber detached; nothing left to deliver to
                        return;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(session_id = %session_id, "Error reading bridge stdout: {}", e);
                break;
            }
        }
    }

    if !reported_disconnect {
        let _ = tx
            .send(TransportEvent::Disconnected {
                cause: DisconnectCause::other("bridge exited"),
            })
            .await;
    }
}

/// Handle to a running bridge process
pub struct BridgeTransport {
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    closed: AtomicBool,
    close_grace: Duration,
}

impl BridgeTransport {
    async fn write_command(&self, command: &BridgeCommand<'_>) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(command)
            .map_err(|e| TransportError::Other(format!("serialization error: {}", e)))?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        let pipe = stdin.as_mut().ok_or(TransportError::Closed)?;
        pipe.write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        pipe.flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn send_message(&self, target: &str, text: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.write_command(&BridgeCommand::Send { to: target, text })
            .await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Ask politely first; the bridge may already be gone
        let _ = self.write_command(&BridgeCommand::Close).await;
        self.stdin.lock().await.take();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        // The bridge persists credentials on its way out
        match tokio::time::timeout(self.close_grace, child.wait()).await {
            Ok(Ok(status)) => debug!("Bridge exited with {}", status),
            Ok(Err(e)) => warn!("Failed to wait for bridge: {}", e),
            Err(_) => {
                warn!(
                    "Bridge still running {:?} after close; killing it",
                    self.close_grace
                );
                child.kill().await.ok();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;

    fn options() -> TransportOptions {
        TransportOptions {
            session_id: "PAIRLINK-test".to_string(),
            browser_name: "Pairlink".to_string(),
        }
    }

    #[test]
    fn parse_line_reads_lifecycle_messages() {
        assert_eq!(
            parse_line(r#"{"type":"pairing_code","code":"2@abc"}"#),
            Some(BridgeMessage::PairingCode {
                code: "2@abc".to_string()
            })
        );
        assert_eq!(
            parse_line(r#"{"type":"disconnected","status_code":401}"#),
            Some(BridgeMessage::Disconnected {
                reason: None,
                status_code: Some(401)
            })
        );
    }

    #[test]
    fn parse_line_skips_noise() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("starting bridge...").is_none());
        assert!(parse_line(r#"{"type":"unknown"}"#).is_none());
    }

    #[test]
    fn disconnect_with_logout_status_becomes_logout_event() {
        let event = to_transport_event(BridgeMessage::Disconnected {
            reason: Some("connection failure".to_string()),
            status_code: Some(401),
        });
        assert_eq!(
            event,
            Some(TransportEvent::Disconnected {
                cause: DisconnectCause::LoggedOut
            })
        );
    }

    #[test]
    fn log_lines_are_not_events() {
        let event = to_transport_event(BridgeMessage::Log {
            level: Some("info".to_string()),
            message: "hello".to_string(),
        });
        assert!(event.is_none());
    }

    #[test]
    fn send_command_serializes_as_json_line() {
        let json = serde_json::to_string(&BridgeCommand::Send {
            to: "123@s.whatsapp.net",
            text: "hi",
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"send","to":"123@s.whatsapp.net","text":"hi"}"#);
    }

    #[tokio::test]
    async fn build_command_passes_auth_dir_and_session() {
        let root = tempfile::tempdir().unwrap();
        let creds = CredentialStore::new(root.path())
            .open("PAIRLINK-test")
            .await
            .unwrap();
        let factory = BridgeTransportFactory::new(BridgeConfig {
            command: "node".to_string(),
            args: vec!["bridge.js".to_string()],
            ..Default::default()
        });

        let cmd = factory.build_command(&creds, &options());
        let std_cmd = cmd.as_std();
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(std_cmd.get_program(), "node");
        assert_eq!(args[0], "bridge.js");
        assert_eq!(args[1], "--auth-dir");
        assert_eq!(args[2], creds.dir().to_string_lossy());
        assert_eq!(&args[3..], ["--session", "PAIRLINK-test", "--browser", "Pairlink"]);
    }

    #[tokio::test]
    async fn missing_bridge_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let creds = CredentialStore::new(root.path()).open("s").await.unwrap();
        let factory = BridgeTransportFactory::new(BridgeConfig {
            command: "pairlink-bridge-that-does-not-exist".to_string(),
            ..Default::default()
        });

        let result = factory.create(creds, options()).await;
        assert!(matches!(result, Err(TransportError::BridgeNotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bridge_events_flow_and_exit_reports_disconnect() {
        let root = tempfile::tempdir().unwrap();
        let creds = CredentialStore::new(root.path()).open("s").await.unwrap();
        let script = r#"echo '{"type":"log","message":"booting"}'
echo '{"type":"pairing_code","code":"xyz"}'
cat > /dev/null"#;
        let factory = BridgeTransportFactory::new(BridgeConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "bridge".to_string()],
            ..Default::default()
        });

        let mut session = factory.create(creds, options()).await.unwrap();
        assert_eq!(
            session.events.recv().await,
            Some(TransportEvent::PairingCode {
                code: "xyz".to_string()
            })
        );

        session.handle.close().await.unwrap();
        assert_eq!(
            session.events.recv().await,
            Some(TransportEvent::Disconnected {
                cause: DisconnectCause::other("bridge exited")
            })
        );
        assert!(matches!(
            session.handle.send_message("a", "b").await,
            Err(TransportError::Closed)
        ));
    }

    /// Bridge running `script` under `sh`; `$2` is the credential directory
    #[cfg(unix)]
    fn script_bridge(script: &str, close_grace: Duration) -> BridgeTransportFactory {
        BridgeTransportFactory::new(BridgeConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "bridge".to_string()],
            close_grace,
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_waits_for_bridge_to_flush_credentials() {
        let root = tempfile::tempdir().unwrap();
        let creds = CredentialStore::new(root.path()).open("s").await.unwrap();
        let creds_file = creds.dir().join("creds.json");
        let factory = script_bridge(
            r#"read line; sleep 0.2; echo '{}' > "$2/creds.json""#,
            Duration::from_secs(5),
        );

        let session = factory.create(creds, options()).await.unwrap();
        session.handle.close().await.unwrap();

        assert!(creds_file.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_kills_bridge_after_grace_period() {
        let root = tempfile::tempdir().unwrap();
        let creds = CredentialStore::new(root.path()).open("s").await.unwrap();
        let factory = script_bridge(
            "trap '' TERM; while true; do sleep 1; done",
            Duration::from_millis(100),
        );

        let mut session = factory.create(creds, options()).await.unwrap();
        let closed = tokio::time::timeout(Duration::from_secs(5), session.handle.close()).await;

        assert!(matches!(closed, Ok(Ok(()))));
        assert_eq!(
            session.events.recv().await,
            Some(TransportEvent::Disconnected {
                cause: DisconnectCause::other("bridge exited")
            })
        );
    }
}
