use pairlink_core::{BridgeConfig, LifecycleConfig, WelcomeConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default host for the pairlink server
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port for the pairlink server
pub const DEFAULT_PORT: u16 = 5001;

/// Default root of per-session credential directories
pub const DEFAULT_AUTH_ROOT: &str = "./auth";

/// Default directory of the static web client
pub const DEFAULT_PUBLIC_DIR: &str = "./public";

/// Default bucket for credential archives
pub const DEFAULT_BUCKET: &str = "pairlink-sessions";

/// Where credential archives are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Supabase,
    Local,
    Disabled,
}

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPairlinkConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub sessions: RawSessionsConfig,

    #[serde(default)]
    pub welcome: RawWelcomeConfig,

    #[serde(default)]
    pub storage: RawStorageConfig,

    #[serde(default)]
    pub transport: RawTransportConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionsConfig {
    pub auth_root: Option<PathBuf>,
    pub settle_delay_secs: Option<u64>,
    pub teardown_delay_secs: Option<u64>,
    pub pending_ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub reconnect_max_attempts: Option<u32>,
    pub reconnect_window_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawWelcomeConfig {
    pub service_name: Option<String>,
    pub domain_suffix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStorageConfig {
    pub backend: Option<StorageBackend>,
    pub url: Option<String>,
    pub key: Option<String>,
    pub bucket: Option<String>,
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTransportConfig {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub browser_name: Option<String>,
    pub close_grace_secs: Option<u64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PairlinkConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub welcome: WelcomeConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Static web client directory
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionsConfig {
    /// Root of per-session credential directories
    pub auth_root: PathBuf,

    /// Seconds between connecting and sending the welcome/upload
    pub settle_delay_secs: u64,

    /// Seconds between connecting and closing the transport
    pub teardown_delay_secs: u64,

    /// Seconds before a never-connected session is evicted; 0 keeps them forever
    pub pending_ttl_secs: u64,

    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,

    /// Reconnect attempts allowed per window
    pub reconnect_max_attempts: u32,

    /// Window for counting reconnect attempts, in seconds
    pub reconnect_window_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            auth_root: PathBuf::from(DEFAULT_AUTH_ROOT),
            settle_delay_secs: 2,
            teardown_delay_secs: 120,
            pending_ttl_secs: 600,
            sweep_interval_secs: 60,
            reconnect_max_attempts: 5,
            reconnect_window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Supabase project URL
    pub url: Option<String>,

    /// Supabase API key; never printed
    #[serde(skip_serializing, default)]
    pub key: Option<String>,

    /// Supabase bucket
    pub bucket: String,

    /// Target directory of the local backend
    pub local_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            url: None,
            key: None,
            bucket: DEFAULT_BUCKET.to_string(),
            local_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    /// Bridge program
    pub command: String,

    /// Extra bridge arguments
    pub args: Vec<String>,

    /// Browser name announced to the remote side
    pub browser_name: String,

    /// Seconds a closing bridge may take to flush credentials
    pub close_grace_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command: pairlink_core::transport::DEFAULT_BRIDGE_COMMAND.to_string(),
            args: Vec::new(),
            browser_name: pairlink_core::session::config::DEFAULT_BROWSER_NAME.to_string(),
            close_grace_secs: pairlink_core::transport::bridge::DEFAULT_CLOSE_GRACE.as_secs(),
        }
    }
}

impl PairlinkConfig {
    /// Lifecycle settings for the controller
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        let sessions = &self.sessions;
        LifecycleConfig {
            settle_delay: Duration::from_secs(sessions.settle_delay_secs),
            teardown_delay: Duration::from_secs(sessions.teardown_delay_secs),
            pending_ttl: (sessions.pending_ttl_secs > 0)
                .then(|| Duration::from_secs(sessions.pending_ttl_secs)),
            sweep_interval: Duration::from_secs(sessions.sweep_interval_secs),
            reconnect_max_attempts: sessions.reconnect_max_attempts,
            reconnect_window: Duration::from_secs(sessions.reconnect_window_secs),
            browser_name: self.transport.browser_name.clone(),
            welcome: self.welcome.clone(),
        }
    }

    /// Bridge process settings
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            command: self.transport.command.clone(),
            args: self.transport.args.clone(),
            close_grace: Duration::from_secs(self.transport.close_grace_secs),
        }
    }
}
