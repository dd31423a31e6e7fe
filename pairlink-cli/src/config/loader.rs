use super::types::{
    DEFAULT_AUTH_ROOT, DEFAULT_BUCKET, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PUBLIC_DIR,
    PairlinkConfig, RawPairlinkConfig, RawServerConfig, RawSessionsConfig, RawStorageConfig,
    RawTransportConfig, RawWelcomeConfig, ServerConfig, SessionsConfig, StorageBackend,
    StorageConfig, TransportConfig,
};
use anyhow::{Context, Result};
use pairlink_core::WelcomeConfig;
use std::path::{Path, PathBuf};

/// Environment variables that override file settings
pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "PAIRLINK_HOST";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_KEY: &str = "SUPABASE_KEY";
pub const ENV_BUCKET: &str = "PAIRLINK_BUCKET";
pub const ENV_PROJECT_CONFIG_DIR: &str = "PAIRLINK_PROJECT_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<PairlinkConfig> {
        Self::load_with(None)
    }

    /// Load merged configuration, layering `explicit` above the project file
    pub fn load_with(explicit: Option<&Path>) -> Result<PairlinkConfig> {
        let mut raw = RawPairlinkConfig::default();

        // Layer 1: User config
        if let Some(user_config) = Self::read_raw(&Self::user_config_path())? {
            raw = Self::merge_raw(raw, user_config);
        }

        // Layer 2: Project config
        if let Some(project_config) = Self::read_raw(&Self::project_config_path())? {
            raw = Self::merge_raw(raw, project_config);
        }

        // Layer 3: File given on the command line; it must exist
        if let Some(path) = explicit {
            let explicit_config = Self::read_raw(path)?
                .with_context(|| format!("config file not found: {}", path.display()))?;
            raw = Self::merge_raw(raw, explicit_config);
        }

        // Layer 4: Environment
        let env = Self::env_overrides(|key| std::env::var(key).ok())?;
        raw = Self::merge_raw(raw, env);

        Ok(Self::finalize(raw))
    }

    /// Get user config path
    pub fn user_config_path() -> PathBuf {
        pairlink_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with PAIRLINK_PROJECT_CONFIG_DIR (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_PROJECT_CONFIG_DIR) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".pairlink/config.toml")
        }
    }

    /// Read one TOML layer, `None` if the file does not exist
    fn read_raw(path: &Path) -> Result<Option<RawPairlinkConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Build a layer from environment variables
    fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> Result<RawPairlinkConfig> {
        let port = lookup(ENV_PORT)
            .map(|value| {
                value
                    .parse::<u16>()
                    .with_context(|| format!("{ENV_PORT} is not a valid port: {value}"))
            })
            .transpose()?;

        Ok(RawPairlinkConfig {
            server: RawServerConfig {
                host: lookup(ENV_HOST),
                port,
                public_dir: None,
            },
            storage: RawStorageConfig {
                url: lookup(ENV_SUPABASE_URL),
                key: lookup(ENV_SUPABASE_KEY),
                bucket: lookup(ENV_BUCKET),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawPairlinkConfig, overlay: RawPairlinkConfig) -> RawPairlinkConfig {
        RawPairlinkConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                public_dir: overlay.server.public_dir.or(base.server.public_dir),
            },
            sessions: RawSessionsConfig {
                auth_root: overlay.sessions.auth_root.or(base.sessions.auth_root),
                settle_delay_secs: overlay
                    .sessions
                    .settle_delay_secs
                    .or(base.sessions.settle_delay_secs),
                teardown_delay_secs: overlay
                    .sessions
                    .teardown_delay_secs
                    .or(base.sessions.teardown_delay_secs),
                pending_ttl_secs: overlay
                    .sessions
                    .pending_ttl_secs
                    .or(base.sessions.pending_ttl_secs),
                sweep_interval_secs: overlay
                    .sessions
                    .sweep_interval_secs
                    .or(base.sessions.sweep_interval_secs),
                reconnect_max_attempts: overlay
                    .sessions
                    .reconnect_max_attempts
                    .or(base.sessions.reconnect_max_attempts),
                reconnect_window_secs: overlay
                    .sessions
                    .reconnect_window_secs
                    .or(base.sessions.reconnect_window_secs),
            },
            welcome: RawWelcomeConfig {
                service_name: overlay.welcome.service_name.or(base.welcome.service_name),
                domain_suffix: overlay.welcome.domain_suffix.or(base.welcome.domain_suffix),
            },
            storage: RawStorageConfig {
                backend: overlay.storage.backend.or(base.storage.backend),
                url: overlay.storage.url.or(base.storage.url),
                key: overlay.storage.key.or(base.storage.key),
                bucket: overlay.storage.bucket.or(base.storage.bucket),
                local_dir: overlay.storage.local_dir.or(base.storage.local_dir),
            },
            transport: RawTransportConfig {
                command: overlay.transport.command.or(base.transport.command),
                args: overlay.transport.args.or(base.transport.args),
                browser_name: overlay.transport.browser_name.or(base.transport.browser_name),
                close_grace_secs: overlay
                    .transport
                    .close_grace_secs
                    .or(base.transport.close_grace_secs),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawPairlinkConfig) -> PairlinkConfig {
        let session_defaults = SessionsConfig::default();
        let welcome_defaults = WelcomeConfig::default();
        let transport_defaults = TransportConfig::default();

        // Supabase is chosen implicitly once credentials for it are present
        let backend = raw.storage.backend.unwrap_or(
            if raw.storage.url.is_some() && raw.storage.key.is_some() {
                StorageBackend::Supabase
            } else {
                StorageBackend::Local
            },
        );

        PairlinkConfig {
            server: ServerConfig {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
                public_dir: raw
                    .server
                    .public_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR)),
            },
            sessions: SessionsConfig {
                auth_root: raw
                    .sessions
                    .auth_root
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_AUTH_ROOT)),
                settle_delay_secs: raw
                    .sessions
                    .settle_delay_secs
                    .unwrap_or(session_defaults.settle_delay_secs),
                teardown_delay_secs: raw
                    .sessions
                    .teardown_delay_secs
                    .unwrap_or(session_defaults.teardown_delay_secs),
                pending_ttl_secs: raw
                    .sessions
                    .pending_ttl_secs
                    .unwrap_or(session_defaults.pending_ttl_secs),
                sweep_interval_secs: raw
                    .sessions
                    .sweep_interval_secs
                    .unwrap_or(session_defaults.sweep_interval_secs),
                reconnect_max_attempts: raw
                    .sessions
                    .reconnect_max_attempts
                    .unwrap_or(session_defaults.reconnect_max_attempts),
                reconnect_window_secs: raw
                    .sessions
                    .reconnect_window_secs
                    .unwrap_or(session_defaults.reconnect_window_secs),
            },
            welcome: WelcomeConfig {
                service_name: raw
                    .welcome
                    .service_name
                    .unwrap_or(welcome_defaults.service_name),
                domain_suffix: raw
                    .welcome
                    .domain_suffix
                    .unwrap_or(welcome_defaults.domain_suffix),
            },
            storage: StorageConfig {
                backend,
                url: raw.storage.url,
                key: raw.storage.key,
                bucket: raw
                    .storage
                    .bucket
                    .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                local_dir: raw.storage.local_dir,
            },
            transport: TransportConfig {
                command: raw.transport.command.unwrap_or(transport_defaults.command),
                args: raw.transport.args.unwrap_or(transport_defaults.args),
                browser_name: raw
                    .transport
                    .browser_name
                    .unwrap_or(transport_defaults.browser_name),
                close_grace_secs: raw
                    .transport
                    .close_grace_secs
                    .unwrap_or(transport_defaults.close_grace_secs),
            },
        }
    }

    /// Load a single file with defaults applied (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<PairlinkConfig> {
        Ok(Self::finalize(Self::read_raw(path)?.unwrap_or_default()))
    }
}
