//! Serve command for running the pairing server
//!
//! Wires the configured transport, credential store and blob store into a
//! lifecycle controller and serves the HTTP API until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use pairlink_core::{
    ArchiveUploader, BlobStore, BridgeTransportFactory, CredentialStore, DisabledBlobStore,
    LifecycleController, LocalBlobStore, SessionRegistry, SupabaseConfig, SupabaseStorage,
};
use pairlink_server::{AppState, PairlinkServer, ServerConfig};
use tracing::{info, warn};

use crate::config::{ConfigLoader, PairlinkConfig, StorageBackend};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Extra config file layered above the project config
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = ConfigLoader::load_with(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let server = build_server(&config)?;
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    info!(
        "Starting pairlink server on {}:{}",
        config.server.host, config.server.port
    );
    server.run().await.map_err(Into::into)
}

/// Assemble the server from a finished configuration
fn build_server(config: &PairlinkConfig) -> Result<PairlinkServer> {
    let lifecycle = config.lifecycle_config();
    lifecycle.validate().context("invalid session timing")?;

    let credentials = CredentialStore::new(&config.sessions.auth_root);
    let uploader = Arc::new(ArchiveUploader::new(
        credentials.clone(),
        blob_store(config)?,
    ));
    let factory = Arc::new(BridgeTransportFactory::new(config.bridge_config()));
    let registry = Arc::new(SessionRegistry::new(lifecycle.registry_config()));
    let controller = Arc::new(LifecycleController::new(
        registry,
        factory,
        credentials,
        uploader,
        lifecycle,
    ));

    let mut server_config = ServerConfig::new(config.server.host.clone(), config.server.port);
    if config.server.public_dir.is_dir() {
        server_config = server_config.with_public_dir(config.server.public_dir.clone());
    } else {
        warn!(
            "Static client directory {:?} not found, serving API only",
            config.server.public_dir
        );
    }

    Ok(PairlinkServer::new(
        server_config,
        Arc::new(AppState::new(controller)),
    ))
}

/// Select the archive destination
fn blob_store(config: &PairlinkConfig) -> Result<Arc<dyn BlobStore>> {
    let storage = &config.storage;
    let store: Arc<dyn BlobStore> = match storage.backend {
        StorageBackend::Supabase => {
            let url = storage
                .url
                .clone()
                .context("supabase storage needs SUPABASE_URL or storage.url")?;
            let key = storage
                .key
                .clone()
                .context("supabase storage needs SUPABASE_KEY or storage.key")?;
            info!("Archiving credentials to supabase bucket {}", storage.bucket);
            Arc::new(SupabaseStorage::new(SupabaseConfig {
                url,
                key,
                bucket: storage.bucket.clone(),
            }))
        }
        StorageBackend::Local => {
            let dir = storage
                .local_dir
                .clone()
                .unwrap_or_else(pairlink_paths::archive_dir);
            info!("Archiving credentials to {:?}", dir);
            Arc::new(LocalBlobStore::new(dir))
        }
        StorageBackend::Disabled => {
            warn!("Credential archiving is disabled");
            Arc::new(DisabledBlobStore)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn test_serve_args_defaults() {
        let cli = TestCli::parse_from(["test"]);
        assert!(cli.serve.port.is_none());
        assert!(cli.serve.host.is_none());
        assert!(cli.serve.config.is_none());
    }

    #[test]
    fn test_serve_args_custom_port() {
        let cli = TestCli::parse_from(["test", "--port", "8080", "--host", "127.0.0.1"]);
        assert_eq!(cli.serve.port, Some(8080));
        assert_eq!(cli.serve.host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_supabase_without_key_is_error() {
        let mut config = PairlinkConfig::default();
        config.storage.backend = StorageBackend::Supabase;
        config.storage.url = Some("https://x.supabase.co".to_string());

        let err = blob_store(&config).err().unwrap();
        assert!(err.to_string().contains("SUPABASE_KEY"));
    }

    #[test]
    fn test_invalid_timing_is_rejected() {
        let mut config = PairlinkConfig::default();
        config.sessions.settle_delay_secs = 10;
        config.sessions.teardown_delay_secs = 5;

        let err = build_server(&config).err().unwrap();
        assert!(err.to_string().contains("invalid session timing"));
    }

    #[tokio::test]
    async fn test_build_server_with_disabled_storage() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = PairlinkConfig::default();
        config.storage.backend = StorageBackend::Disabled;
        config.sessions.auth_root = temp.path().join("auth");
        config.server.public_dir = temp.path().join("missing");
        config.server.port = 0;

        let server = build_server(&config).unwrap();
        assert!(server.config().public_dir.is_none());
        assert_eq!(server.state().registry().len().await, 0);
    }
}
