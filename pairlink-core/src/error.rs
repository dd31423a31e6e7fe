//! Error types for pairlink-core

use thiserror::Error;

/// Top-level error type for pairlink-core
#[derive(Error, Debug)]
pub enum PairlinkError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Welcome error: {0}")]
    Welcome(#[from] WelcomeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Invalid lifecycle settings
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("teardown delay ({teardown:?}) must exceed settle delay ({settle:?})")]
    TeardownBeforeSettle {
        settle: std::time::Duration,
        teardown: std::time::Duration,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Errors surfaced by the session registry and lifecycle controller
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already has an active transport: {0}")]
    AlreadyActive(String),

    #[error("Failed to start transport for {session_id}: {source}")]
    TransportInstantiation {
        session_id: String,
        #[source]
        source: TransportError,
    },
}

/// Errors from messaging transports
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn transport bridge: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Transport bridge not found: {0}")]
    BridgeNotFound(String),

    #[error("Credential setup failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Transport is closed")]
    Closed,

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Errors from the on-disk credential store
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Credential I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed credential entry {name}: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid credential entry name: {0}")]
    InvalidName(String),
}

/// Errors from blob stores
#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("Blob store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Blob store rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Blob store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob store is disabled")]
    Disabled,
}

/// Errors from packaging and uploading credential archives
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Credential directory not found: {0}")]
    MissingDirectory(String),

    #[error("Failed to build archive: {0}")]
    Archive(String),

    #[error("Upload failed: {0}")]
    Store(#[from] BlobStoreError),
}

/// Errors rendering a pairing code
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Pairing code cannot be encoded: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors from the post-connect welcome sequence
#[derive(Error, Debug)]
pub enum WelcomeError {
    #[error("No live transport for session {0}")]
    NoTransport(String),

    #[error("Failed to send {step} message: {source}")]
    Send {
        step: &'static str,
        #[source]
        source: TransportError,
    },
}
