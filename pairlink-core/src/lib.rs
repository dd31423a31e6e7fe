//! pairlink-core: session pairing lifecycle for pairlink
//!
//! This crate holds everything between the HTTP surface and the messaging
//! transport:
//!
//! - **Session registry** - [`SessionRegistry`] owns every session keyed by its opaque id
//! - **State machine** - [`session::transition`] maps a session state and an input to the next state and its effects
//! - **Lifecycle controller** - [`LifecycleController`] starts transports, pumps their events and runs deferred welcome, upload and teardown
//! - **Transports** - the [`TransportFactory`] seam with a bridge-process implementation and a scripted mock
//! - **Credentials** - [`CredentialStore`] per-session key material, zipped and shipped by [`ArchiveUploader`]
//!
//! # Architecture
//!
//! ```text
//! create ─► SessionRegistry ◄── LifecycleController ──► TransportFactory
//!                                  │      ▲                  │
//!                                  │      └── event pump ◄───┘
//!                                  ├─► welcome (send_message)
//!                                  ├─► ArchiveUploader ─► BlobStore
//!                                  └─► teardown (close)
//! ```

pub mod credentials;
pub mod error;
pub mod render;
pub mod session;
pub mod storage;
pub mod transport;
pub mod welcome;

// Re-export key types for convenience
pub use credentials::{CredentialState, CredentialStore};
pub use error::{
    BlobStoreError, ConfigError, CredentialError, PairlinkError, RenderError, SessionError,
    TransportError, UploadError, WelcomeError,
};
pub use render::render_pairing_code;
pub use session::{
    LifecycleConfig, LifecycleController, PhaseCounts, SessionPhase, SessionRegistry,
    SessionSnapshot,
};
pub use storage::{
    ArchiveUploader, BlobStore, DisabledBlobStore, LocalBlobStore, MemoryBlobStore,
    SupabaseConfig, SupabaseStorage,
};
pub use transport::{
    BridgeConfig, BridgeTransportFactory, DisconnectCause, MockTransportFactory, Transport,
    TransportEvent, TransportFactory,
};
pub use welcome::WelcomeConfig;
