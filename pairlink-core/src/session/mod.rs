//! Session registry, state machine and lifecycle controller

pub mod config;
pub mod id;
pub mod lifecycle;
pub mod machine;
pub mod registry;
pub mod restart;
pub mod state;

// Re-export key types for convenience
pub use config::LifecycleConfig;
pub use id::{SESSION_ID_PREFIX, generate_session_id, is_well_formed};
pub use lifecycle::LifecycleController;
pub use machine::{Effect, Input, MachineState, SessionPhase, Transition, transition};
pub use registry::{PhaseCounts, RegistryConfig, SessionRegistry};
pub use restart::RestartPolicy;
pub use state::{Session, SessionSnapshot, TransportSlot};
