//! Messaging transports
//!
//! [`TransportFactory`] is the seam the lifecycle controller depends on.
//! [`BridgeTransportFactory`] drives an external bridge process in
//! production; [`MockTransportFactory`] is scripted by tests.

pub mod bridge;
pub mod mock;
pub mod traits;

pub use bridge::{BridgeConfig, BridgeTransportFactory, DEFAULT_BRIDGE_COMMAND};
pub use mock::{MockTransport, MockTransportFactory, SentMessage};
pub use traits::{
    DisconnectCause, LOGGED_OUT_STATUS, Transport, TransportEvent, TransportFactory,
    TransportOptions, TransportSession,
};
