//! Real-time push: the connection registry and the WebSocket endpoint feeding it.

pub mod registry;
pub mod socket;

pub use registry::{
    ConnectionHandle, ConnectionRegistry, InMemoryConnectionRegistry, PushError, PushMessage,
};
