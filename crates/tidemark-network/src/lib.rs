//! Network adapter capability and wire messages for the Tidemark sync engine.
//!
//! The repo core is transport-agnostic: anything that can carry
//! [`RepoMessage`]s between peers and surface [`NetworkEvent`]s implements
//! [`NetworkAdapter`]. This crate also ships [`ChannelAdapter`], an
//! in-process paired transport used by the end-to-end tests; production
//! transports (WebSocket servers, broadcast buses) live elsewhere.

pub mod adapter;
pub mod channel;
pub mod error;
pub mod message;

pub use adapter::{NetworkAdapter, NetworkEvent};
pub use channel::ChannelAdapter;
pub use error::{NetworkError, Result};
pub use message::RepoMessage;
