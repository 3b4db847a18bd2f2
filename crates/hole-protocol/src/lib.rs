//! Wire protocol for the Hole block store.
//!
//! Defines the framing, message types and serialization format used between
//! a network backend and the block server of the peer it talks to, plus both
//! ends of the connection: [`Channel`] and [`Server`].

pub mod channel;
pub mod codec;
pub mod error;
pub mod message;
pub mod server;

pub use channel::Channel;
pub use codec::HoleCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{codes, HoleMessage, RemoteFailure, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
pub use server::Server;
