//! Network backends for the Hole block store.
//!
//! - [`RemoteBackend`] stores every block on one fixed peer.
//! - [`SlugBackend`] spreads blocks over a dynamic group of peers, with a
//!   replication target for writes and read repair for immutable blocks.
//!
//! Both speak the `hole-protocol` wire format to a peer running
//! [`hole_protocol::Server`]. Neither caches nor retries; transport failures
//! surface as `Unreachable` or `Timeout` for the caller to handle.

pub mod remote;
pub mod slug;

#[cfg(test)]
pub(crate) mod testing;

pub use remote::RemoteBackend;
pub use slug::{SlugBackend, SlugConfig};
