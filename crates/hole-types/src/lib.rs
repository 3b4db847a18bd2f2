//! Foundation types for the Hole block store.
//!
//! Every other `hole-*` crate depends on these identity types.
//!
//! # Key Types
//!
//! - [`Address`] -- Stable block identity: family, component and digest
//! - [`Family`] -- Immutable content-hash blocks vs the mutable, versioned kinds
//! - [`Digest`] -- 32-byte BLAKE3 digest
//! - [`Version`] -- Version counter of a mutable block
//! - [`Network`] -- Validated network name keying on-disk layouts

pub mod address;
pub mod digest;
pub mod error;
pub mod network;
pub mod version;

pub use address::{Address, Component, Family};
pub use digest::Digest;
pub use error::TypeError;
pub use network::Network;
pub use version::Version;
