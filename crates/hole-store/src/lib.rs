//! Block model and backend contract for the Hole block store.
//!
//! A block is either immutable (content-hashed, self-verifying) or mutable
//! (versioned, owner-keyed). Backends implement [`Holeable`] and are
//! interchangeable behind the store facade.
//!
//! # Block Types
//!
//! - [`ImmutableBlock`] -- content whose hash is the address digest
//! - [`MutableBlock`] -- versioned content under a stable, seed-derived address
//! - [`Block`] -- the persisted unit, one of the two
//!
//! # Backends
//!
//! - [`LocalBackend`] -- one directory per network on the local disk
//!
//! Network backends live in `hole-net`.
//!
//! # Design Rules
//!
//! 1. Immutable puts are idempotent; mutable puts append versions.
//! 2. Writes are atomic: write to a temporary file, then rename.
//! 3. Every block read is verified against its address before it is returned.
//! 4. Family/variant disagreement is rejected, never coerced.
//! 5. All I/O errors are propagated, never silently ignored.
//! 6. Writes and removals on one address are serialized with [`AddressLocks`].

pub mod block;
pub mod error;
pub mod local;
pub mod locks;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use block::{Block, ImmutableBlock, MutableBlock};
pub use error::{BackendError, BackendResult};
pub use local::LocalBackend;
pub use locks::{AddressGuard, AddressLocks};
pub use traits::Holeable;
