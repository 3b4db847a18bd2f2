//! The Hole block store.
//!
//! [`Hole`] is the single entry point the rest of a node talks to. It reads
//! the network's signed [`Descriptor`] and the device's [`Passport`], builds
//! the backend the descriptor's [`Model`] names (local disk, one remote peer,
//! or a peer group) and routes every push, pull and wipe to it by address
//! family.
//!
//! ```no_run
//! # async fn run() -> hole::HoleResult<()> {
//! use hole::{Hole, HoleConfig};
//!
//! let mut hole = Hole::new(HoleConfig::load("hole.toml".as_ref())?);
//! hole.initialize()?;
//! hole.join().await?;
//! hole.ready()?;
//! let root = hole.pull(&hole.origin()?, None).await?;
//! # let _ = root;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod hole;
pub mod implementation;
pub mod passport;
pub mod set;

pub use artifact::Artifact;
pub use config::HoleConfig;
pub use descriptor::{Descriptor, Model};
pub use error::{HoleError, HoleResult};
pub use hole::{Hole, State};
pub use implementation::Implementation;
pub use passport::Passport;
pub use set::Set;

// Re-export the block model so callers need only this crate.
pub use hole_store::{AddressLocks, BackendError, Block, ImmutableBlock, MutableBlock};
pub use hole_types::{Address, Component, Digest, Family, Network, Version};
