use async_trait::async_trait;
use hole_types::{Address, Version};

use crate::block::Block;
use crate::error::BackendResult;

/// Replication strategy behind the store facade.
///
/// All implementations must satisfy these invariants:
/// - `put` of an immutable block is idempotent; `put` of a mutable block
///   appends a version and never overwrites an existing one with different
///   content.
/// - `get` never returns a block that fails [`Block::verify`] for the
///   requested address.
/// - `kill` removes every version stored under the address and reports
///   `NotFound` if there was nothing to remove.
/// - A block whose variant does not match the address family is rejected.
/// - A failed `put` leaves no partially written block visible.
#[async_trait]
pub trait Holeable: Send + Sync {
    /// Acquire whatever the backend needs to serve requests. Idempotent.
    async fn join(&self) -> BackendResult<()>;

    /// Release backend resources. Safe after a partial `join`.
    async fn leave(&self) -> BackendResult<()>;

    /// Store `block` under `address`.
    async fn put(&self, address: &Address, block: &Block) -> BackendResult<()>;

    /// Fetch the block stored under `address`.
    ///
    /// For mutable addresses `None` selects the latest version. The version
    /// is ignored for immutable addresses.
    async fn get(&self, address: &Address, version: Option<Version>) -> BackendResult<Block>;

    /// Remove the block (all versions) stored under `address`.
    async fn kill(&self, address: &Address) -> BackendResult<()>;
}
