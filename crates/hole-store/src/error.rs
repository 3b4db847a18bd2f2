use hole_types::{Address, Component, Digest, Family, Version};

/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No block is stored under the address (or the requested version).
    #[error("block not found: {0}")]
    NotFound(Address),

    /// The block variant does not belong to the address family.
    #[error("family mismatch for {address}: block is {block}")]
    FamilyMismatch { address: Address, block: Family },

    /// The block belongs to a different component than the address.
    #[error("component mismatch for {address}: block is {block}")]
    ComponentMismatch { address: Address, block: Component },

    /// The address carries a family no block variant maps to.
    #[error("unknown block family: {0}")]
    UnknownFamily(Family),

    /// Stored or received content does not hash to the address digest.
    #[error("integrity failure for {address}: content hashes to {computed}")]
    IntegrityFailure { address: Address, computed: Digest },

    /// A mutable put did not advance the version history.
    #[error("version conflict for {address}: version {version} is not newer than {latest}")]
    VersionConflict {
        address: Address,
        version: Version,
        latest: Version,
    },

    /// The peer could not be reached or the connection broke.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// A network round trip did not complete in time.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    /// The backend has not joined its network yet.
    #[error("backend has not joined the network")]
    NotJoined,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A peer reported a failure that has no dedicated variant.
    #[error("remote error {code}: {message}")]
    Remote { code: u32, message: String },
}

impl BackendError {
    /// Transient network failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
