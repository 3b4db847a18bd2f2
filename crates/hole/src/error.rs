use thiserror::Error;

use hole_store::BackendError;
use hole_types::{Address, Family};

#[derive(Debug, Error)]
pub enum HoleError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported topology model: {0}")]
    UnsupportedModel(String),

    #[error("unknown address family: {0}")]
    UnknownFamily(Family),

    #[error("block family {block} does not match address {address}")]
    FamilyMismatch { address: Address, block: Family },

    #[error("store not initialized")]
    NotInitialized,

    #[error("store already initialized")]
    AlreadyInitialized,

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl HoleError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the failure is transient and may succeed if the caller retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_retryable())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_not_found())
    }
}

pub type HoleResult<T> = Result<T, HoleError>;
