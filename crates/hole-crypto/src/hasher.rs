use hole_types::{Digest, Family};

/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag (e.g. `"hole-chb-v1"`) that is prepended
/// to every hash computation, so a content-hash block and an owner-key seed
/// with identical bytes never produce the same digest.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for immutable block content.
    pub const CONTENT_HASH_BLOCK: Self = Self {
        domain: "hole-chb-v1",
    };
    /// Hasher for public-key block seeds.
    pub const PUBLIC_KEY_BLOCK: Self = Self {
        domain: "hole-pkb-v1",
    };
    /// Hasher for owner-key block seeds.
    pub const OWNER_KEY_BLOCK: Self = Self {
        domain: "hole-okb-v1",
    };
    /// Hasher for imprint block seeds.
    pub const IMPRINT_BLOCK: Self = Self {
        domain: "hole-imb-v1",
    };
    /// Hasher for signed configuration artifacts.
    pub const ARTIFACT: Self = Self {
        domain: "hole-artifact-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// The hasher used to derive addresses of the given family, if any.
    pub fn for_family(family: Family) -> Option<&'static Self> {
        match family {
            Family::ContentHash => Some(&Self::CONTENT_HASH_BLOCK),
            Family::PublicKey => Some(&Self::PUBLIC_KEY_BLOCK),
            Family::OwnerKey => Some(&Self::OWNER_KEY_BLOCK),
            Family::Imprint => Some(&Self::IMPRINT_BLOCK),
            Family::Unknown => None,
        }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Digest, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
