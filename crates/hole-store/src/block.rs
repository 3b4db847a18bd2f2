use serde::{Deserialize, Serialize};
use hole_crypto::ContentHasher;
use hole_types::{Address, Component, Family, TypeError, Version};

use crate::error::{BackendError, BackendResult};

// ---------------------------------------------------------------------------
// ImmutableBlock
// ---------------------------------------------------------------------------

/// Content-hashed block. Its address digest is the hash of its content, so
/// the block verifies itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutableBlock {
    component: Component,
    content: Vec<u8>,
}

impl ImmutableBlock {
    pub fn new(component: Component, content: impl Into<Vec<u8>>) -> Self {
        Self {
            component,
            content: content.into(),
        }
    }

    /// The content-hash address of this block.
    pub fn address(&self) -> Address {
        let digest = ContentHasher::CONTENT_HASH_BLOCK.hash(&self.content);
        Address::new(Family::ContentHash, self.component, digest)
            .expect("content-hash family is always valid")
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

// ---------------------------------------------------------------------------
// MutableBlock
// ---------------------------------------------------------------------------

/// Versioned block owned by a key or an imprint.
///
/// The address names the object, not a version: every version of the object
/// lives under the same address. Content is not self-verifying; ownership
/// is checked by signature before a block reaches this layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutableBlock {
    family: Family,
    component: Component,
    version: Version,
    content: Vec<u8>,
}

impl MutableBlock {
    /// Create a mutable block. `family` must be one of the mutable families.
    pub fn new(
        family: Family,
        component: Component,
        version: Version,
        content: impl Into<Vec<u8>>,
    ) -> Result<Self, TypeError> {
        if !family.is_mutable() {
            return Err(TypeError::InvalidFamily(family));
        }
        Ok(Self {
            family,
            component,
            version,
            content: content.into(),
        })
    }

    /// Derive the address of a mutable object from its identifying seed
    /// (owner public key, imprint material).
    pub fn derive_address(
        family: Family,
        component: Component,
        seed: &[u8],
    ) -> Result<Address, TypeError> {
        if !family.is_mutable() {
            return Err(TypeError::InvalidFamily(family));
        }
        let hasher = ContentHasher::for_family(family).ok_or(TypeError::InvalidFamily(family))?;
        Address::new(family, component, hasher.hash(seed))
    }

    /// The next version of this object with new content.
    pub fn successor(&self, content: impl Into<Vec<u8>>) -> Self {
        Self {
            family: self.family,
            component: self.component,
            version: self.version.next(),
            content: content.into(),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// The unit persisted by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Immutable(ImmutableBlock),
    Mutable(MutableBlock),
}

impl Block {
    pub fn family(&self) -> Family {
        match self {
            Self::Immutable(_) => Family::ContentHash,
            Self::Mutable(mb) => mb.family,
        }
    }

    pub fn component(&self) -> Component {
        match self {
            Self::Immutable(ib) => ib.component,
            Self::Mutable(mb) => mb.component,
        }
    }

    pub fn content(&self) -> &[u8] {
        match self {
            Self::Immutable(ib) => &ib.content,
            Self::Mutable(mb) => &mb.content,
        }
    }

    /// Version of a mutable block; `None` for immutable blocks.
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Immutable(_) => None,
            Self::Mutable(mb) => Some(mb.version),
        }
    }

    /// Returns `true` if the block may be stored under `address`.
    ///
    /// Family and component must agree with the address. Immutable blocks
    /// must also hash to the address digest.
    pub fn verify(&self, address: &Address) -> bool {
        self.check(address).is_ok()
    }

    /// Like [`Block::verify`], but reports which rule failed.
    pub fn check(&self, address: &Address) -> BackendResult<()> {
        let family = address.family();
        if family == Family::Unknown {
            return Err(BackendError::UnknownFamily(family));
        }
        if self.family() != family {
            return Err(BackendError::FamilyMismatch {
                address: *address,
                block: self.family(),
            });
        }
        if self.component() != address.component() {
            return Err(BackendError::ComponentMismatch {
                address: *address,
                block: self.component(),
            });
        }
        if let Self::Immutable(ib) = self {
            let computed = ContentHasher::CONTENT_HASH_BLOCK.hash(&ib.content);
            if computed != *address.digest() {
                return Err(BackendError::IntegrityFailure {
                    address: *address,
                    computed,
                });
            }
        }
        Ok(())
    }

    /// Serialize for persistence or transfer.
    pub fn to_bytes(&self) -> BackendResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BackendError::Serialization(e.to_string()))
    }

    /// Decode bytes produced by [`Block::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> BackendResult<Self> {
        bincode::deserialize(data).map_err(|e| BackendError::Serialization(e.to_string()))
    }
}

impl From<ImmutableBlock> for Block {
    fn from(block: ImmutableBlock) -> Self {
        Self::Immutable(block)
    }
}

impl From<MutableBlock> for Block {
    fn from(block: MutableBlock) -> Self {
        Self::Mutable(block)
    }
}
