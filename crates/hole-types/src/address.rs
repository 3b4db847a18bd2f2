use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::TypeError;

/// Identity scheme of a block.
///
/// `ContentHash` blocks are immutable and self-verifying. The other known
/// families are mutable and versioned; their content cannot be checked
/// against the digest alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Family {
    ContentHash,
    PublicKey,
    OwnerKey,
    Imprint,
    Unknown,
}

impl Family {
    /// All families that name a storable block.
    pub const KNOWN: [Family; 4] = [
        Family::ContentHash,
        Family::PublicKey,
        Family::OwnerKey,
        Family::Imprint,
    ];

    /// Returns `true` for the versioned families.
    pub fn is_mutable(&self) -> bool {
        matches!(self, Self::PublicKey | Self::OwnerKey | Self::Imprint)
    }

    /// Returns `true` for the content-hash family.
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::ContentHash)
    }

    /// Short tag used in the textual address form.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ContentHash => "chb",
            Self::PublicKey => "pkb",
            Self::OwnerKey => "okb",
            Self::Imprint => "imb",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a tag produced by [`Family::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "chb" => Some(Self::ContentHash),
            "pkb" => Some(Self::PublicKey),
            "okb" => Some(Self::OwnerKey),
            "imb" => Some(Self::Imprint),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Subsystem owning a block. Opaque to the storage layer; it only takes part
/// in identity and ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    Object,
    Contents,
    Data,
    Catalog,
    Reference,
    Access,
    Group,
}

impl Component {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Contents => "contents",
            Self::Data => "data",
            Self::Catalog => "catalog",
            Self::Reference => "reference",
            Self::Access => "access",
            Self::Group => "group",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "object" => Some(Self::Object),
            "contents" => Some(Self::Contents),
            "data" => Some(Self::Data),
            "catalog" => Some(Self::Catalog),
            "reference" => Some(Self::Reference),
            "access" => Some(Self::Access),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Stable identity of a block across backends and across the lifetime of
/// the network.
///
/// Equality and ordering are lexicographic over `(family, component, digest)`;
/// the derives below rely on the field order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    family: Family,
    component: Component,
    digest: Digest,
}

impl Address {
    /// Build an address. `Family::Unknown` is rejected.
    pub fn new(family: Family, component: Component, digest: Digest) -> Result<Self, TypeError> {
        if family == Family::Unknown {
            return Err(TypeError::InvalidFamily(family));
        }
        Ok(Self {
            family,
            component,
            digest,
        })
    }

    /// The null address: a content-hash address with an all-zero digest.
    /// It never designates a stored block.
    pub const fn null() -> Self {
        Self {
            family: Family::ContentHash,
            component: Component::Object,
            digest: Digest::zero(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.digest.is_zero()
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Textual form `<family>.<component>.<hex digest>`.
    ///
    /// This string is collision-free across families and components and is
    /// safe to use as a file name.
    pub fn unique(&self) -> String {
        format!("{}.{}.{}", self.family, self.component, self.digest.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Address({}.{}.{})",
            self.family,
            self.component,
            self.digest.short_hex()
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unique())
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypeError::InvalidAddress {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let mut parts = s.splitn(3, '.');
        let (Some(family), Some(component), Some(digest)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected <family>.<component>.<digest>"));
        };
        let family = Family::from_tag(family).ok_or_else(|| invalid("unknown family tag"))?;
        let component =
            Component::from_tag(component).ok_or_else(|| invalid("unknown component tag"))?;
        let digest = Digest::from_hex(digest)?;
        Address::new(family, component, digest)
    }
}
