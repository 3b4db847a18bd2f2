use serde::{Deserialize, Serialize};
use hole_store::{BackendError, Block};
use hole_types::{Address, Component, Digest, Family, Version};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// All message types exchanged between a block client and a block server.
///
/// A connection starts with `Hello`/`HelloAck`, then carries strictly
/// alternating request/response pairs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoleMessage {
    Hello { version: u32, network: String },
    HelloAck { version: u32 },
    Put { address: Address, block: Block },
    Get { address: Address, version: Option<Version> },
    Kill { address: Address },
    Block { block: Block },
    Ack,
    Error(RemoteFailure),
}

impl HoleMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Hello { .. } => 1,
            Self::HelloAck { .. } => 2,
            Self::Put { .. } => 3,
            Self::Get { .. } => 4,
            Self::Kill { .. } => 5,
            Self::Block { .. } => 6,
            Self::Ack => 7,
            Self::Error(_) => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::HelloAck { .. } => "HelloAck",
            Self::Put { .. } => "Put",
            Self::Get { .. } => "Get",
            Self::Kill { .. } => "Kill",
            Self::Block { .. } => "Block",
            Self::Ack => "Ack",
            Self::Error(_) => "Error",
        }
    }
}

/// Failure reported by the serving side of a request.
///
/// Carries enough structure for the client to rebuild the matching
/// [`BackendError`] for the address it asked about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteFailure {
    NotFound,
    FamilyMismatch { block: Family },
    ComponentMismatch { block: Component },
    UnknownFamily(Family),
    IntegrityFailure { computed: Digest },
    VersionConflict { version: Version, latest: Version },
    Rejected { code: u32, message: String },
}

impl RemoteFailure {
    pub fn code(&self) -> u32 {
        match self {
            Self::NotFound => codes::NOT_FOUND,
            Self::FamilyMismatch { .. } | Self::ComponentMismatch { .. } => {
                codes::FAMILY_MISMATCH
            }
            Self::UnknownFamily(_) => codes::BAD_REQUEST,
            Self::IntegrityFailure { .. } => codes::INTEGRITY_FAILURE,
            Self::VersionConflict { .. } => codes::VERSION_CONFLICT,
            Self::Rejected { code, .. } => *code,
        }
    }

    pub fn rejected(code: u32, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Server side: describe a backend failure for the wire.
    pub fn from_backend(err: &BackendError) -> Self {
        match err {
            BackendError::NotFound(_) => Self::NotFound,
            BackendError::FamilyMismatch { block, .. } => Self::FamilyMismatch { block: *block },
            BackendError::ComponentMismatch { block, .. } => {
                Self::ComponentMismatch { block: *block }
            }
            BackendError::UnknownFamily(family) => Self::UnknownFamily(*family),
            BackendError::IntegrityFailure { computed, .. } => Self::IntegrityFailure {
                computed: *computed,
            },
            BackendError::VersionConflict {
                version, latest, ..
            } => Self::VersionConflict {
                version: *version,
                latest: *latest,
            },
            BackendError::Remote { code, message } => Self::rejected(*code, message.clone()),
            other => Self::rejected(codes::INTERNAL, other.to_string()),
        }
    }

    /// Client side: rebuild the backend failure for the requested address.
    pub fn into_backend(self, address: &Address) -> BackendError {
        match self {
            Self::NotFound => BackendError::NotFound(*address),
            Self::FamilyMismatch { block } => BackendError::FamilyMismatch {
                address: *address,
                block,
            },
            Self::ComponentMismatch { block } => BackendError::ComponentMismatch {
                address: *address,
                block,
            },
            Self::UnknownFamily(family) => BackendError::UnknownFamily(family),
            Self::IntegrityFailure { computed } => BackendError::IntegrityFailure {
                address: *address,
                computed,
            },
            Self::VersionConflict { version, latest } => BackendError::VersionConflict {
                address: *address,
                version,
                latest,
            },
            Self::Rejected { code, message } => BackendError::Remote { code, message },
        }
    }
}

/// Numeric codes carried by [`RemoteFailure`].
pub mod codes {
    pub const BAD_REQUEST: u32 = 400;
    pub const WRONG_NETWORK: u32 = 403;
    pub const NOT_FOUND: u32 = 404;
    pub const VERSION_CONFLICT: u32 = 409;
    pub const FAMILY_MISMATCH: u32 = 422;
    pub const INTEGRITY_FAILURE: u32 = 460;
    pub const INTERNAL: u32 = 500;
    pub const UNSUPPORTED_VERSION: u32 = 505;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hole_store::ImmutableBlock;
    use hole_types::Component;

    fn address() -> Address {
        ImmutableBlock::new(Component::Data, b"x".to_vec()).address()
    }

    #[test]
    fn type_tags_unique() {
        let block: Block = ImmutableBlock::new(Component::Data, b"x".to_vec()).into();
        let msgs = vec![
            HoleMessage::Hello { version: 1, network: "n".into() },
            HoleMessage::HelloAck { version: 1 },
            HoleMessage::Put { address: address(), block: block.clone() },
            HoleMessage::Get { address: address(), version: None },
            HoleMessage::Kill { address: address() },
            HoleMessage::Block { block },
            HoleMessage::Ack,
            HoleMessage::Error(RemoteFailure::NotFound),
        ];
        let mut tags: Vec<u8> = msgs.iter().map(|m| m.type_tag()).collect();
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
    }

    #[test]
    fn failures_survive_the_wire_mapping() {
        let a = address();
        let conflict = BackendError::VersionConflict {
            address: a,
            version: Version::new(2),
            latest: Version::new(4),
        };
        let rebuilt = RemoteFailure::from_backend(&conflict).into_backend(&a);
        assert!(matches!(
            rebuilt,
            BackendError::VersionConflict { version, latest, .. }
                if version == Version::new(2) && latest == Version::new(4)
        ));

        let mismatch = BackendError::ComponentMismatch {
            address: a,
            block: Component::Catalog,
        };
        let failure = RemoteFailure::from_backend(&mismatch);
        assert_eq!(failure.code(), codes::FAMILY_MISMATCH);
        assert!(matches!(
            failure.into_backend(&a),
            BackendError::ComponentMismatch { block: Component::Catalog, .. }
        ));

        let rebuilt = RemoteFailure::from_backend(&BackendError::NotFound(a)).into_backend(&a);
        assert!(matches!(rebuilt, BackendError::NotFound(x) if x == a));
    }

    #[test]
    fn unstructured_failures_become_internal() {
        let failure = RemoteFailure::from_backend(&BackendError::NotJoined);
        assert_eq!(failure.code(), codes::INTERNAL);
        assert!(matches!(
            failure.into_backend(&address()),
            BackendError::Remote { code: 500, .. }
        ));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(RemoteFailure::NotFound.code(), 404);
        assert_eq!(
            RemoteFailure::FamilyMismatch { block: Family::OwnerKey }.code(),
            422
        );
    }
}
