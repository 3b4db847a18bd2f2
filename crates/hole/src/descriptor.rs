use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use hole_crypto::{Signature, SigningKey, VerifyingKey};
use hole_types::{Address, Network};

use crate::artifact::{sign_body, verify_body, Artifact};
use crate::error::{HoleError, HoleResult};

/// Replication topology named by a network descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Model {
    /// Blocks live on this machine only.
    Local,
    /// Blocks live on one fixed peer.
    Remote,
    /// Blocks are spread over a peer group.
    Slug,
}

impl Model {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Slug => "slug",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            "slug" => Some(Self::Slug),
            _ => None,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Network descriptor: which topology to run and where the root block is.
///
/// The model is kept as a free-form tag so that a descriptor written for a
/// newer topology still loads and is refused at backend selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub network: Network,
    pub model: String,
    pub root: Address,
    pub signature: Signature,
}

#[derive(Serialize)]
struct DescriptorBody<'a> {
    network: &'a Network,
    model: &'a str,
    root: &'a Address,
}

impl Descriptor {
    /// Issue a descriptor signed by the network authority.
    pub fn sign(
        network: Network,
        model: impl Into<String>,
        root: Address,
        authority: &SigningKey,
    ) -> HoleResult<Self> {
        let model = model.into();
        let signature = sign_body(
            &DescriptorBody {
                network: &network,
                model: &model,
                root: &root,
            },
            authority,
        )?;
        Ok(Self {
            network,
            model,
            root,
            signature,
        })
    }

    fn body(&self) -> DescriptorBody<'_> {
        DescriptorBody {
            network: &self.network,
            model: &self.model,
            root: &self.root,
        }
    }

    /// The topology model, if this build knows it.
    pub fn model(&self) -> HoleResult<Model> {
        Model::from_tag(&self.model).ok_or_else(|| {
            warn!(model = %self.model, "descriptor names an unknown topology");
            HoleError::UnsupportedModel(self.model.clone())
        })
    }
}

impl Artifact for Descriptor {
    const KIND: &'static str = "descriptor";

    fn validate(&self, authority: &VerifyingKey) -> HoleResult<()> {
        if self.root.is_null() {
            return Err(HoleError::config("descriptor root is the null address"));
        }
        verify_body(Self::KIND, &self.body(), &self.signature, authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hole_store::ImmutableBlock;
    use hole_types::Component;

    fn root() -> Address {
        ImmutableBlock::new(Component::Object, b"root".to_vec()).address()
    }

    #[test]
    fn model_tags() {
        for model in [Model::Local, Model::Remote, Model::Slug] {
            assert_eq!(Model::from_tag(model.tag()), Some(model));
        }
        assert_eq!(Model::from_tag("kelips"), None);
    }

    #[test]
    fn signed_descriptor_validates() {
        let authority = SigningKey::generate();
        let d = Descriptor::sign(Network::new("n").unwrap(), "local", root(), &authority).unwrap();
        d.validate(&authority.verifying_key()).unwrap();
        assert_eq!(d.model().unwrap(), Model::Local);
    }

    #[test]
    fn tampered_descriptor_is_rejected() {
        let authority = SigningKey::generate();
        let mut d =
            Descriptor::sign(Network::new("n").unwrap(), "local", root(), &authority).unwrap();
        d.model = "slug".into();
        assert!(matches!(
            d.validate(&authority.verifying_key()),
            Err(HoleError::Configuration(_))
        ));
    }

    #[test]
    fn foreign_authority_is_rejected() {
        let d = Descriptor::sign(
            Network::new("n").unwrap(),
            "remote",
            root(),
            &SigningKey::generate(),
        )
        .unwrap();
        assert!(d.validate(&SigningKey::generate().verifying_key()).is_err());
    }

    #[test]
    fn unknown_model_is_unsupported() {
        let authority = SigningKey::generate();
        let d = Descriptor::sign(Network::new("n").unwrap(), "kelips", root(), &authority)
            .unwrap();
        d.validate(&authority.verifying_key()).unwrap();
        assert!(matches!(d.model(), Err(HoleError::UnsupportedModel(tag)) if tag == "kelips"));
    }

    #[test]
    fn save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("networks/n/descriptor.json");
        let authority = SigningKey::generate();
        let d = Descriptor::sign(Network::new("n").unwrap(), "slug", root(), &authority).unwrap();

        assert!(!Descriptor::exists(&path));
        d.save(&path).unwrap();
        assert!(Descriptor::exists(&path));
        assert_eq!(Descriptor::open(&path, &authority.verifying_key()).unwrap(), d);

        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            Descriptor::load(&path),
            Err(HoleError::Configuration(_))
        ));
    }
}
