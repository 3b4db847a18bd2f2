use tracing::info;

use hole_net::{RemoteBackend, SlugBackend, SlugConfig};
use hole_store::{Holeable, LocalBackend};
use hole_types::Network;

use crate::config::HoleConfig;
use crate::descriptor::Model;
use crate::error::{HoleError, HoleResult};
use crate::set::Set;

/// The backend chosen for this process, one variant per topology model.
pub enum Implementation {
    Local(LocalBackend),
    Remote(RemoteBackend),
    Slug(SlugBackend),
}

impl Implementation {
    /// Build the backend for `model`. Network models need a set of loci.
    pub fn build(
        model: Model,
        network: &Network,
        config: &HoleConfig,
        set: Option<&Set>,
    ) -> HoleResult<Self> {
        let implementation = match model {
            Model::Local => Self::Local(LocalBackend::new(&config.store_root, network)),
            Model::Remote => {
                let host = set
                    .and_then(|set| set.loci.first().copied())
                    .ok_or_else(|| HoleError::config("remote model needs a set with one locus"))?;
                Self::Remote(RemoteBackend::new(network.clone(), host, config.timeout()))
            }
            Model::Slug => {
                let set = set.ok_or_else(|| HoleError::config("slug model needs a set"))?;
                Self::Slug(SlugBackend::new(
                    network.clone(),
                    set.loci.iter().copied(),
                    SlugConfig {
                        replication: config.replication,
                        timeout: config.timeout(),
                    },
                ))
            }
        };
        info!(%model, %network, "backend selected");
        Ok(implementation)
    }

    pub fn model(&self) -> Model {
        match self {
            Self::Local(_) => Model::Local,
            Self::Remote(_) => Model::Remote,
            Self::Slug(_) => Model::Slug,
        }
    }

    pub fn backend(&self) -> &dyn Holeable {
        match self {
            Self::Local(backend) => backend,
            Self::Remote(backend) => backend,
            Self::Slug(backend) => backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn network() -> Network {
        Network::new("impl").unwrap()
    }

    #[test]
    fn local_needs_no_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = HoleConfig {
            store_root: dir.path().to_path_buf(),
            ..HoleConfig::default()
        };
        let built = Implementation::build(Model::Local, &network(), &config, None).unwrap();
        assert_eq!(built.model(), Model::Local);
    }

    #[test]
    fn network_models_need_loci() {
        let config = HoleConfig::default();
        for model in [Model::Remote, Model::Slug] {
            assert!(matches!(
                Implementation::build(model, &network(), &config, None),
                Err(HoleError::Configuration(_))
            ));
        }
    }

    #[test]
    fn remote_uses_first_locus_and_slug_uses_all() {
        let a: SocketAddr = "127.0.0.1:7001".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:7002".parse().unwrap();
        let set = Set::new([a, b]);
        let config = HoleConfig::default();

        match Implementation::build(Model::Remote, &network(), &config, Some(&set)).unwrap() {
            Implementation::Remote(remote) => assert_eq!(remote.host(), a),
            _ => panic!("expected remote backend"),
        }
        match Implementation::build(Model::Slug, &network(), &config, Some(&set)).unwrap() {
            Implementation::Slug(slug) => {
                assert_eq!(slug.peers(), vec![a, b]);
                assert_eq!(slug.config().replication, 2);
            }
            _ => panic!("expected slug backend"),
        }
    }
}
