use tokio::sync::watch;
use tracing::{debug, error, info};

use hole_store::{AddressLocks, BackendError, Block, Holeable};
use hole_types::{Address, Family, Version};

use crate::artifact::Artifact;
use crate::config::HoleConfig;
use crate::descriptor::{Descriptor, Model};
use crate::error::{HoleError, HoleResult};
use crate::implementation::Implementation;
use crate::passport::Passport;
use crate::set::Set;

/// Lifecycle of the store. `Online` is never left once reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Offline,
    Online,
}

/// The block store facade.
///
/// Lifecycle: [`Hole::new`] → [`initialize`](Hole::initialize) (validates the
/// network artifacts and picks a backend) → [`join`](Hole::join) →
/// [`ready`](Hole::ready). Other subsystems park on
/// [`wait_ready`](Hole::wait_ready) until the last step.
///
/// Block operations dispatch on the address family and run one at a time per
/// address. Share the facade between tasks behind an `Arc`.
pub struct Hole {
    config: HoleConfig,
    descriptor: Option<Descriptor>,
    passport: Option<Passport>,
    implementation: Option<Implementation>,
    locks: AddressLocks,
    online: watch::Sender<bool>,
}

impl Hole {
    pub fn new(config: HoleConfig) -> Self {
        let (online, _) = watch::channel(false);
        Self {
            config,
            descriptor: None,
            passport: None,
            implementation: None,
            locks: AddressLocks::new(),
            online,
        }
    }

    pub fn config(&self) -> &HoleConfig {
        &self.config
    }

    /// Load and validate the descriptor, passport and optional set, then
    /// construct the backend the descriptor's model names.
    ///
    /// Leaves the store `Offline`. Nothing is kept if any step fails.
    pub fn initialize(&mut self) -> HoleResult<()> {
        if self.implementation.is_some() {
            return Err(HoleError::AlreadyInitialized);
        }
        let network = self.config.network()?;
        let authority = self.config.authority()?;

        let descriptor = Descriptor::open(&self.config.descriptor_path(), &authority)?;
        if descriptor.network != network {
            return Err(HoleError::config(format!(
                "descriptor is for network '{}', configured for '{}'",
                descriptor.network, network
            )));
        }
        let passport = Passport::open(&self.config.passport_path(), &authority)?;

        let set_path = self.config.set_path();
        let set = if Set::exists(&set_path) {
            Some(Set::open(&set_path, &authority)?)
        } else {
            None
        };

        let model = descriptor.model()?;
        let implementation = Implementation::build(model, &network, &self.config, set.as_ref())?;

        info!(
            %network,
            %model,
            device = %passport.device,
            root = %descriptor.root,
            "store initialized"
        );
        self.descriptor = Some(descriptor);
        self.passport = Some(passport);
        self.implementation = Some(implementation);
        Ok(())
    }

    fn backend(&self) -> HoleResult<&dyn Holeable> {
        self.implementation
            .as_ref()
            .map(Implementation::backend)
            .ok_or(HoleError::NotInitialized)
    }

    /// Connect the backend: create directories or reach the peers.
    pub async fn join(&self) -> HoleResult<()> {
        self.backend()?.join().await?;
        debug!("backend joined");
        Ok(())
    }

    /// Mark the store online and release every [`wait_ready`](Hole::wait_ready)
    /// caller. Later calls do nothing.
    pub fn ready(&self) -> HoleResult<()> {
        self.backend()?;
        let fired = self.online.send_if_modified(|online| {
            if *online {
                false
            } else {
                *online = true;
                true
            }
        });
        if fired {
            info!("store online");
        }
        Ok(())
    }

    /// Resolve once the store is online.
    pub async fn wait_ready(&self) {
        let mut online = self.online.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = online.wait_for(|online| *online).await;
    }

    pub fn state(&self) -> State {
        if *self.online.borrow() {
            State::Online
        } else {
            State::Offline
        }
    }

    /// The model of the active backend, if initialized.
    pub fn model(&self) -> Option<Model> {
        self.implementation.as_ref().map(Implementation::model)
    }

    /// Address of the network's root block.
    pub fn origin(&self) -> HoleResult<Address> {
        self.descriptor
            .as_ref()
            .map(|descriptor| descriptor.root)
            .ok_or(HoleError::NotInitialized)
    }

    /// The validated device credential.
    pub fn passport(&self) -> Option<&Passport> {
        self.passport.as_ref()
    }

    /// Store `block` under `address`.
    pub async fn push(&self, address: &Address, block: &Block) -> HoleResult<()> {
        let backend = self.backend()?;
        check_family(address)?;
        let matches = match block {
            Block::Immutable(_) => address.family().is_immutable(),
            Block::Mutable(mb) => mb.family() == address.family(),
        };
        if !matches {
            return Err(HoleError::FamilyMismatch {
                address: *address,
                block: block.family(),
            });
        }

        let _guard = self.locks.lock(address).await;
        backend.put(address, block).await?;
        debug!(%address, version = ?block.version(), "pushed");
        Ok(())
    }

    /// Fetch the block at `address`: a given version, or the latest.
    pub async fn pull(&self, address: &Address, version: Option<Version>) -> HoleResult<Block> {
        let backend = self.backend()?;
        check_family(address)?;

        let _guard = self.locks.lock(address).await;
        match backend.get(address, version).await {
            Ok(block) => Ok(block),
            Err(err @ BackendError::IntegrityFailure { .. }) => {
                error!(%address, %err, "integrity failure on pull");
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Remove the block at `address`, every version of it if mutable.
    pub async fn wipe(&self, address: &Address) -> HoleResult<()> {
        let backend = self.backend()?;
        check_family(address)?;

        let _guard = self.locks.lock(address).await;
        backend.kill(address).await?;
        debug!(%address, "wiped");
        Ok(())
    }

    /// Leave the network and drop the backend.
    pub async fn clean(&mut self) -> HoleResult<()> {
        let implementation = self.implementation.take().ok_or(HoleError::NotInitialized)?;
        implementation.backend().leave().await?;
        info!(model = %implementation.model(), "backend released");
        Ok(())
    }
}

fn check_family(address: &Address) -> HoleResult<()> {
    match address.family() {
        Family::Unknown => Err(HoleError::UnknownFamily(Family::Unknown)),
        _ => Ok(()),
    }
}

impl std::fmt::Debug for Hole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hole")
            .field("network", &self.config.network)
            .field("model", &self.model())
            .field("state", &self.state())
            .finish()
    }
}
