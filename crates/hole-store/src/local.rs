use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, error, info};

use hole_types::{Address, Network, Version};

use crate::block::Block;
use crate::error::{BackendError, BackendResult};
use crate::locks::AddressLocks;
use crate::traits::Holeable;

/// Separator between the address and the version number in the file name of
/// a mutable block version.
const VERSION_SEPARATOR: char = '#';

/// Prefix of in-flight temporary files. Never a valid block file name.
const TEMP_PREFIX: &str = ".tmp-";

/// Single-node disk backend.
///
/// Layout:
/// ```text
/// <store_root>/<network>/
/// ├── immutable/<address>                      # one file per block
/// └── mutable/<address>/<address>#<version>    # one file per version
/// ```
///
/// Files hold the bincode-serialized [`Block`]. Writes go to a temporary
/// file in the destination directory and are renamed into place, so a crash
/// never leaves a partial block behind. Renames never replace an existing
/// file, so two writers racing on one version cannot both succeed.
pub struct LocalBackend {
    root: PathBuf,
    joined: AtomicBool,
    locks: AddressLocks,
}

impl LocalBackend {
    /// Create a backend rooted at `<store_root>/<network>`. Nothing is touched
    /// on disk until [`Holeable::join`].
    pub fn new(store_root: &Path, network: &Network) -> Self {
        Self {
            root: store_root.join(network.name()),
            joined: AtomicBool::new(false),
            locks: AddressLocks::new(),
        }
    }

    /// The per-network root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn immutable_dir(&self) -> PathBuf {
        self.root.join("immutable")
    }

    fn immutable_path(&self, address: &Address) -> PathBuf {
        self.immutable_dir().join(address.unique())
    }

    fn mutable_dir(&self, address: &Address) -> PathBuf {
        self.root.join("mutable").join(address.unique())
    }

    fn version_path(&self, address: &Address, version: Version) -> PathBuf {
        self.mutable_dir(address)
            .join(format!("{}{VERSION_SEPARATOR}{}", address.unique(), version))
    }

    fn ensure_joined(&self) -> BackendResult<()> {
        if self.joined.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BackendError::NotJoined)
        }
    }

    /// All versions stored for a mutable address, ascending.
    ///
    /// Directory order is irrelevant: versions come from the numeric file
    /// name suffix.
    pub fn versions(&self, address: &Address) -> BackendResult<Vec<Version>> {
        let dir = self.mutable_dir(address);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let prefix = address.unique();
        let mut versions = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(version) = parse_version_suffix(name, &prefix) {
                versions.push(version);
            }
        }
        versions.sort();
        Ok(versions)
    }

    fn latest(&self, address: &Address) -> BackendResult<Option<Version>> {
        Ok(self.versions(address)?.last().copied())
    }

    fn read_block(&self, path: &Path, address: &Address) -> BackendResult<Block> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackendError::NotFound(*address))
            }
            Err(e) => return Err(e.into()),
        };
        let block = Block::from_bytes(&data)?;
        if let Err(err) = block.check(address) {
            error!(%address, path = %path.display(), %err, "stored block failed verification");
            return Err(err);
        }
        Ok(block)
    }

    fn put_immutable(&self, address: &Address, block: &Block) -> BackendResult<()> {
        let path = self.immutable_path(address);
        // Content addressing: an existing file already holds these bytes.
        if path.exists() || !write_new(&self.immutable_dir(), &path, &block.to_bytes()?)? {
            debug!(%address, "immutable block already stored");
            return Ok(());
        }
        debug!(%address, "immutable block stored");
        Ok(())
    }

    fn put_mutable(&self, address: &Address, block: &Block, version: Version) -> BackendResult<()> {
        let path = self.version_path(address, version);
        if path.exists() {
            return self.reput(address, block, version, &path);
        }
        if let Some(latest) = self.latest(address)? {
            if version <= latest {
                return Err(BackendError::VersionConflict {
                    address: *address,
                    version,
                    latest,
                });
            }
        }
        let dir = self.mutable_dir(address);
        fs::create_dir_all(&dir)?;
        if !write_new(&dir, &path, &block.to_bytes()?)? {
            // Another writer stored this version first.
            return self.reput(address, block, version, &path);
        }
        debug!(%address, %version, "mutable block version stored");
        Ok(())
    }

    /// A version that is already stored accepts only the identical block.
    fn reput(
        &self,
        address: &Address,
        block: &Block,
        version: Version,
        path: &Path,
    ) -> BackendResult<()> {
        let existing = self.read_block(path, address)?;
        if existing == *block {
            return Ok(());
        }
        Err(BackendError::VersionConflict {
            address: *address,
            version,
            latest: self.latest(address)?.unwrap_or(version),
        })
    }
}

/// Extract the version from `<prefix>#<n>`; anything else is not a version
/// file (temporary files included).
fn parse_version_suffix(name: &str, prefix: &str) -> Option<Version> {
    let (head, suffix) = name.rsplit_once(VERSION_SEPARATOR)?;
    if head != prefix {
        return None;
    }
    suffix.parse::<u64>().ok().map(Version::new)
}

/// Write `data` to `path` through a temporary file in `dir`. Returns `false`
/// without touching `path` when it already exists.
fn write_new(dir: &Path, path: &Path, data: &[u8]) -> io::Result<bool> {
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

/// Remove a file, treating "already gone" as success.
fn erase_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[async_trait]
impl Holeable for LocalBackend {
    async fn join(&self) -> BackendResult<()> {
        if self.joined.load(Ordering::Acquire) {
            return Ok(());
        }
        fs::create_dir_all(self.immutable_dir())?;
        fs::create_dir_all(self.root.join("mutable"))?;
        self.joined.store(true, Ordering::Release);
        info!(root = %self.root.display(), "local backend joined");
        Ok(())
    }

    async fn leave(&self) -> BackendResult<()> {
        self.joined.store(false, Ordering::Release);
        info!(root = %self.root.display(), "local backend left");
        Ok(())
    }

    async fn put(&self, address: &Address, block: &Block) -> BackendResult<()> {
        self.ensure_joined()?;
        block.check(address)?;
        let _guard = self.locks.lock(address).await;
        match block.version() {
            None => self.put_immutable(address, block),
            Some(version) => self.put_mutable(address, block, version),
        }
    }

    async fn get(&self, address: &Address, version: Option<Version>) -> BackendResult<Block> {
        self.ensure_joined()?;
        let family = address.family();
        if family.is_immutable() {
            return self.read_block(&self.immutable_path(address), address);
        }
        if !family.is_mutable() {
            return Err(BackendError::UnknownFamily(family));
        }
        let version = match version {
            Some(version) => version,
            None => self
                .latest(address)?
                .ok_or(BackendError::NotFound(*address))?,
        };
        let block = self.read_block(&self.version_path(address, version), address)?;
        if block.version() != Some(version) {
            error!(%address, %version, "version file holds a different version");
            return Err(BackendError::Serialization(format!(
                "version file {version} of {address} holds {:?}",
                block.version()
            )));
        }
        Ok(block)
    }

    async fn kill(&self, address: &Address) -> BackendResult<()> {
        self.ensure_joined()?;
        let _guard = self.locks.lock(address).await;
        let family = address.family();
        if family.is_immutable() {
            let path = self.immutable_path(address);
            if !path.exists() {
                return Err(BackendError::NotFound(*address));
            }
            erase_file(&path)?;
            debug!(%address, "immutable block erased");
            return Ok(());
        }
        if !family.is_mutable() {
            return Err(BackendError::UnknownFamily(family));
        }
        let versions = self.versions(address)?;
        let dir = self.mutable_dir(address);
        match fs::remove_dir_all(&dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        if versions.is_empty() {
            return Err(BackendError::NotFound(*address));
        }
        debug!(%address, versions = versions.len(), "mutable block history erased");
        Ok(())
    }
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("root", &self.root)
            .field("joined", &self.joined.load(Ordering::Relaxed))
            .finish()
    }
}
