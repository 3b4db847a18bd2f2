use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hole_crypto::VerifyingKey;
use hole_types::Network;

use crate::error::{HoleError, HoleResult};

/// Store configuration, usually read from a TOML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoleConfig {
    /// Directory holding the passport and the per-network artifacts.
    pub home: PathBuf,
    /// Name of the network to join.
    pub network: String,
    /// Hex-encoded Ed25519 key of the network authority.
    pub authority: String,
    /// Root directory of the local block store.
    pub store_root: PathBuf,
    /// Round trip limit for network backends. `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
    /// Acknowledgements a peer-group put waits for.
    pub replication: usize,
}

impl Default for HoleConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from(".hole"),
            network: "default".into(),
            authority: String::new(),
            store_root: PathBuf::from(".hole/blocks"),
            timeout_ms: Some(5_000),
            replication: 2,
        }
    }
}

impl HoleConfig {
    pub fn load(path: &Path) -> HoleResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HoleError::config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> HoleResult<Self> {
        toml::from_str(text).map_err(|e| HoleError::config(format!("invalid config: {e}")))
    }

    pub fn network(&self) -> HoleResult<Network> {
        Network::new(self.network.as_str())
            .map_err(|e| HoleError::config(format!("network '{}': {e}", self.network)))
    }

    pub fn authority(&self) -> HoleResult<VerifyingKey> {
        VerifyingKey::from_hex(&self.authority)
            .map_err(|e| HoleError::config(format!("authority key: {e}")))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    fn network_dir(&self) -> PathBuf {
        self.home.join("networks").join(&self.network)
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.network_dir().join("descriptor.json")
    }

    pub fn set_path(&self) -> PathBuf {
        self.network_dir().join("set.json")
    }

    pub fn passport_path(&self) -> PathBuf {
        self.home.join("passport.json")
    }
}
