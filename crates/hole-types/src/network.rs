use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of a storage network.
///
/// The name doubles as a directory name in on-disk layouts, so it is
/// restricted to ASCII alphanumerics, `-`, `_` and `.` and may not be `.` or
/// `..`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Network {
    name: String,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if name.is_empty() || name == "." || name == ".." || !valid_chars {
            return Err(TypeError::InvalidNetworkName(name));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TryFrom<String> for Network {
    type Error = TypeError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<Network> for String {
    fn from(network: Network) -> Self {
        network.name
    }
}
