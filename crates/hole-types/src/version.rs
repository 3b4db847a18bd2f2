use std::fmt;

use serde::{Deserialize, Serialize};

/// Version counter of a mutable block.
///
/// Versions of one address grow monotonically; the first stored version is
/// [`Version::FIRST`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    pub const FIRST: Version = Version(1);

    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The version following this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_and_next() {
        assert_eq!(Version::FIRST.get(), 1);
        assert_eq!(Version::FIRST.next(), Version::new(2));
        assert!(Version::new(2) > Version::FIRST);
    }

    #[test]
    fn next_saturates() {
        assert_eq!(Version::new(u64::MAX).next(), Version::new(u64::MAX));
    }
}
