use std::collections::BTreeSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use hole_crypto::VerifyingKey;

use crate::artifact::Artifact;
use crate::error::{HoleError, HoleResult};

/// Initial peers of a network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    pub loci: Vec<SocketAddr>,
}

impl Set {
    pub fn new(loci: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            loci: loci.into_iter().collect(),
        }
    }
}

impl Artifact for Set {
    const KIND: &'static str = "set";

    /// Sets are not signed; they only need to name at least one peer, once.
    fn validate(&self, _authority: &VerifyingKey) -> HoleResult<()> {
        if self.loci.is_empty() {
            return Err(HoleError::config("set lists no loci"));
        }
        let distinct: BTreeSet<_> = self.loci.iter().collect();
        if distinct.len() != self.loci.len() {
            return Err(HoleError::config("set lists a locus twice"));
        }
        Ok(())
    }
}
