use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use hole_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};

use crate::error::{HoleError, HoleResult};

/// A JSON file the store needs before it can go online.
///
/// Loading and validating are separate steps: a file can parse and still
/// carry a signature the authority never produced.
pub trait Artifact: Serialize + DeserializeOwned {
    /// Human-readable name used in error messages.
    const KIND: &'static str;

    fn exists(path: &Path) -> bool {
        path.is_file()
    }

    fn load(path: &Path) -> HoleResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            HoleError::config(format!("reading {} {}: {e}", Self::KIND, path.display()))
        })?;
        serde_json::from_slice(&data).map_err(|e| {
            HoleError::config(format!("parsing {} {}: {e}", Self::KIND, path.display()))
        })
    }

    fn save(&self, path: &Path) -> HoleResult<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| HoleError::config(format!("encoding {}: {e}", Self::KIND)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HoleError::config(format!("creating {}: {e}", parent.display())))?;
        }
        std::fs::write(path, data)
            .map_err(|e| HoleError::config(format!("writing {}: {e}", path.display())))
    }

    fn validate(&self, authority: &VerifyingKey) -> HoleResult<()>;

    /// Check existence, load and validate in one go.
    fn open(path: &Path, authority: &VerifyingKey) -> HoleResult<Self> {
        if !Self::exists(path) {
            return Err(HoleError::config(format!(
                "{} not found at {}",
                Self::KIND,
                path.display()
            )));
        }
        let artifact = Self::load(path)?;
        artifact.validate(authority)?;
        Ok(artifact)
    }
}

fn message<B: Serialize>(body: &B) -> HoleResult<[u8; 32]> {
    ContentHasher::ARTIFACT
        .hash_json(body)
        .map(|digest| *digest.as_bytes())
        .map_err(|e| HoleError::config(e.to_string()))
}

pub(crate) fn sign_body<B: Serialize>(body: &B, key: &SigningKey) -> HoleResult<Signature> {
    Ok(key.sign(&message(body)?))
}

pub(crate) fn verify_body<B: Serialize>(
    kind: &str,
    body: &B,
    signature: &Signature,
    authority: &VerifyingKey,
) -> HoleResult<()> {
    authority
        .verify(&message(body)?, signature)
        .map_err(|e| HoleError::config(format!("{kind} rejected: {e}")))
}
