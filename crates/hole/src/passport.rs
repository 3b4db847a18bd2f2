use serde::{Deserialize, Serialize};

use hole_crypto::{Signature, SigningKey, VerifyingKey};

use crate::artifact::{sign_body, verify_body, Artifact};
use crate::error::{HoleError, HoleResult};

/// Credential admitting one device to the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passport {
    pub device: String,
    pub public_key: VerifyingKey,
    pub signature: Signature,
}

#[derive(Serialize)]
struct PassportBody<'a> {
    device: &'a str,
    public_key: &'a VerifyingKey,
}

impl Passport {
    pub fn sign(
        device: impl Into<String>,
        public_key: VerifyingKey,
        authority: &SigningKey,
    ) -> HoleResult<Self> {
        let device = device.into();
        let signature = sign_body(
            &PassportBody {
                device: &device,
                public_key: &public_key,
            },
            authority,
        )?;
        Ok(Self {
            device,
            public_key,
            signature,
        })
    }
}

impl Artifact for Passport {
    const KIND: &'static str = "passport";

    fn validate(&self, authority: &VerifyingKey) -> HoleResult<()> {
        if self.device.is_empty() {
            return Err(HoleError::config("passport names no device"));
        }
        let body = PassportBody {
            device: &self.device,
            public_key: &self.public_key,
        };
        verify_body(Self::KIND, &body, &self.signature, authority)
    }
}
