//! Cryptographic primitives for the Hole block store.
//!
//! Provides domain-separated BLAKE3 hashing for block addresses and Ed25519
//! signing/verification for network descriptors and device passports.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::{ContentHasher, HasherError};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
