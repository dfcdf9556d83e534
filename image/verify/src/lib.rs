/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Bootloader image verification library.

--*/

mod verifier;

use imgtool_types::TlvKind;
use thiserror::Error;

pub use verifier::{verify, ImageVerifier};

/// Outcome of an image verification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyResult {
    Ok,

    /// Missing or wrong image magic
    InvalidMagic,

    /// Not returned by the verifier. A missing or malformed TLV area is
    /// reported as `InvalidHash`.
    InvalidTlvInfoMagic,

    InvalidHash,

    InvalidSignature,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature does not match")]
    Mismatch,

    #[error("malformed signature: {0}")]
    Malformed(String),
}

/// Public key checking image signatures
pub trait ImageVerifyingKey {
    /// TLV kind of the signatures this key checks
    fn sig_tlv(&self) -> TlvKind;

    /// Verify `signature` over the hashed range of the image
    fn verify(&self, signature: &[u8], payload: &[u8]) -> Result<(), SignatureError>;
}
