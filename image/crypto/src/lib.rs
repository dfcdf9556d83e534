/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the key types used to sign, encrypt and verify images.

--*/

mod keywrap;
mod sign;

pub use keywrap::{DecryptionKey, EncryptionKey, ECIES_TLV_LEN, RSA_OAEP_TLV_LEN};
pub use sign::{SigningKey, VerifyingKey};

use std::path::Path;

use anyhow::{bail, Context};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

fn read_pem(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key PEM file {}", path.display()))
}

/// Parse a signing key from a PKCS#8, PKCS#1 (RSA) or SEC1 (EC) private key PEM
pub fn signing_key_from_pem_str(pem: &str) -> anyhow::Result<SigningKey> {
    if let Ok(key) =
        RsaPrivateKey::from_pkcs8_pem(pem).or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
    {
        return SigningKey::rsa(key);
    }
    if let Ok(key) =
        p256::SecretKey::from_pkcs8_pem(pem).or_else(|_| p256::SecretKey::from_sec1_pem(pem))
    {
        return Ok(SigningKey::EcdsaP256(key.into()));
    }
    if let Ok(key) = ed25519_dalek::SigningKey::from_pkcs8_pem(pem) {
        return Ok(SigningKey::Ed25519(key));
    }
    bail!("Unsupported or malformed private key")
}

/// Read a signing key from a private key PEM file
pub fn signing_key_from_pem(path: &Path) -> anyhow::Result<SigningKey> {
    signing_key_from_pem_str(&read_pem(path)?)
        .with_context(|| format!("Failed to load signing key {}", path.display()))
}

/// Parse a verifying key from a public key PEM, or from the private key PEM
/// of the signer
pub fn verifying_key_from_pem_str(pem: &str) -> anyhow::Result<VerifyingKey> {
    if let Ok(key) =
        RsaPublicKey::from_public_key_pem(pem).or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
    {
        return VerifyingKey::rsa(key);
    }
    if let Ok(key) = p256::PublicKey::from_public_key_pem(pem) {
        return Ok(VerifyingKey::EcdsaP256(key.into()));
    }
    if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_pem(pem) {
        return Ok(VerifyingKey::Ed25519(key));
    }
    signing_key_from_pem_str(pem)
        .map(|key| key.verifying_key())
        .context("Unsupported or malformed key")
}

/// Read a verifying key from a PEM file
pub fn verifying_key_from_pem(path: &Path) -> anyhow::Result<VerifyingKey> {
    verifying_key_from_pem_str(&read_pem(path)?)
        .with_context(|| format!("Failed to load verifying key {}", path.display()))
}

/// Parse the private key that unwraps image encryption keys
pub fn decryption_key_from_pem_str(pem: &str) -> anyhow::Result<DecryptionKey> {
    if let Ok(key) =
        RsaPrivateKey::from_pkcs8_pem(pem).or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
    {
        return DecryptionKey::rsa(key);
    }
    if let Ok(key) =
        p256::SecretKey::from_pkcs8_pem(pem).or_else(|_| p256::SecretKey::from_sec1_pem(pem))
    {
        return Ok(DecryptionKey::EcP256(key));
    }
    bail!("Encryption keys must be RSA-2048 or EC P-256")
}

/// Parse an encryption key from a public key PEM, or from the private key
/// PEM of the recipient
pub fn encryption_key_from_pem_str(pem: &str) -> anyhow::Result<EncryptionKey> {
    if let Ok(key) =
        RsaPublicKey::from_public_key_pem(pem).or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
    {
        return EncryptionKey::rsa(key);
    }
    if let Ok(key) = p256::PublicKey::from_public_key_pem(pem) {
        return Ok(EncryptionKey::EcP256(key));
    }
    decryption_key_from_pem_str(pem).map(|key| key.encryption_key())
}

/// Read an encryption key from a PEM file
pub fn encryption_key_from_pem(path: &Path) -> anyhow::Result<EncryptionKey> {
    encryption_key_from_pem_str(&read_pem(path)?)
        .with_context(|| format!("Failed to load encryption key {}", path.display()))
}
