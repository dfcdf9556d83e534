/*++

Licensed under the Apache-2.0 license.

File Name:

   sign.rs

Abstract:

    File contains the RSA-PSS, ECDSA P-256 and Ed25519 image signing keys.

--*/

use anyhow::{anyhow, bail, Context};
use ed25519_dalek::pkcs8::EncodePublicKey as _;
use ed25519_dalek::{Signer as _, Verifier as _};
use imgtool_gen::{ImageSigningKey, SignInput};
use imgtool_types::TlvKind;
use imgtool_verify::{ImageVerifyingKey, SignatureError};
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

const RSA_PSS_SALT_LEN: usize = 32;

fn rsa_sig_tlv(modulus_bytes: usize) -> Option<TlvKind> {
    match modulus_bytes {
        256 => Some(TlvKind::Rsa2048),
        384 => Some(TlvKind::Rsa3072),
        _ => None,
    }
}

/// Image signing key
#[derive(Debug)]
pub enum SigningKey {
    Rsa(RsaPrivateKey),
    EcdsaP256(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl SigningKey {
    /// Wrap an RSA private key. Only 2048 and 3072 bit keys are supported.
    pub fn rsa(key: RsaPrivateKey) -> anyhow::Result<Self> {
        if rsa_sig_tlv(key.size()).is_none() {
            bail!("Unsupported RSA key size: {} bits", key.size() * 8);
        }
        Ok(Self::Rsa(key))
    }

    /// Public half of the key
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Rsa(key) => VerifyingKey::Rsa(key.to_public_key()),
            Self::EcdsaP256(key) => VerifyingKey::EcdsaP256(key.into()),
            Self::Ed25519(key) => VerifyingKey::Ed25519(key.verifying_key()),
        }
    }
}

impl ImageSigningKey for SigningKey {
    fn public_bytes(&self) -> anyhow::Result<Vec<u8>> {
        self.verifying_key().public_bytes()
    }

    fn sig_tlv(&self) -> TlvKind {
        self.verifying_key().sig_tlv()
    }

    fn sign_input(&self) -> SignInput {
        match self {
            Self::Ed25519(_) => SignInput::Digest,
            _ => SignInput::Payload,
        }
    }

    fn sign(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        match self {
            Self::Rsa(key) => {
                let digest = Sha256::digest(data);
                key.sign_with_rng(
                    &mut OsRng,
                    Pss::new_with_salt::<Sha256>(RSA_PSS_SALT_LEN),
                    &digest,
                )
                .context("RSA-PSS signing failed")
            }
            Self::EcdsaP256(key) => {
                let sig: p256::ecdsa::Signature =
                    key.try_sign(data).context("ECDSA signing failed")?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            Self::Ed25519(key) => Ok(key.sign(data).to_bytes().to_vec()),
        }
    }
}

/// Key checking image signatures
#[derive(Clone, Debug)]
pub enum VerifyingKey {
    Rsa(RsaPublicKey),
    EcdsaP256(p256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl VerifyingKey {
    /// Wrap an RSA public key. Only 2048 and 3072 bit keys are supported.
    pub fn rsa(key: RsaPublicKey) -> anyhow::Result<Self> {
        if rsa_sig_tlv(key.size()).is_none() {
            bail!("Unsupported RSA key size: {} bits", key.size() * 8);
        }
        Ok(Self::Rsa(key))
    }

    /// Encoded public key: PKCS#1 DER for RSA, SubjectPublicKeyInfo DER
    /// otherwise
    pub fn public_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let der = match self {
            Self::Rsa(key) => key
                .to_pkcs1_der()
                .map_err(|err| anyhow!("Failed to encode RSA public key: {err}"))?
                .into_vec(),
            Self::EcdsaP256(key) => p256::PublicKey::from(key)
                .to_public_key_der()
                .map_err(|err| anyhow!("Failed to encode EC public key: {err}"))?
                .into_vec(),
            Self::Ed25519(key) => key
                .to_public_key_der()
                .map_err(|err| anyhow!("Failed to encode Ed25519 public key: {err}"))?
                .into_vec(),
        };
        Ok(der)
    }
}

impl ImageVerifyingKey for VerifyingKey {
    fn sig_tlv(&self) -> TlvKind {
        match self {
            // Size was checked on construction
            Self::Rsa(key) => rsa_sig_tlv(key.size()).unwrap_or(TlvKind::Rsa2048),
            Self::EcdsaP256(_) => TlvKind::Ecdsa256,
            Self::Ed25519(_) => TlvKind::Ed25519,
        }
    }

    fn verify(&self, signature: &[u8], payload: &[u8]) -> Result<(), SignatureError> {
        match self {
            Self::Rsa(key) => {
                let digest = Sha256::digest(payload);
                key.verify(
                    Pss::new_with_salt::<Sha256>(RSA_PSS_SALT_LEN),
                    &digest,
                    signature,
                )
                .map_err(|_| SignatureError::Mismatch)
            }
            Self::EcdsaP256(key) => {
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|err| SignatureError::Malformed(err.to_string()))?;
                key.verify(payload, &sig)
                    .map_err(|_| SignatureError::Mismatch)
            }
            Self::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|err| SignatureError::Malformed(err.to_string()))?;
                let digest = Sha256::digest(payload);
                key.verify(&digest, &sig)
                    .map_err(|_| SignatureError::Mismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{signing_key_from_pem_str, verifying_key_from_pem_str};
    use imgtool_fake_keys::*;

    const PAYLOAD: &[u8] = b"firmware image payload";

    fn sign(key: &SigningKey, payload: &[u8]) -> Vec<u8> {
        match key.sign_input() {
            SignInput::Payload => key.sign(payload).unwrap(),
            SignInput::Digest => key.sign(&Sha256::digest(payload)).unwrap(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        for pem in [
            RSA2048_SIGN_PRIVATE,
            RSA3072_SIGN_PRIVATE,
            EC256_SIGN_PRIVATE,
            ED25519_PRIVATE,
        ] {
            let key = signing_key_from_pem_str(pem).unwrap();
            let sig = sign(&key, PAYLOAD);
            let verifier = key.verifying_key();
            assert_eq!(verifier.verify(&sig, PAYLOAD), Ok(()));
            assert_eq!(
                verifier.verify(&sig, b"another payload"),
                Err(SignatureError::Mismatch)
            );
        }
    }

    #[test]
    fn test_signature_lengths() {
        let rsa = signing_key_from_pem_str(RSA2048_SIGN_PRIVATE).unwrap();
        assert_eq!(sign(&rsa, PAYLOAD).len(), 256);
        let rsa = signing_key_from_pem_str(RSA3072_SIGN_PRIVATE).unwrap();
        assert_eq!(sign(&rsa, PAYLOAD).len(), 384);
        let ed = signing_key_from_pem_str(ED25519_PRIVATE).unwrap();
        assert_eq!(sign(&ed, PAYLOAD).len(), 64);

        // DER encoded (r, s)
        let ec = signing_key_from_pem_str(EC256_SIGN_PRIVATE).unwrap();
        let sig = sign(&ec, PAYLOAD);
        assert_eq!(sig[0], 0x30);
        assert!((8..=72).contains(&sig.len()));
    }

    #[test]
    fn test_malformed_signature() {
        let ec = verifying_key_from_pem_str(EC256_SIGN_PUBLIC).unwrap();
        assert!(matches!(
            ec.verify(&[0x30, 0x00], PAYLOAD),
            Err(SignatureError::Malformed(_))
        ));
        let ed = verifying_key_from_pem_str(ED25519_PUBLIC).unwrap();
        assert!(matches!(
            ed.verify(&[0; 10], PAYLOAD),
            Err(SignatureError::Malformed(_))
        ));
        let rsa = verifying_key_from_pem_str(RSA2048_SIGN_PUBLIC).unwrap();
        assert_eq!(rsa.verify(&[0; 256], PAYLOAD), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_public_bytes_match_public_pem() {
        for (private, public) in [
            (RSA2048_SIGN_PRIVATE, RSA2048_SIGN_PUBLIC),
            (EC256_SIGN_PRIVATE, EC256_SIGN_PUBLIC),
            (ED25519_PRIVATE, ED25519_PUBLIC),
        ] {
            let signing = signing_key_from_pem_str(private).unwrap();
            let verifying = verifying_key_from_pem_str(public).unwrap();
            assert_eq!(
                signing.public_bytes().unwrap(),
                verifying.public_bytes().unwrap()
            );
        }
    }

    #[test]
    fn test_public_bytes_encoding() {
        // PKCS#1 RSAPublicKey for a 2048-bit modulus
        let rsa = signing_key_from_pem_str(RSA2048_SIGN_PRIVATE).unwrap();
        let der = rsa.public_bytes().unwrap();
        assert_eq!(&der[..4], &[0x30, 0x82, 0x01, 0x0a]);
        assert_eq!(der.len(), 270);

        let ec = signing_key_from_pem_str(EC256_SIGN_PRIVATE).unwrap();
        assert_eq!(ec.public_bytes().unwrap().len(), 91);

        let ed = signing_key_from_pem_str(ED25519_PRIVATE).unwrap();
        assert_eq!(ed.public_bytes().unwrap().len(), 44);
    }

    #[test]
    fn test_sign_input() {
        let ed = signing_key_from_pem_str(ED25519_PRIVATE).unwrap();
        assert_eq!(ed.sign_input(), SignInput::Digest);
        let ec = signing_key_from_pem_str(EC256_SIGN_PRIVATE).unwrap();
        assert_eq!(ec.sign_input(), SignInput::Payload);
    }
}
