/*++

Licensed under the Apache-2.0 license.

File Name:

   keywrap.rs

Abstract:

    File contains the RSA-OAEP and ECIES-P256 wrapping of the image
    encryption key.

--*/

use aes::cipher::{KeyIvInit, StreamCipher};
use anyhow::{anyhow, bail};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use imgtool_gen::{ImageKeyWrapper, WrappedKey};
use imgtool_types::{ImageEncKey, TlvKind, ENC_KEY_BYTE_SIZE};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

const ECIES_INFO: &[u8] = b"MCUBoot_ECIES_v1";
const ECIES_OKM_LEN: usize = 48;
const EC_POINT_LEN: usize = 65;
const HMAC_LEN: usize = 32;
const RSA_ENC_MODULUS_BYTES: usize = 256;

/// Length of the `ENCEC256` TLV value
pub const ECIES_TLV_LEN: usize = EC_POINT_LEN + HMAC_LEN + ENC_KEY_BYTE_SIZE;

/// Length of the `ENCRSA2048` TLV value
pub const RSA_OAEP_TLV_LEN: usize = RSA_ENC_MODULUS_BYTES;

/// Public key of the party decrypting the image
#[derive(Clone, Debug)]
pub enum EncryptionKey {
    Rsa(RsaPublicKey),
    EcP256(p256::PublicKey),
}

impl EncryptionKey {
    /// Wrap an RSA public key. Only 2048 bit keys are supported.
    pub fn rsa(key: RsaPublicKey) -> anyhow::Result<Self> {
        if key.size() != RSA_ENC_MODULUS_BYTES {
            bail!("Encryption keys must be RSA-2048, got {} bits", key.size() * 8);
        }
        Ok(Self::Rsa(key))
    }
}

/// Derive the AES key and the HMAC key from the ECDH shared secret
fn ecies_kdf(shared_secret: &[u8]) -> anyhow::Result<[u8; ECIES_OKM_LEN]> {
    let mut okm = [0u8; ECIES_OKM_LEN];
    Hkdf::<Sha256>::new(None, shared_secret)
        .expand(ECIES_INFO, &mut okm)
        .map_err(|err| anyhow!("HKDF expand failed: {err}"))?;
    Ok(okm)
}

/// AES-128-CTR with an all-zero counter block, as used on the wrapped key
fn ecies_cipher(okm: &[u8; ECIES_OKM_LEN], data: &mut [u8]) -> anyhow::Result<()> {
    let mut cipher = Aes128Ctr::new_from_slices(&okm[..ENC_KEY_BYTE_SIZE], &[0u8; 16])
        .map_err(|err| anyhow!("Invalid key wrap cipher parameters: {err}"))?;
    cipher.apply_keystream(data);
    Ok(())
}

fn ecies_mac(okm: &[u8; ECIES_OKM_LEN]) -> anyhow::Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(&okm[ENC_KEY_BYTE_SIZE..])
        .map_err(|err| anyhow!("Invalid key wrap MAC key: {err}"))
}

impl ImageKeyWrapper for EncryptionKey {
    fn wrap_key(&self, key: &ImageEncKey) -> anyhow::Result<WrappedKey> {
        match self {
            Self::Rsa(public) => {
                let value = public
                    .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
                    .map_err(|err| anyhow!("RSA-OAEP key wrap failed: {err}"))?;
                Ok(WrappedKey {
                    kind: TlvKind::EncRsa2048,
                    value,
                })
            }
            Self::EcP256(public) => {
                let ephemeral = p256::ecdh::EphemeralSecret::random(&mut OsRng);
                let shared = ephemeral.diffie_hellman(public);
                let okm = ecies_kdf(shared.raw_secret_bytes())?;

                let mut cipherkey = *key;
                ecies_cipher(&okm, &mut cipherkey)?;

                let mut mac = ecies_mac(&okm)?;
                mac.update(&cipherkey);
                let tag = mac.finalize().into_bytes();

                let mut value = Vec::with_capacity(ECIES_TLV_LEN);
                value.extend_from_slice(ephemeral.public_key().to_encoded_point(false).as_bytes());
                value.extend_from_slice(&tag);
                value.extend_from_slice(&cipherkey);
                Ok(WrappedKey {
                    kind: TlvKind::EncEc256,
                    value,
                })
            }
        }
    }
}

/// Private key recovering the image encryption key from its wrap TLV.
/// This is the bootloader side of the exchange.
#[derive(Debug)]
pub enum DecryptionKey {
    Rsa(RsaPrivateKey),
    EcP256(p256::SecretKey),
}

impl DecryptionKey {
    /// Wrap an RSA private key. Only 2048 bit keys are supported.
    pub fn rsa(key: RsaPrivateKey) -> anyhow::Result<Self> {
        if key.size() != RSA_ENC_MODULUS_BYTES {
            bail!("Encryption keys must be RSA-2048, got {} bits", key.size() * 8);
        }
        Ok(Self::Rsa(key))
    }

    /// Matching public key
    pub fn encryption_key(&self) -> EncryptionKey {
        match self {
            Self::Rsa(key) => EncryptionKey::Rsa(key.to_public_key()),
            Self::EcP256(key) => EncryptionKey::EcP256(key.public_key()),
        }
    }

    /// TLV kind this key unwraps
    pub fn wrap_tlv(&self) -> TlvKind {
        match self {
            Self::Rsa(_) => TlvKind::EncRsa2048,
            Self::EcP256(_) => TlvKind::EncEc256,
        }
    }

    /// Recover the image encryption key from the value of its wrap TLV
    pub fn unwrap_key(&self, wrapped: &[u8]) -> anyhow::Result<ImageEncKey> {
        let plain = match self {
            Self::Rsa(private) => {
                if wrapped.len() != RSA_OAEP_TLV_LEN {
                    bail!("Wrapped key has {} bytes, expected {RSA_OAEP_TLV_LEN}", wrapped.len());
                }
                private
                    .decrypt(Oaep::new::<Sha256>(), wrapped)
                    .map_err(|err| anyhow!("RSA-OAEP key unwrap failed: {err}"))?
            }
            Self::EcP256(secret) => {
                if wrapped.len() != ECIES_TLV_LEN {
                    bail!("Wrapped key has {} bytes, expected {ECIES_TLV_LEN}", wrapped.len());
                }
                let (point, rest) = wrapped.split_at(EC_POINT_LEN);
                let (tag, cipherkey) = rest.split_at(HMAC_LEN);

                let ephemeral = p256::PublicKey::from_sec1_bytes(point)
                    .map_err(|err| anyhow!("Invalid ephemeral public key: {err}"))?;
                let shared =
                    p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
                let okm = ecies_kdf(shared.raw_secret_bytes())?;

                let mut mac = ecies_mac(&okm)?;
                mac.update(cipherkey);
                mac.verify_slice(tag)
                    .map_err(|_| anyhow!("Wrapped key authentication failed"))?;

                let mut key = cipherkey.to_vec();
                ecies_cipher(&okm, &mut key)?;
                key
            }
        };
        ImageEncKey::try_from(plain.as_slice())
            .map_err(|_| anyhow!("Unwrapped key has {} bytes", plain.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decryption_key_from_pem_str, encryption_key_from_pem_str};
    use imgtool_fake_keys::*;

    const KEY: ImageEncKey = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    #[test]
    fn test_rsa_wrap_unwrap() {
        let public = encryption_key_from_pem_str(RSA2048_ENC_PUBLIC).unwrap();
        let wrapped = public.wrap_key(&KEY).unwrap();
        assert_eq!(wrapped.kind, TlvKind::EncRsa2048);
        assert_eq!(wrapped.value.len(), RSA_OAEP_TLV_LEN);

        let private = decryption_key_from_pem_str(RSA2048_ENC_PRIVATE).unwrap();
        assert_eq!(private.wrap_tlv(), TlvKind::EncRsa2048);
        assert_eq!(private.unwrap_key(&wrapped.value).unwrap(), KEY);
    }

    #[test]
    fn test_ecies_wrap_unwrap() {
        let public = encryption_key_from_pem_str(EC256_ENC_PUBLIC).unwrap();
        let wrapped = public.wrap_key(&KEY).unwrap();
        assert_eq!(wrapped.kind, TlvKind::EncEc256);
        assert_eq!(wrapped.value.len(), 113);
        // Uncompressed SEC1 point
        assert_eq!(wrapped.value[0], 0x04);

        let private = decryption_key_from_pem_str(EC256_ENC_PRIVATE).unwrap();
        assert_eq!(private.unwrap_key(&wrapped.value).unwrap(), KEY);
    }

    #[test]
    fn test_ecies_ephemeral_key_is_fresh() {
        let public = encryption_key_from_pem_str(EC256_ENC_PUBLIC).unwrap();
        let a = public.wrap_key(&KEY).unwrap();
        let b = public.wrap_key(&KEY).unwrap();
        assert_ne!(a.value[..EC_POINT_LEN], b.value[..EC_POINT_LEN]);
    }

    #[test]
    fn test_ecies_tampered_key_rejected() {
        let public = encryption_key_from_pem_str(EC256_ENC_PUBLIC).unwrap();
        let private = decryption_key_from_pem_str(EC256_ENC_PRIVATE).unwrap();
        let mut wrapped = public.wrap_key(&KEY).unwrap().value;
        wrapped[ECIES_TLV_LEN - 1] ^= 1;
        assert!(private.unwrap_key(&wrapped).is_err());
        assert!(private.unwrap_key(&wrapped[..100]).is_err());
    }

    #[test]
    fn test_wrong_private_key() {
        let public = encryption_key_from_pem_str(EC256_ENC_PUBLIC).unwrap();
        let wrapped = public.wrap_key(&KEY).unwrap();
        let other = decryption_key_from_pem_str(EC256_SIGN_PRIVATE).unwrap();
        assert!(other.unwrap_key(&wrapped.value).is_err());
    }

    #[test]
    fn test_public_key_of_private_key() {
        let private = decryption_key_from_pem_str(EC256_ENC_PRIVATE).unwrap();
        let wrapped = private.encryption_key().wrap_key(&KEY).unwrap();
        assert_eq!(private.unwrap_key(&wrapped.value).unwrap(), KEY);
    }

    #[test]
    fn test_kdf_output_split() {
        let okm = ecies_kdf(&[7; 32]).unwrap();
        assert_ne!(okm[..16], okm[16..32]);
        assert_eq!(okm, ecies_kdf(&[7; 32]).unwrap());
    }
}
