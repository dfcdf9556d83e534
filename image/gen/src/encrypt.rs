/*++

Licensed under the Apache-2.0 license.

File Name:

   encrypt.rs

Abstract:

    File contains the image body cipher and the OTFDEC block transform.

--*/

use aes::cipher::{KeyIvInit, StreamCipher};
use anyhow::Context;
use imgtool_types::{ImageEncKey, AES_BLOCK_BYTE_SIZE};
use rand::{rngs::OsRng, RngCore};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Filler appended to an OTFDEC body to reach a whole number of blocks
pub const OTFDEC_FILLER: u8 = b'0';

/// Generate a one-time image encryption key
pub fn generate_enc_key() -> anyhow::Result<ImageEncKey> {
    let mut key = ImageEncKey::default();
    OsRng
        .try_fill_bytes(&mut key)
        .context("Failed to generate the image encryption key")?;
    Ok(key)
}

/// Reverse the bytes of every 16-byte block. Applying it twice is a no-op.
pub fn otfdec_swap(data: &mut [u8]) {
    for block in data.chunks_mut(AES_BLOCK_BYTE_SIZE) {
        block.reverse();
    }
}

/// AES-128-CTR over the image body.
///
/// The initial counter block is the big-endian encoding of `address / 16`,
/// which matches the counter an OTFDEC engine mapped at `address` uses.
pub struct BodyCipher {
    key: ImageEncKey,
    address: u32,
}

impl BodyCipher {
    pub fn new(key: &ImageEncKey, address: u32) -> Self {
        Self { key: *key, address }
    }

    /// Initial counter block
    pub fn nonce(&self) -> [u8; AES_BLOCK_BYTE_SIZE] {
        u128::from(self.address / AES_BLOCK_BYTE_SIZE as u32).to_be_bytes()
    }

    /// XOR `data` with the keystream
    pub fn apply(&self, data: &mut [u8]) {
        let mut cipher = Aes128Ctr::new(&self.key.into(), &self.nonce().into());
        cipher.apply_keystream(data);
    }

    /// Encrypt (or decrypt) an image body.
    ///
    /// For OTFDEC the body is padded to a block boundary and every block is
    /// byte-reversed before and after the keystream is applied; the padding
    /// is dropped from the result.
    pub fn encrypt_body(&self, body: &[u8], otfdec: bool) -> Vec<u8> {
        let mut out = body.to_vec();
        if !otfdec {
            self.apply(&mut out);
            return out;
        }

        out.resize(body.len().next_multiple_of(AES_BLOCK_BYTE_SIZE), OTFDEC_FILLER);
        otfdec_swap(&mut out);
        self.apply(&mut out);
        otfdec_swap(&mut out);
        out.truncate(body.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: ImageEncKey = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_otfdec_swap_is_involution() {
        let original = body(48);
        let mut data = original.clone();
        otfdec_swap(&mut data);
        let mut first: Vec<u8> = original[..16].to_vec();
        first.reverse();
        assert_eq!(&data[..16], &first[..]);
        assert_ne!(data, original);
        otfdec_swap(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_nonce_from_address() {
        assert_eq!(BodyCipher::new(&KEY, 0).nonce(), [0; 16]);
        let nonce = BodyCipher::new(&KEY, 0x9000_0010).nonce();
        assert_eq!(&nonce[..12], &[0; 12]);
        assert_eq!(&nonce[12..], &[0x09, 0x00, 0x00, 0x01]);
        // Addresses inside the same block share a counter
        assert_eq!(
            BodyCipher::new(&KEY, 0x1000).nonce(),
            BodyCipher::new(&KEY, 0x100f).nonce()
        );
    }

    #[test]
    fn test_ctr_keystream() {
        // First keystream block is the encrypted counter block
        use aes::cipher::{BlockEncrypt, KeyInit};
        let cipher = BodyCipher::new(&KEY, 0x20);
        let mut data = [0u8; 16];
        cipher.apply(&mut data);

        let mut block = aes::Block::from(cipher.nonce());
        aes::Aes128::new(&KEY.into()).encrypt_block(&mut block);
        assert_eq!(&data[..], &block[..]);
    }

    #[test]
    fn test_encrypt_body_round_trip() {
        let plain = body(1000);
        let cipher = BodyCipher::new(&KEY, 0);
        let encrypted = cipher.encrypt_body(&plain, false);
        assert_eq!(encrypted.len(), plain.len());
        assert_ne!(encrypted, plain);
        assert_eq!(cipher.encrypt_body(&encrypted, false), plain);
    }

    #[test]
    fn test_otfdec_round_trip_unaligned() {
        for len in [1, 15, 16, 17, 1000] {
            let plain = body(len);
            let cipher = BodyCipher::new(&KEY, 0x0800_4000);
            let encrypted = cipher.encrypt_body(&plain, true);
            assert_eq!(encrypted.len(), len);
            assert_eq!(cipher.encrypt_body(&encrypted, true), plain);
        }
    }

    #[test]
    fn test_otfdec_differs_from_plain_ctr() {
        let plain = body(64);
        let cipher = BodyCipher::new(&KEY, 0);
        let mut expected = plain.clone();
        otfdec_swap(&mut expected);
        cipher.apply(&mut expected);
        otfdec_swap(&mut expected);
        assert_eq!(cipher.encrypt_body(&plain, true), expected);
        assert_ne!(cipher.encrypt_body(&plain, true), cipher.encrypt_body(&plain, false));
    }

    #[test]
    fn test_address_changes_ciphertext() {
        let plain = body(32);
        assert_ne!(
            BodyCipher::new(&KEY, 0).encrypt_body(&plain, false),
            BodyCipher::new(&KEY, 0x10).encrypt_body(&plain, false)
        );
    }

    #[test]
    fn test_generate_enc_key() {
        let a = generate_enc_key().unwrap();
        let b = generate_enc_key().unwrap();
        assert_ne!(a, b);
    }
}
