/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures for the bootloader image generator.

--*/

mod boot_record;
mod encrypt;
mod generator;

pub use boot_record::CborBootRecord;
pub use encrypt::{generate_enc_key, otfdec_swap, BodyCipher, OTFDEC_FILLER};
pub use generator::{ImageGenerator, SignedImage};

use imgtool_types::*;

/// What a signing key expects to be handed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignInput {
    /// The full hashed range; the key hashes it itself
    Payload,

    /// The SHA-256 digest of the hashed range
    Digest,
}

/// Image signing key
pub trait ImageSigningKey {
    /// Encoded public key. Its SHA-256 digest is the `KEYHASH` TLV.
    fn public_bytes(&self) -> anyhow::Result<Vec<u8>>;

    /// TLV kind of the signature
    fn sig_tlv(&self) -> TlvKind;

    fn sign_input(&self) -> SignInput;

    /// Sign `data`, which is the payload or its digest per `sign_input()`
    fn sign(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Image encryption key, wrapped for the recipient
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedKey {
    pub kind: TlvKind,
    pub value: Vec<u8>,
}

/// Public key able to wrap the one-time image encryption key
pub trait ImageKeyWrapper {
    fn wrap_key(&self, key: &ImageEncKey) -> anyhow::Result<WrappedKey>;
}

/// Encoder of the boot record carried in the protected TLVs
pub trait BootRecordEncoder {
    fn encode(
        &self,
        sw_type: &str,
        version: &str,
        hash_alg: &str,
        digest: &[u8],
        signer_id: &[u8],
    ) -> anyhow::Result<Vec<u8>>;
}

/// Security counter source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityCounter {
    /// Derived from the image version
    Auto,
    Value(u32),
}

/// Image Generator Configuration
#[derive(Clone, Debug)]
pub struct ImageGeneratorConfig {
    pub version: ImageVersion,

    /// Size of the header region in front of the body
    pub header_size: u16,

    /// Prepend the header region instead of expecting it in the input
    pub pad_header: bool,

    /// Flash write alignment
    pub align: u32,

    /// Slot size, 0 to skip slot checks
    pub slot_size: usize,

    pub max_sectors: u32,

    pub overwrite_only: bool,

    pub endian: Endian,

    pub load_addr: u32,

    /// Value of erased flash, used for all padding
    pub erased_val: u8,

    pub security_counter: Option<SecurityCounter>,

    pub kind: ImageKind,

    pub pic: bool,

    pub non_bootable: bool,

    /// Size the trailer key slots for the whole key-wrap TLV
    pub save_enctlv: bool,

    /// Mark the padded image as confirmed
    pub confirm: bool,

    /// Pad the output to `slot_size` and append the trailer
    pub pad: bool,

    /// Keep the body in plaintext while still emitting the key TLV
    pub clear: bool,

    /// Software type of the boot record
    pub sw_type: Option<String>,

    pub dependencies: Vec<Dependency>,
}

impl Default for ImageGeneratorConfig {
    fn default() -> Self {
        Self {
            version: ImageVersion::default(),
            header_size: IMAGE_HEADER_SIZE as u16,
            pad_header: false,
            align: 1,
            slot_size: 0,
            max_sectors: DEFAULT_MAX_SECTORS,
            overwrite_only: false,
            endian: Endian::Little,
            load_addr: 0,
            erased_val: 0xff,
            security_counter: None,
            kind: ImageKind::Standard,
            pic: false,
            non_bootable: false,
            save_enctlv: false,
            confirm: false,
            pad: false,
            clear: false,
            sw_type: None,
            dependencies: Vec::new(),
        }
    }
}

impl ImageGeneratorConfig {
    /// Security counter value, if any
    pub fn security_counter(&self) -> Option<u32> {
        self.security_counter.map(|counter| match counter {
            SecurityCounter::Auto => self.version.security_counter(),
            SecurityCounter::Value(value) => value,
        })
    }

    /// Header flags before encryption is taken into account
    pub fn flags(&self) -> ImageFlags {
        let mut flags = self.kind.flags();
        flags.set(ImageFlags::PIC, self.pic);
        flags.set(ImageFlags::NON_BOOTABLE, self.non_bootable);
        flags
    }

    /// Trailer layout of the slot. `enc_tlv_len` is the size of the key-wrap
    /// TLV value when the image is encrypted.
    pub fn trailer_layout(&self, enc_tlv_len: Option<usize>) -> TrailerLayout {
        TrailerLayout {
            align: self.align,
            max_sectors: self.max_sectors,
            overwrite_only: self.overwrite_only,
            enc_key: enc_tlv_len.map(|len| {
                if self.save_enctlv {
                    EncKeySlot::SavedTlv { len }
                } else {
                    EncKeySlot::Plain
                }
            }),
        }
    }
}
