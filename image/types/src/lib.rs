/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures and constants for the bootloader image format.

--*/

mod error;
mod header;
mod tlv;
mod trailer;
mod version;

use core::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use error::ImageError;
pub use header::{ImageHeader, RawImageHeader};
pub use tlv::{RawTlvEntry, RawTlvInfo, TlvArea, TlvBlock, TlvEntry, TlvRecord};
pub use trailer::{EncKeySlot, TrailerLayout, VALID_ALIGNMENTS};
pub use version::{Dependency, ImageVersion, RawDependency};

pub const IMAGE_MAGIC: u32 = 0x96f3_b83d;
pub const IMAGE_HEADER_SIZE: usize = 32;
pub const DEFAULT_MAX_SECTORS: u32 = 128;
pub const MAX_ALIGN: usize = 8;
pub const MAX_SW_TYPE_LENGTH: usize = 12;

pub const TLV_SIZE: usize = 4;
pub const TLV_INFO_SIZE: usize = 4;
pub const TLV_INFO_MAGIC: u16 = 0x6907;
pub const TLV_PROT_INFO_MAGIC: u16 = 0x6908;

/// Size of the security counter TLV: entry header + u32 value
pub const SEC_CNT_TLV_SIZE: usize = TLV_SIZE + 4;

/// Size of a dependency TLV: entry header + `RawDependency`
pub const DEPENDENCY_TLV_SIZE: usize = TLV_SIZE + DEPENDENCY_SIZE;
pub const DEPENDENCY_SIZE: usize = 12;

pub const SHA256_DIGEST_BYTE_SIZE: usize = 32;
pub const ENC_KEY_BYTE_SIZE: usize = 16;
pub const AES_BLOCK_BYTE_SIZE: usize = 16;

pub const BOOT_MAGIC_SIZE: usize = 16;
pub const BOOT_MAGIC: [u8; BOOT_MAGIC_SIZE] = [
    0x77, 0xc2, 0x95, 0xf3, 0x60, 0xd2, 0xef, 0x7f, 0x35, 0x52, 0x50, 0x0f, 0x2c, 0xb6, 0x79, 0x80,
];

pub type ImageDigest = [u8; SHA256_DIGEST_BYTE_SIZE];
pub type ImageEncKey = [u8; ENC_KEY_BYTE_SIZE];

bitflags::bitflags! {
    /// Image header flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ImageFlags: u32 {
        const PIC = 0x0000_0001;
        const PRIMARY_ONLY = 0x0000_0002;
        const ENCRYPTED = 0x0000_0004;
        const OTFDEC = 0x0000_0008;
        const NON_BOOTABLE = 0x0000_0010;
    }
}

/// Kind of image being built.
///
/// `PrimaryOnly` and `Otfdec` occupy separate header bits but are never set
/// together; `ENCRYPTED` is derived from the kind and the presence of an
/// encryption key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageKind {
    #[default]
    Standard,

    /// Image that only ever runs from the primary slot
    PrimaryOnly,

    /// Image decrypted on the fly by the OTFDEC engine mapped at `address`
    Otfdec { address: u32 },
}

impl ImageKind {
    /// Header flag carried by this kind
    pub fn flags(&self) -> ImageFlags {
        match self {
            ImageKind::Standard => ImageFlags::empty(),
            ImageKind::PrimaryOnly => ImageFlags::PRIMARY_ONLY,
            ImageKind::Otfdec { .. } => ImageFlags::OTFDEC,
        }
    }

    pub fn is_otfdec(&self) -> bool {
        matches!(self, ImageKind::Otfdec { .. })
    }

    /// Flash address the body cipher counter is derived from
    pub fn encryption_address(&self) -> u32 {
        match self {
            ImageKind::Otfdec { address } => *address,
            _ => 0,
        }
    }
}

/// TLV kinds understood by the bootloader
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
pub enum TlvKind {
    KeyHash = 0x01,
    Sha256 = 0x10,
    Rsa2048 = 0x20,
    Ecdsa224 = 0x21,
    Ecdsa256 = 0x22,
    Rsa3072 = 0x23,
    Ed25519 = 0x24,
    EncRsa2048 = 0x30,
    EncKw128 = 0x31,
    EncEc256 = 0x32,
    Dependency = 0x40,
    SecCnt = 0x50,
    BootRecord = 0x60,
}

impl TlvKind {
    /// Decode a raw TLV type, rejecting codes outside the registered table
    pub fn from_raw(raw: u8) -> Result<Self, ImageError> {
        Self::try_from(raw).map_err(|e| ImageError::UnknownTlvKind(e.number))
    }

    pub fn name(&self) -> &'static str {
        match self {
            TlvKind::KeyHash => "KEYHASH",
            TlvKind::Sha256 => "SHA256",
            TlvKind::Rsa2048 => "RSA2048",
            TlvKind::Ecdsa224 => "ECDSA224",
            TlvKind::Ecdsa256 => "ECDSA256",
            TlvKind::Rsa3072 => "RSA3072",
            TlvKind::Ed25519 => "ED25519",
            TlvKind::EncRsa2048 => "ENCRSA2048",
            TlvKind::EncKw128 => "ENCKW128",
            TlvKind::EncEc256 => "ENCEC256",
            TlvKind::Dependency => "DEPENDENCY",
            TlvKind::SecCnt => "SEC_CNT",
            TlvKind::BootRecord => "BOOT_RECORD",
        }
    }
}

/// Byte order of every multi-byte field in the image
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl FromStr for Endian {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "little" => Ok(Endian::Little),
            "big" => Ok(Endian::Big),
            _ => Err(ImageError::InvalidEndian(s.to_string())),
        }
    }
}

impl Endian {
    pub fn u32_bytes(&self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}
