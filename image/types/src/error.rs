/*++

Licensed under the Apache-2.0 license.

File Name:

    error.rs

Abstract:

    File contains the error type for image encoding and layout failures.

--*/

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid alignment: {0}")]
    InvalidAlignment(u32),

    #[error("'{sw_type}' is too long ({len} characters) for sw_type, the maximum allowed length is 12 characters")]
    SwTypeTooLong { sw_type: String, len: usize },

    #[error("image size ({image_size:#x}) + trailer ({trailer_size:#x}) exceeds requested size {slot_size:#x}")]
    SlotOverflow {
        image_size: usize,
        trailer_size: usize,
        slot_size: usize,
    },

    #[error("padding requested without a slot size")]
    PadWithoutSlotSize,

    #[error("header padding was not requested and image does not start with zeros")]
    HeaderNotErased,

    #[error("header size {0} cannot hold the image header")]
    HeaderSizeTooSmall(usize),

    #[error("TLV area does not fit its 16-bit length field")]
    TlvAreaTooLarge,

    #[error("unknown TLV kind {0:#04x}")]
    UnknownTlvKind(u8),

    #[error("image truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{images} dependency images given with {versions} versions")]
    DependencyCountMismatch { images: usize, versions: usize },

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("invalid dependency '{0}'")]
    InvalidDependency(String),

    #[error("invalid endianness '{0}'")]
    InvalidEndian(String),

    #[error("image of {0:#x} bytes does not fit the 32-bit size field")]
    ImageTooLarge(usize),

    #[error("protected TLV area is {actual} bytes but the header announces {expected}")]
    ProtectedTlvSizeMismatch { expected: usize, actual: usize },
}
