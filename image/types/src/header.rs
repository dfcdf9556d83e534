/*++

Licensed under the Apache-2.0 license.

File Name:

    header.rs

Abstract:

    File contains the 32-byte image header and its codec.

--*/

use zerocopy::byteorder::{BigEndian, ByteOrder, LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Endian, ImageError, ImageFlags, ImageVersion, IMAGE_HEADER_SIZE, IMAGE_MAGIC};

/// On-flash image header
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RawImageHeader<O: ByteOrder> {
    pub magic: U32<O>,
    pub load_addr: U32<O>,
    pub hdr_size: U16<O>,

    /// TLV info header + protected TLVs
    pub protect_tlv_size: U16<O>,

    /// Does not include the header
    pub img_size: U32<O>,
    pub flags: U32<O>,
    pub ver_major: u8,
    pub ver_minor: u8,
    pub ver_revision: U16<O>,
    pub ver_build: U32<O>,
    pub pad1: U32<O>,
}

const _: () = assert!(core::mem::size_of::<RawImageHeader<LittleEndian>>() == IMAGE_HEADER_SIZE);
const _: () = assert!(core::mem::size_of::<RawImageHeader<BigEndian>>() == IMAGE_HEADER_SIZE);

/// Decoded image header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub load_addr: u32,
    pub hdr_size: u16,
    pub protect_tlv_size: u16,
    pub img_size: u32,
    pub flags: ImageFlags,
    pub version: ImageVersion,
}

impl ImageHeader {
    /// Create a header carrying the image magic
    pub fn new(
        load_addr: u32,
        hdr_size: u16,
        protect_tlv_size: u16,
        img_size: u32,
        flags: ImageFlags,
        version: ImageVersion,
    ) -> Self {
        Self {
            magic: IMAGE_MAGIC,
            load_addr,
            hdr_size,
            protect_tlv_size,
            img_size,
            flags,
            version,
        }
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == IMAGE_MAGIC
    }

    /// Pack the header in the requested byte order
    pub fn encode(&self, endian: Endian) -> [u8; IMAGE_HEADER_SIZE] {
        match endian {
            Endian::Little => self.encode_as::<LittleEndian>(),
            Endian::Big => self.encode_as::<BigEndian>(),
        }
    }

    /// Unpack a header from the start of `bytes`. The reserved field is ignored.
    pub fn decode(bytes: &[u8], endian: Endian) -> Result<Self, ImageError> {
        match endian {
            Endian::Little => Self::decode_as::<LittleEndian>(bytes),
            Endian::Big => Self::decode_as::<BigEndian>(bytes),
        }
    }

    fn encode_as<O: ByteOrder>(&self) -> [u8; IMAGE_HEADER_SIZE] {
        let raw = RawImageHeader::<O> {
            magic: U32::new(self.magic),
            load_addr: U32::new(self.load_addr),
            hdr_size: U16::new(self.hdr_size),
            protect_tlv_size: U16::new(self.protect_tlv_size),
            img_size: U32::new(self.img_size),
            flags: U32::new(self.flags.bits()),
            ver_major: self.version.major,
            ver_minor: self.version.minor,
            ver_revision: U16::new(self.version.revision),
            ver_build: U32::new(self.version.build),
            pad1: U32::new(0),
        };
        let mut out = [0u8; IMAGE_HEADER_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    fn decode_as<O: ByteOrder>(bytes: &[u8]) -> Result<Self, ImageError> {
        let (raw, _) = RawImageHeader::<O>::read_from_prefix(bytes)
            .map_err(|_| ImageError::Truncated("image header"))?;
        Ok(Self {
            magic: raw.magic.get(),
            load_addr: raw.load_addr.get(),
            hdr_size: raw.hdr_size.get(),
            protect_tlv_size: raw.protect_tlv_size.get(),
            img_size: raw.img_size.get(),
            flags: ImageFlags::from_bits_retain(raw.flags.get()),
            version: ImageVersion {
                major: raw.ver_major,
                minor: raw.ver_minor,
                revision: raw.ver_revision.get(),
                build: raw.ver_build.get(),
            },
        })
    }
}
