/*++

Licensed under the Apache-2.0 license.

File Name:

    tlv.rs

Abstract:

    File contains the TLV block writer and reader.

--*/

use zerocopy::byteorder::{BigEndian, ByteOrder, LittleEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Endian, ImageError, TlvKind, TLV_INFO_MAGIC, TLV_INFO_SIZE, TLV_PROT_INFO_MAGIC, TLV_SIZE};

/// TLV group header
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RawTlvInfo<O: ByteOrder> {
    pub magic: U16<O>,

    /// Size of the whole block, this header included
    pub tlv_tot: U16<O>,
}

/// TLV record header
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RawTlvEntry<O: ByteOrder> {
    pub kind: u8,
    pub reserved: u8,
    pub len: U16<O>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlvRecord {
    pub kind: TlvKind,
    pub value: Vec<u8>,
}

/// Append-only sequence of TLV records sharing one group header
#[derive(Clone, Debug)]
pub struct TlvBlock {
    magic: u16,
    endian: Endian,
    records: Vec<TlvRecord>,
}

impl TlvBlock {
    pub fn new(magic: u16, endian: Endian) -> Self {
        Self {
            magic,
            endian,
            records: Vec::new(),
        }
    }

    /// Block included in the hashed range
    pub fn protected(endian: Endian) -> Self {
        Self::new(TLV_PROT_INFO_MAGIC, endian)
    }

    /// Block carrying the hash and signature
    pub fn unprotected(endian: Endian) -> Self {
        Self::new(TLV_INFO_MAGIC, endian)
    }

    pub fn magic(&self) -> u16 {
        self.magic
    }

    /// Append a record
    pub fn add(&mut self, kind: TlvKind, value: &[u8]) -> Result<(), ImageError> {
        if self.len() + TLV_SIZE + value.len() > usize::from(u16::MAX) {
            return Err(ImageError::TlvAreaTooLarge);
        }
        self.records.push(TlvRecord {
            kind,
            value: value.to_vec(),
        });
        Ok(())
    }

    pub fn records(&self) -> &[TlvRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialized size, group header included
    pub fn len(&self) -> usize {
        TLV_INFO_SIZE
            + self
                .records
                .iter()
                .map(|r| TLV_SIZE + r.value.len())
                .sum::<usize>()
    }

    /// Serialize the block. An empty block serializes to nothing.
    pub fn serialize(&self) -> Vec<u8> {
        if self.records.is_empty() {
            return Vec::new();
        }
        match self.endian {
            Endian::Little => self.serialize_as::<LittleEndian>(),
            Endian::Big => self.serialize_as::<BigEndian>(),
        }
    }

    fn serialize_as<O: ByteOrder>(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        let info = RawTlvInfo::<O> {
            magic: U16::new(self.magic),
            tlv_tot: U16::new(self.len() as u16),
        };
        out.extend_from_slice(info.as_bytes());
        for record in &self.records {
            let entry = RawTlvEntry::<O> {
                kind: record.kind.into(),
                reserved: 0,
                len: U16::new(record.value.len() as u16),
            };
            out.extend_from_slice(entry.as_bytes());
            out.extend_from_slice(&record.value);
        }
        out
    }
}

/// A record read back from an image. The kind is kept raw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TlvEntry<'a> {
    pub kind: u8,
    pub value: &'a [u8],
}

impl TlvEntry<'_> {
    pub fn is(&self, kind: TlvKind) -> bool {
        self.kind == u8::from(kind)
    }
}

/// A TLV block located inside an image
#[derive(Clone, Debug)]
pub struct TlvArea<'a> {
    pub magic: u16,
    pub tlv_tot: u16,
    pub entries: Vec<TlvEntry<'a>>,
}

impl<'a> TlvArea<'a> {
    /// Parse the TLV block starting at `offset`
    pub fn parse(image: &'a [u8], offset: usize, endian: Endian) -> Result<Self, ImageError> {
        match endian {
            Endian::Little => Self::parse_as::<LittleEndian>(image, offset),
            Endian::Big => Self::parse_as::<BigEndian>(image, offset),
        }
    }

    fn parse_as<O: ByteOrder>(image: &'a [u8], offset: usize) -> Result<Self, ImageError> {
        let start = image
            .get(offset..)
            .ok_or(ImageError::Truncated("TLV info"))?;
        let (info, _) = RawTlvInfo::<O>::read_from_prefix(start)
            .map_err(|_| ImageError::Truncated("TLV info"))?;

        let tlv_tot = usize::from(info.tlv_tot.get());
        let end = offset + tlv_tot;
        if tlv_tot < TLV_INFO_SIZE || end > image.len() {
            return Err(ImageError::Truncated("TLV area"));
        }

        let mut entries = Vec::new();
        let mut off = offset + TLV_INFO_SIZE;
        while off < end {
            let (entry, _) = RawTlvEntry::<O>::read_from_prefix(&image[off..end])
                .map_err(|_| ImageError::Truncated("TLV entry"))?;
            let value_start = off + TLV_SIZE;
            let value_end = value_start + usize::from(entry.len.get());
            if value_end > end {
                return Err(ImageError::Truncated("TLV value"));
            }
            entries.push(TlvEntry {
                kind: entry.kind,
                value: &image[value_start..value_end],
            });
            off = value_end;
        }

        Ok(Self {
            magic: info.magic.get(),
            tlv_tot: info.tlv_tot.get(),
            entries,
        })
    }
}
