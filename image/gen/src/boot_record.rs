/*++

Licensed under the Apache-2.0 license.

File Name:

   boot_record.rs

Abstract:

    File contains the CBOR encoder for the software component boot record.

--*/

use crate::BootRecordEncoder;

/// CBOR major types used by the boot record (RFC 8949)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MajorType {
    UnsignedInt = 0,
    ByteString = 2,
    TextString = 3,
    Map = 5,
}

/// Construct a CBOR initial byte from major type and additional info
const fn cbor_initial_byte(major_type: MajorType, additional_info: u8) -> u8 {
    ((major_type as u8) << 5) | additional_info
}

const SW_COMPONENT_TYPE: u64 = 1;
const SW_COMPONENT_MEASUREMENT_VALUE: u64 = 2;
const SW_COMPONENT_VERSION: u64 = 4;
const SW_COMPONENT_SIGNER_ID: u64 = 5;
const SW_COMPONENT_MEASUREMENT_DESCRIPTION: u64 = 6;

/// Boot record encoded as a CBOR map of software component properties.
///
/// The measurement value is always the last entry so the bootloader can
/// overwrite the placeholder digest in place.
#[derive(Default, Clone, Copy, Debug)]
pub struct CborBootRecord;

impl BootRecordEncoder for CborBootRecord {
    fn encode(
        &self,
        sw_type: &str,
        version: &str,
        hash_alg: &str,
        digest: &[u8],
        signer_id: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        let mut out = Vec::new();
        write_head(&mut out, MajorType::Map, 5);

        write_head(&mut out, MajorType::UnsignedInt, SW_COMPONENT_TYPE);
        write_text(&mut out, sw_type);
        write_head(&mut out, MajorType::UnsignedInt, SW_COMPONENT_VERSION);
        write_text(&mut out, version);
        write_head(&mut out, MajorType::UnsignedInt, SW_COMPONENT_SIGNER_ID);
        write_bytes(&mut out, signer_id);
        write_head(&mut out, MajorType::UnsignedInt, SW_COMPONENT_MEASUREMENT_DESCRIPTION);
        write_text(&mut out, hash_alg);
        write_head(&mut out, MajorType::UnsignedInt, SW_COMPONENT_MEASUREMENT_VALUE);
        write_bytes(&mut out, digest);

        Ok(out)
    }
}

/// Write a data item head in its shortest form
fn write_head(out: &mut Vec<u8>, major: MajorType, value: u64) {
    if value < 24 {
        out.push(cbor_initial_byte(major, value as u8));
    } else if let Ok(value) = u8::try_from(value) {
        out.push(cbor_initial_byte(major, 24));
        out.push(value);
    } else if let Ok(value) = u16::try_from(value) {
        out.push(cbor_initial_byte(major, 25));
        out.extend_from_slice(&value.to_be_bytes());
    } else if let Ok(value) = u32::try_from(value) {
        out.push(cbor_initial_byte(major, 26));
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.push(cbor_initial_byte(major, 27));
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn write_text(out: &mut Vec<u8>, text: &str) {
    write_head(out, MajorType::TextString, text.len() as u64);
    out.extend_from_slice(text.as_bytes());
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_head(out, MajorType::ByteString, bytes.len() as u64);
    out.extend_from_slice(bytes);
}
