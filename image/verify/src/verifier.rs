/*++

Licensed under the Apache-2.0 license.

File Name:

    verifier.rs

Abstract:

    This file is the main implementation of the bootloader image verifier.

--*/

use imgtool_types::*;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::*;

/// Image Verifier
pub struct ImageVerifier<'a> {
    key: Option<&'a dyn ImageVerifyingKey>,
    endian: Endian,
}

impl<'a> ImageVerifier<'a> {
    /// Create a new instance `ImageVerifier`
    ///
    /// # Arguments
    ///
    /// * `key` - Key checking the signature. Without a key only the hash is
    ///   checked.
    pub fn new(key: Option<&'a dyn ImageVerifyingKey>) -> Self {
        Self {
            key,
            endian: Endian::Little,
        }
    }

    /// Byte order the image was generated with
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Verify image
    ///
    /// # Arguments
    ///
    /// * `image` - Image to verify
    ///
    /// # Returns
    ///
    /// * `(VerifyResult, Option<ImageVersion>)` - Outcome, and the image
    ///   version when the outcome is `Ok`
    pub fn verify(&self, image: &[u8]) -> (VerifyResult, Option<ImageVersion>) {
        let header = match ImageHeader::decode(image, self.endian) {
            Ok(header) if header.has_valid_magic() => header,
            _ => return (VerifyResult::InvalidMagic, None),
        };
        debug!("Image header: {header:x?}");

        let encrypted = header.flags.contains(ImageFlags::ENCRYPTED);
        let otfdec = header.flags.contains(ImageFlags::OTFDEC);
        let primary_only = header.flags.contains(ImageFlags::PRIMARY_ONLY);

        let prot_tlv_off = usize::from(header.hdr_size) + header.img_size as usize;
        let tlv_off = prot_tlv_off + usize::from(header.protect_tlv_size);
        if header.protect_tlv_size > 0 {
            self.log_protected_tlvs(image, prot_tlv_off);
        }

        // The sizes locating the TLV area are part of the hashed header, so a
        // block that cannot be found means the hashed range was altered.
        let tlvs = match TlvArea::parse(image, tlv_off, self.endian) {
            Ok(tlvs) if tlvs.magic == TLV_INFO_MAGIC => tlvs,
            Ok(tlvs) => {
                debug!("Unexpected TLV info magic {:#06x}", tlvs.magic);
                return (VerifyResult::InvalidHash, None);
            }
            Err(err) => {
                debug!("Unreadable TLV area at {tlv_off:#x}: {err}");
                return (VerifyResult::InvalidHash, None);
            }
        };

        let payload = &image[..tlv_off];
        let digest: ImageDigest = Sha256::digest(payload).into();

        for tlv in &tlvs.entries {
            debug!("TLV {:#04x} ({} bytes)", tlv.kind, tlv.value.len());

            if tlv.is(TlvKind::Sha256) {
                if tlv.value == digest.as_slice() {
                    debug!("Hash validated: {}", hex::encode(digest));
                    if self.key.is_none() {
                        return self.ok(&header);
                    }
                } else if encrypted && !otfdec {
                    warn!("Hash verification not supported for encrypted images");
                } else {
                    return (VerifyResult::InvalidHash, None);
                }
                continue;
            }

            let Some(key) = self.key else {
                continue;
            };
            if tlv.is(key.sig_tlv()) {
                match key.verify(tlv.value, payload) {
                    Ok(()) => {
                        debug!("{} signature validated", key.sig_tlv().name());
                        return self.ok(&header);
                    }
                    // Another signature TLV may still match
                    Err(err) => debug!("{} signature rejected: {err}", key.sig_tlv().name()),
                }
            }
        }

        if primary_only && encrypted {
            return self.ok(&header);
        }
        if encrypted && !otfdec {
            warn!("Signature verification not supported for encrypted images");
            return self.ok(&header);
        }
        (VerifyResult::InvalidSignature, None)
    }

    fn ok(&self, header: &ImageHeader) -> (VerifyResult, Option<ImageVersion>) {
        info!("Image verified, version {}", header.version);
        (VerifyResult::Ok, Some(header.version))
    }

    fn log_protected_tlvs(&self, image: &[u8], offset: usize) {
        match TlvArea::parse(image, offset, self.endian) {
            Ok(tlvs) => {
                for tlv in &tlvs.entries {
                    let name = TlvKind::from_raw(tlv.kind).map_or("UNKNOWN", |kind| kind.name());
                    debug!("Protected TLV {name}: {}", hex::encode(tlv.value));
                }
            }
            Err(err) => debug!("Unreadable protected TLVs: {err}"),
        }
    }
}

/// Verify a little-endian image
pub fn verify(
    image: &[u8],
    key: Option<&dyn ImageVerifyingKey>,
) -> (VerifyResult, Option<ImageVersion>) {
    ImageVerifier::new(key).verify(image)
}
