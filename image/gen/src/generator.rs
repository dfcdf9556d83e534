/*++

Licensed under the Apache-2.0 license.

File Name:

   generator.rs

Abstract:

    Bootloader image generator

--*/
use anyhow::{bail, Context};
use imgtool_types::*;
use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::*;

/// Image generator
pub struct ImageGenerator<B: BootRecordEncoder = CborBootRecord> {
    config: ImageGeneratorConfig,
    boot_record: B,
}

impl ImageGenerator<CborBootRecord> {
    /// Create an instance `ImageGenerator`
    pub fn new(config: ImageGeneratorConfig) -> Self {
        Self::with_boot_record_encoder(config, CborBootRecord)
    }
}

impl<B: BootRecordEncoder> ImageGenerator<B> {
    /// Create an instance `ImageGenerator` with a custom boot record encoder
    pub fn with_boot_record_encoder(config: ImageGeneratorConfig, boot_record: B) -> Self {
        Self {
            config,
            boot_record,
        }
    }

    pub fn config(&self) -> &ImageGeneratorConfig {
        &self.config
    }

    /// Generate image
    ///
    /// # Arguments
    ///
    /// * `input` - Image contents, starting with the header region unless
    ///   `pad_header` is set
    /// * `signing_key` - Key signing the image
    /// * `enc_key` - Public key wrapping the image encryption key
    ///
    /// # Returns
    ///
    /// * `SignedImage` - Header, body and TLVs, padded with the trailer when
    ///   `pad` is set
    pub fn generate(
        &self,
        input: &[u8],
        signing_key: Option<&dyn ImageSigningKey>,
        enc_key: Option<&dyn ImageKeyWrapper>,
    ) -> anyhow::Result<SignedImage> {
        let config = &self.config;
        if config.pad && config.slot_size == 0 {
            bail!(ImageError::PadWithoutSlotSize);
        }
        let header_size = usize::from(config.header_size);
        let mut payload = self.load(input)?;

        let signer_id: ImageDigest = match signing_key {
            Some(key) => Sha256::digest(key.public_bytes()?).into(),
            None => ImageDigest::default(),
        };

        // Protected TLVs
        let prot_tlv = self.protected_tlvs(&signer_id)?;
        let protected_tlv_size = if prot_tlv.is_empty() {
            0
        } else {
            prot_tlv.len()
        };
        let expected_size = self.protected_tlv_size(prot_tlv.records())?;
        if protected_tlv_size != expected_size {
            bail!(ImageError::ProtectedTlvSizeMismatch {
                expected: expected_size,
                actual: protected_tlv_size,
            });
        }
        let prot_bytes = prot_tlv.serialize();

        // Header
        let mut flags = config.flags();
        if enc_key.is_some() && config.kind == ImageKind::Standard {
            flags |= ImageFlags::ENCRYPTED;
        }
        let img_size = payload.len() - header_size;
        let mut header = ImageHeader::new(
            config.load_addr,
            config.header_size,
            protected_tlv_size as u16,
            u32::try_from(img_size).map_err(|_| ImageError::ImageTooLarge(img_size))?,
            flags,
            config.version,
        );
        payload[..IMAGE_HEADER_SIZE].copy_from_slice(&header.encode(config.endian));
        debug!("Image header: {header:x?}");

        let mut tlv = TlvBlock::unprotected(config.endian);

        // Hash and sign the plaintext image
        if !config.kind.is_otfdec() {
            let payload_for_hash_v1 = [payload.as_slice(), &prot_bytes].concat();
            self.hash_and_sign(&mut tlv, &payload_for_hash_v1, signing_key, &signer_id)?;
        }

        // Encrypt the body while the protected TLVs are held apart
        let mut enc_tlv_len = None;
        let mut wrapped = None;
        if let Some(enc_key) = enc_key {
            let plain_key = generate_enc_key()?;
            let key_tlv = enc_key
                .wrap_key(&plain_key)
                .context("Failed to wrap the image encryption key")?;
            enc_tlv_len = Some(key_tlv.value.len());
            info!(
                "Encrypting image body with a {} wrapped key",
                key_tlv.kind.name()
            );

            let cipher = BodyCipher::new(&plain_key, config.kind.encryption_address());
            let body = cipher.encrypt_body(&payload[header_size..], config.kind.is_otfdec());
            if !config.clear {
                payload.truncate(header_size);
                payload.extend_from_slice(&body);
            }
            wrapped = Some(key_tlv);
        }

        // OTFDEC images are hashed and signed as stored
        if config.kind.is_otfdec() {
            let payload_for_hash_v2 = [payload.as_slice(), &prot_bytes].concat();
            self.hash_and_sign(&mut tlv, &payload_for_hash_v2, signing_key, &signer_id)?;
        }

        // The primary-only hash covers a header without ENCRYPTED
        if config.kind == ImageKind::PrimaryOnly && enc_key.is_some() {
            header.flags |= ImageFlags::ENCRYPTED;
            payload[..IMAGE_HEADER_SIZE].copy_from_slice(&header.encode(config.endian));
        }

        // The key-wrap TLV goes last for every image kind, OTFDEC included.
        // The bootloader looks TLVs up by kind.
        if let Some(key_tlv) = wrapped {
            tlv.add(key_tlv.kind, &key_tlv.value)?;
        }

        payload.extend_from_slice(&prot_bytes);
        payload.extend_from_slice(&tlv.serialize());

        let mut image = SignedImage {
            bytes: payload,
            header,
            trailer: config.trailer_layout(enc_tlv_len),
            slot_size: config.slot_size,
            erased_val: config.erased_val,
            confirm: config.confirm,
        };
        image.check_trailer()?;
        if config.pad {
            image.pad_to(config.slot_size)?;
        }

        info!(
            "Generated image of {} bytes, version {}, flags {:?}",
            image.bytes.len(),
            header.version,
            header.flags
        );
        Ok(image)
    }

    /// Build the payload from the input and check the header region
    fn load(&self, input: &[u8]) -> anyhow::Result<Vec<u8>> {
        let config = &self.config;
        let header_size = usize::from(config.header_size);
        if header_size > 0 && header_size < IMAGE_HEADER_SIZE {
            bail!(ImageError::HeaderSizeTooSmall(header_size));
        }

        let mut payload = Vec::with_capacity(header_size + input.len());
        if config.pad_header && header_size > 0 {
            payload.resize(header_size, config.erased_val);
        }
        payload.extend_from_slice(input);

        if payload.len() < header_size.max(IMAGE_HEADER_SIZE) {
            bail!(ImageError::Truncated("image header"));
        }
        if header_size > 0 && !config.pad_header && payload[..header_size].iter().any(|&b| b != 0)
        {
            bail!(ImageError::HeaderNotErased);
        }
        Ok(payload)
    }

    /// Size of the protected TLV area for the given records, computed ahead of
    /// serialization: security counter, boot record, dependencies, info header
    fn protected_tlv_size(&self, records: &[TlvRecord]) -> Result<usize, ImageError> {
        let config = &self.config;
        let mut size = 0;
        if config.security_counter.is_some() {
            size += SEC_CNT_TLV_SIZE;
        }
        if config.sw_type.is_some() {
            let boot_record = records
                .iter()
                .find(|r| r.kind == TlvKind::BootRecord)
                .ok_or(ImageError::Truncated("boot record"))?;
            size += TLV_SIZE + boot_record.value.len();
        }
        size += config.dependencies.len() * DEPENDENCY_TLV_SIZE;
        if size != 0 {
            size += TLV_INFO_SIZE;
        }
        Ok(size)
    }

    /// Security counter, boot record, then dependencies
    fn protected_tlvs(&self, signer_id: &ImageDigest) -> anyhow::Result<TlvBlock> {
        let config = &self.config;
        let mut prot_tlv = TlvBlock::protected(config.endian);

        if let Some(counter) = config.security_counter() {
            debug!("Security counter: {counter:#x}");
            prot_tlv.add(TlvKind::SecCnt, &config.endian.u32_bytes(counter))?;
        }

        if let Some(sw_type) = &config.sw_type {
            if sw_type.len() > MAX_SW_TYPE_LENGTH {
                bail!(ImageError::SwTypeTooLong {
                    sw_type: sw_type.clone(),
                    len: sw_type.len(),
                });
            }
            // The bootloader patches in the real digest
            let boot_record = self
                .boot_record
                .encode(
                    sw_type,
                    &config.version.boot_record_version(),
                    "SHA256",
                    &ImageDigest::default(),
                    signer_id,
                )
                .context("Failed to encode the boot record")?;
            prot_tlv.add(TlvKind::BootRecord, &boot_record)?;
        }

        for dependency in &config.dependencies {
            prot_tlv.add(TlvKind::Dependency, &dependency.encode(config.endian))?;
        }

        Ok(prot_tlv)
    }

    /// Add the SHA256, KEYHASH and signature TLVs for `payload`
    fn hash_and_sign(
        &self,
        tlv: &mut TlvBlock,
        payload: &[u8],
        signing_key: Option<&dyn ImageSigningKey>,
        signer_id: &ImageDigest,
    ) -> anyhow::Result<()> {
        let digest: ImageDigest = Sha256::digest(payload).into();
        debug!("Image digest: {}", hex::encode(digest));
        tlv.add(TlvKind::Sha256, &digest)?;

        if let Some(key) = signing_key {
            tlv.add(TlvKind::KeyHash, signer_id)?;
            let sig = match key.sign_input() {
                SignInput::Payload => key.sign(payload),
                SignInput::Digest => key.sign(&digest),
            }
            .context("Failed to sign the image")?;
            debug!("{} signature: {} bytes", key.sig_tlv().name(), sig.len());
            tlv.add(key.sig_tlv(), &sig)?;
        }
        Ok(())
    }
}

/// Generated image
#[derive(Clone, Debug)]
pub struct SignedImage {
    bytes: Vec<u8>,
    header: ImageHeader,
    trailer: TrailerLayout,
    slot_size: usize,
    erased_val: u8,
    confirm: bool,
}

impl SignedImage {
    /// Final image header
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn trailer_layout(&self) -> &TrailerLayout {
        &self.trailer
    }

    /// Check the image and its trailer fit the slot
    pub fn check_trailer(&self) -> Result<(), ImageError> {
        let trailer_size = self.trailer.size()?;
        if self.slot_size > 0 && self.bytes.len() + trailer_size > self.slot_size {
            return Err(ImageError::SlotOverflow {
                image_size: self.bytes.len(),
                trailer_size,
                slot_size: self.slot_size,
            });
        }
        Ok(())
    }

    /// Pad the image to `size` bytes, ending with the trailer
    pub fn pad_to(&mut self, size: usize) -> Result<(), ImageError> {
        let trailer_size = self.trailer.size()?;
        let padding = size
            .checked_sub(self.bytes.len() + trailer_size)
            .ok_or(ImageError::SlotOverflow {
                image_size: self.bytes.len(),
                trailer_size,
                slot_size: size,
            })?;
        let trailer = self.trailer.fill(self.erased_val, self.confirm)?;
        self.bytes
            .resize(self.bytes.len() + padding, self.erased_val);
        self.bytes.extend_from_slice(&trailer);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
