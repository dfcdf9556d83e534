/*++

Licensed under the Apache-2.0 license.

File Name:

    trailer.rs

Abstract:

    File contains the sizing and contents of the bootloader trailer at the
    end of a slot.

--*/

use crate::{ImageError, BOOT_MAGIC, BOOT_MAGIC_SIZE, ENC_KEY_BYTE_SIZE, MAX_ALIGN};

pub const VALID_ALIGNMENTS: [u32; 5] = [1, 2, 4, 8, 16];

/// How the bootloader stores the image encryption key in the trailer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncKeySlot {
    /// Raw AES key
    Plain,

    /// The whole key-wrap TLV, padded to `MAX_ALIGN`
    SavedTlv { len: usize },
}

impl EncKeySlot {
    fn key_len(&self) -> usize {
        match self {
            EncKeySlot::Plain => ENC_KEY_BYTE_SIZE,
            EncKeySlot::SavedTlv { len } => len.div_ceil(MAX_ALIGN).max(1) * MAX_ALIGN,
        }
    }
}

/// Trailer parameters of a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrailerLayout {
    /// Flash write alignment
    pub align: u32,
    pub max_sectors: u32,
    pub overwrite_only: bool,
    pub enc_key: Option<EncKeySlot>,
}

impl TrailerLayout {
    /// Size of the trailer in bytes.
    ///
    /// Padding and slot-size checks must both go through this function.
    pub fn size(&self) -> Result<usize, ImageError> {
        if !VALID_ALIGNMENTS.contains(&self.align) {
            return Err(ImageError::InvalidAlignment(self.align));
        }

        if self.overwrite_only {
            return Ok(MAX_ALIGN * 2 + BOOT_MAGIC_SIZE);
        }

        // Swap status area
        let mut size = self.max_sectors as usize * 3 * self.align as usize;
        if let Some(slot) = self.enc_key {
            size += slot.key_len() * 2;
        }
        // image_ok, copy_done, swap_info, swap_size
        size += MAX_ALIGN * 4;
        size += BOOT_MAGIC_SIZE;
        Ok(size)
    }

    /// Trailer contents: erased flash, the image_ok flag when `confirm` is
    /// requested, and the boot magic.
    pub fn fill(&self, erased_val: u8, confirm: bool) -> Result<Vec<u8>, ImageError> {
        let size = self.size()?;
        let mut trailer = vec![erased_val; size - BOOT_MAGIC_SIZE];
        if confirm && !self.overwrite_only {
            let image_ok = trailer.len() - MAX_ALIGN;
            trailer[image_ok] = 0x01;
        }
        trailer.extend_from_slice(&BOOT_MAGIC);
        Ok(trailer)
    }
}
