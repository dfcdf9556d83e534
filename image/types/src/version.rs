/*++

Licensed under the Apache-2.0 license.

File Name:

    version.rs

Abstract:

    File contains the image version and image dependency types.

--*/

use core::fmt;
use core::str::FromStr;

use zerocopy::byteorder::{BigEndian, ByteOrder, LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Endian, ImageError, DEPENDENCY_SIZE};

/// Image version: `major.minor.revision+build`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u16,
    pub build: u32,
}

impl ImageVersion {
    pub fn new(major: u8, minor: u8, revision: u16, build: u32) -> Self {
        Self {
            major,
            minor,
            revision,
            build,
        }
    }

    /// Security counter derived from the version
    pub fn security_counter(&self) -> u32 {
        (u32::from(self.major) << 24) | (u32::from(self.minor) << 16) | u32::from(self.revision)
    }

    /// Version string carried in the boot record. The build number is omitted.
    pub fn boot_record_version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Decimal number without sign or leading zeros
fn number<T: FromStr>(part: &str) -> Option<T> {
    if part.is_empty()
        || !part.bytes().all(|b| b.is_ascii_digit())
        || (part.len() > 1 && part.starts_with('0'))
    {
        return None;
    }
    part.parse().ok()
}

impl FromStr for ImageVersion {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ImageError::InvalidVersion(s.to_string());

        let (triple, build) = match s.split_once('+') {
            Some((triple, build)) => (triple, Some(build)),
            None => (s, None),
        };
        let parts: Vec<&str> = triple.split('.').collect();
        if parts.len() > 3 || (build.is_some() && parts.len() != 3) {
            return Err(invalid());
        }

        let mut version = ImageVersion {
            major: number(parts[0]).ok_or_else(invalid)?,
            ..Default::default()
        };
        if let Some(minor) = parts.get(1) {
            version.minor = number(minor).ok_or_else(invalid)?;
        }
        if let Some(revision) = parts.get(2) {
            version.revision = number(revision).ok_or_else(invalid)?;
        }
        if let Some(build) = build {
            version.build = number(build).ok_or_else(invalid)?;
        }
        Ok(version)
    }
}

impl fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}+{}",
            self.major, self.minor, self.revision, self.build
        )
    }
}

/// On-flash dependency record
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RawDependency<O: ByteOrder> {
    pub image_id: u8,
    pub pad: [u8; 3],
    pub ver_major: u8,
    pub ver_minor: u8,
    pub ver_revision: U16<O>,
    pub ver_build: U32<O>,
}

const _: () = assert!(core::mem::size_of::<RawDependency<LittleEndian>>() == DEPENDENCY_SIZE);

/// Minimum version of another image this image requires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub image_id: u8,
    pub version: ImageVersion,
}

impl Dependency {
    /// Pair image ids with their versions. Both lists must have the same length.
    pub fn zip(image_ids: &[u8], versions: &[ImageVersion]) -> Result<Vec<Self>, ImageError> {
        if image_ids.len() != versions.len() {
            return Err(ImageError::DependencyCountMismatch {
                images: image_ids.len(),
                versions: versions.len(),
            });
        }
        Ok(image_ids
            .iter()
            .zip(versions)
            .map(|(&image_id, &version)| Self { image_id, version })
            .collect())
    }

    /// Parse a list such as `(0,1.2.3+0),(1,2.0)`
    pub fn parse_list(s: &str) -> Result<Vec<Self>, ImageError> {
        let invalid = || ImageError::InvalidDependency(s.to_string());

        let mut image_ids = Vec::new();
        let mut versions = Vec::new();
        let mut rest = s.trim();
        while !rest.is_empty() {
            let group = rest.strip_prefix('(').ok_or_else(invalid)?;
            let (inner, tail) = group.split_once(')').ok_or_else(invalid)?;
            let (id, version) = inner.split_once(',').ok_or_else(invalid)?;
            image_ids.push(number::<u8>(id.trim()).ok_or_else(invalid)?);
            versions.push(version.trim().parse::<ImageVersion>()?);

            rest = tail.trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }
        if image_ids.is_empty() {
            return Err(invalid());
        }
        Self::zip(&image_ids, &versions)
    }

    /// Value of the dependency TLV
    pub fn encode(&self, endian: Endian) -> [u8; DEPENDENCY_SIZE] {
        match endian {
            Endian::Little => self.encode_as::<LittleEndian>(),
            Endian::Big => self.encode_as::<BigEndian>(),
        }
    }

    fn encode_as<O: ByteOrder>(&self) -> [u8; DEPENDENCY_SIZE] {
        let raw = RawDependency::<O> {
            image_id: self.image_id,
            pad: [0; 3],
            ver_major: self.version.major,
            ver_minor: self.version.minor,
            ver_revision: U16::new(self.version.revision),
            ver_build: U32::new(self.version.build),
        };
        let mut out = [0u8; DEPENDENCY_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }
}
