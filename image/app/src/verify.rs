/*++

Licensed under the Apache-2.0 license.

File Name:

   verify.rs

Abstract:

    File contains implementation of the image verification command.

--*/

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::ArgMatches;
use imgtool_crypto::verifying_key_from_pem;
use imgtool_types::Endian;
use imgtool_verify::{ImageVerifier, ImageVerifyingKey, VerifyResult};

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let image_path: &PathBuf = args
        .get_one::<PathBuf>("IMAGE")
        .with_context(|| "IMAGE arg not specified")?;

    let endian: Endian = args
        .get_one::<String>("endian")
        .with_context(|| "endian arg not specified")?
        .parse()?;

    let key = match args.get_one::<PathBuf>("key") {
        Some(path) => Some(verifying_key_from_pem(path)?),
        None => None,
    };

    let image = std::fs::read(image_path)
        .with_context(|| format!("Failed to read file {}", image_path.display()))?;

    let verifier = ImageVerifier::new(key.as_ref().map(|key| key as &dyn ImageVerifyingKey))
        .with_endian(endian);
    match verifier.verify(&image) {
        (VerifyResult::Ok, Some(version)) => {
            println!("Image was correctly validated");
            println!("Image version: {version}");
            Ok(())
        }
        (VerifyResult::Ok, None) => {
            println!("Image was correctly validated");
            Ok(())
        }
        (VerifyResult::InvalidMagic, _) => bail!("Invalid image magic; is this an MCUboot image?"),
        (VerifyResult::InvalidTlvInfoMagic, _) => {
            bail!("Invalid TLV info magic; is this an MCUboot image?")
        }
        (VerifyResult::InvalidHash, _) => bail!("Image has an invalid sha256 digest"),
        (VerifyResult::InvalidSignature, _) => {
            bail!("No signature found for the given key")
        }
    }
}
