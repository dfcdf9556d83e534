/*++

Licensed under the Apache-2.0 license.

File Name:

   keyhash.rs

Abstract:

    File contains implementation of the key hash command.

--*/

use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;
use imgtool_crypto::verifying_key_from_pem;
use sha2::{Digest, Sha256};

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let key_path: &PathBuf = args
        .get_one::<PathBuf>("KEY")
        .with_context(|| "KEY arg not specified")?;

    let key = verifying_key_from_pem(key_path)?;
    let digest = Sha256::digest(key.public_bytes()?);
    println!("{}", hex::encode(digest));

    Ok(())
}
