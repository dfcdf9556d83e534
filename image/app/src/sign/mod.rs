/*++

Licensed under the Apache-2.0 license.

File Name:

   mod.rs

Abstract:

    File contains implementation of the image signing command.

--*/

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::ArgMatches;
use imgtool_crypto::{encryption_key_from_pem, signing_key_from_pem, EncryptionKey, SigningKey};
use imgtool_gen::*;
use imgtool_types::*;
use log::info;

/// Keys named by the key configuration file
#[derive(Default)]
struct Keys {
    signing: Option<SigningKey>,
    encryption: Option<EncryptionKey>,
}

fn load_keys(config_path: Option<&PathBuf>) -> anyhow::Result<Keys> {
    let Some(config_path) = config_path else {
        return Ok(Keys::default());
    };
    let config = config::load_key_config(config_path)?;
    let config_dir = config_path
        .parent()
        .with_context(|| "Invalid parent path")?;

    let signing = match config.signing_key_path(config_dir) {
        Some(path) => Some(signing_key_from_pem(&path)?),
        None => None,
    };
    let encryption = match config.encryption_key_path(config_dir) {
        Some(path) => Some(encryption_key_from_pem(&path)?),
        None => None,
    };
    Ok(Keys {
        signing,
        encryption,
    })
}

fn parse_security_counter(value: Option<&String>) -> anyhow::Result<Option<SecurityCounter>> {
    match value.map(|s| s.trim()) {
        None => Ok(None),
        Some("auto") => Ok(Some(SecurityCounter::Auto)),
        Some(s) => crate::parse_u32(s)
            .map(|value| Some(SecurityCounter::Value(value)))
            .map_err(anyhow::Error::msg)
            .context("Invalid security counter"),
    }
}

/// Build the generator configuration from the command line
fn generator_config(args: &ArgMatches) -> anyhow::Result<ImageGeneratorConfig> {
    let version: &String = args
        .get_one::<String>("version")
        .with_context(|| "version arg not specified")?;

    let header_size: u32 = *args
        .get_one::<u32>("header-size")
        .with_context(|| "header-size arg not specified")?;

    let erased_val: u32 = *args
        .get_one::<u32>("erased-val")
        .with_context(|| "erased-val arg not specified")?;

    let endian: &String = args
        .get_one::<String>("endian")
        .with_context(|| "endian arg not specified")?;

    let kind = if let Some(address) = args.get_one::<u32>("otfdec") {
        ImageKind::Otfdec { address: *address }
    } else if args.get_flag("primary-only") {
        ImageKind::PrimaryOnly
    } else {
        ImageKind::Standard
    };

    let dependencies = match args.get_one::<String>("dependencies") {
        Some(deps) => Dependency::parse_list(deps)?,
        None => Vec::new(),
    };

    let erased_val = match erased_val {
        0 => 0,
        0xff => 0xff,
        other => bail!("Invalid erased value {other:#x}, must be 0 or 0xff"),
    };

    Ok(ImageGeneratorConfig {
        version: version.parse()?,
        header_size: u16::try_from(header_size)
            .with_context(|| format!("Header size {header_size} is too large"))?,
        pad_header: args.get_flag("pad-header"),
        align: *args
            .get_one::<u32>("align")
            .with_context(|| "align arg not specified")?,
        slot_size: *args
            .get_one::<u32>("slot-size")
            .with_context(|| "slot-size arg not specified")? as usize,
        max_sectors: *args
            .get_one::<u32>("max-sectors")
            .with_context(|| "max-sectors arg not specified")?,
        overwrite_only: args.get_flag("overwrite-only"),
        endian: endian.parse()?,
        load_addr: *args
            .get_one::<u32>("load-addr")
            .with_context(|| "load-addr arg not specified")?,
        erased_val,
        security_counter: parse_security_counter(args.get_one::<String>("security-counter"))?,
        kind,
        pic: args.get_flag("pic"),
        non_bootable: args.get_flag("non-bootable"),
        save_enctlv: args.get_flag("save-enctlv"),
        confirm: args.get_flag("confirm"),
        pad: args.get_flag("pad"),
        clear: args.get_flag("clear"),
        sw_type: args.get_one::<String>("boot-record").cloned(),
        dependencies,
    })
}

fn write_image(path: &Path, image: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, image)
        .with_context(|| format!("Failed to write file {}", path.display()))
}

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let in_path: &PathBuf = args
        .get_one::<PathBuf>("INFILE")
        .with_context(|| "INFILE arg not specified")?;

    let out_path: &PathBuf = args
        .get_one::<PathBuf>("OUTFILE")
        .with_context(|| "OUTFILE arg not specified")?;

    let gen_config = generator_config(args)?;
    let keys = load_keys(args.get_one::<PathBuf>("key-config"))?;

    if gen_config.kind.is_otfdec() && keys.encryption.is_none() {
        info!("No encryption key configured, the OTFDEC image is signed but not encrypted");
    }

    let input = std::fs::read(in_path)
        .with_context(|| format!("Failed to read file {}", in_path.display()))?;

    let gen = ImageGenerator::new(gen_config);
    let image = gen.generate(
        &input,
        keys.signing.as_ref().map(|key| key as &dyn ImageSigningKey),
        keys.encryption.as_ref().map(|key| key as &dyn ImageKeyWrapper),
    )?;

    write_image(out_path, image.as_bytes())?;
    info!(
        "Wrote {} bytes to {}",
        image.as_bytes().len(),
        out_path.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;

    fn sign_args(extra: &[&str]) -> ArgMatches {
        let mut argv = vec!["imgtool", "sign", "--version", "1.2.3+4"];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&["in.bin", "out.bin"]);
        let matches = cli().try_get_matches_from(argv).unwrap();
        matches.subcommand_matches("sign").unwrap().clone()
    }

    #[test]
    fn test_default_config() {
        let config = generator_config(&sign_args(&[])).unwrap();
        assert_eq!(config.version, ImageVersion::new(1, 2, 3, 4));
        assert_eq!(config.header_size, 32);
        assert_eq!(config.align, 1);
        assert_eq!(config.slot_size, 0);
        assert_eq!(config.max_sectors, 128);
        assert_eq!(config.erased_val, 0xff);
        assert_eq!(config.endian, Endian::Little);
        assert_eq!(config.kind, ImageKind::Standard);
        assert!(config.security_counter.is_none());
        assert!(config.sw_type.is_none());
        assert!(config.dependencies.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = generator_config(&sign_args(&[
            "--header-size",
            "0x400",
            "--pad-header",
            "--align",
            "8",
            "--slot-size",
            "0x20000",
            "--endian",
            "big",
            "--erased-val",
            "0",
            "--security-counter",
            "auto",
            "--otfdec",
            "0x90000000",
            "--boot-record",
            "NSPE",
            "--dependencies",
            "(1, 0.5.0)",
            "--pad",
            "--confirm",
        ]))
        .unwrap();
        assert_eq!(config.header_size, 0x400);
        assert!(config.pad_header);
        assert_eq!(config.align, 8);
        assert_eq!(config.slot_size, 0x20000);
        assert_eq!(config.endian, Endian::Big);
        assert_eq!(config.erased_val, 0);
        assert_eq!(config.security_counter(), Some(0x0102_0003));
        assert_eq!(
            config.kind,
            ImageKind::Otfdec {
                address: 0x9000_0000
            }
        );
        assert_eq!(config.sw_type.as_deref(), Some("NSPE"));
        assert_eq!(config.dependencies.len(), 1);
        assert!(config.pad && config.confirm);
    }

    #[test]
    fn test_security_counter_value() {
        assert!(matches!(
            parse_security_counter(Some(&"0x10".to_string())).unwrap(),
            Some(SecurityCounter::Value(16))
        ));
        assert!(parse_security_counter(Some(&"high".to_string())).is_err());
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(generator_config(&sign_args(&["--erased-val", "0x55"])).is_err());
        assert!(generator_config(&sign_args(&["--header-size", "0x10000"])).is_err());
        assert!(generator_config(&sign_args(&["--dependencies", "(1)"])).is_err());

        let matches = cli()
            .try_get_matches_from(["imgtool", "sign", "--version", "1.02", "in", "out"])
            .unwrap();
        assert!(generator_config(matches.subcommand_matches("sign").unwrap()).is_err());
    }

    #[test]
    fn test_no_key_config() {
        let keys = load_keys(None).unwrap();
        assert!(keys.signing.is_none());
        assert!(keys.encryption.is_none());
    }
}
