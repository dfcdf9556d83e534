/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point of the firmware image signing tool

--*/
use std::path::PathBuf;

use clap::{arg, value_parser, ArgAction, Command};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod keyhash;
mod sign;
mod verify;

/// Parse a decimal or `0x` prefixed hexadecimal number
pub(crate) fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|err| format!("'{s}' is not a valid number: {err}"))
}

fn endian_arg() -> clap::Arg {
    arg!(--"endian" <ENDIAN> "Byte order of the image fields")
        .required(false)
        .value_parser(["little", "big"])
        .default_value("little")
}

/// Command line definition
pub(crate) fn cli() -> Command {
    let sub_cmds = vec![
        Command::new("sign")
            .about("Create a signed and optionally encrypted firmware image")
            .arg(
                arg!(--"key-config" <FILE> "Key configuration file")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"version" <VERSION> "Image version, maj.min.rev+build")
                    .required(true)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"header-size" <U32> "Size of the header region")
                    .required(false)
                    .value_parser(parse_u32)
                    .default_value("32"),
            )
            .arg(
                arg!(--"pad-header" "Prepend an erased header region to the input")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--"align" <U32> "Flash write alignment")
                    .required(false)
                    .value_parser(parse_u32)
                    .default_value("1"),
            )
            .arg(
                arg!(--"slot-size" <U32> "Size of the flash slot")
                    .required(false)
                    .value_parser(parse_u32)
                    .default_value("0"),
            )
            .arg(
                arg!(--"max-sectors" <U32> "Maximum number of sectors in a slot")
                    .required(false)
                    .value_parser(parse_u32)
                    .default_value("128"),
            )
            .arg(
                arg!(--"overwrite-only" "Bootloader runs in overwrite-only mode")
                    .action(ArgAction::SetTrue),
            )
            .arg(endian_arg())
            .arg(
                arg!(--"load-addr" <U32> "Load address for RAM-loaded images")
                    .required(false)
                    .value_parser(parse_u32)
                    .default_value("0"),
            )
            .arg(
                arg!(--"erased-val" <U32> "Value of erased flash, 0 or 0xff")
                    .required(false)
                    .value_parser(parse_u32)
                    .default_value("0xff"),
            )
            .arg(
                arg!(--"security-counter" <COUNTER> "Security counter value, or 'auto' to derive it from the version")
                    .required(false)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"primary-only" "Image can only run from the primary slot")
                    .action(ArgAction::SetTrue)
                    .conflicts_with("otfdec"),
            )
            .arg(
                arg!(--"otfdec" <ADDRESS> "Encrypt for on-the-fly decryption at this address")
                    .required(false)
                    .value_parser(parse_u32),
            )
            .arg(
                arg!(--"pic" "Image is position independent")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--"non-bootable" "Image is not bootable")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--"save-enctlv" "Keep the whole key-wrap TLV in the trailer")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--"confirm" "Mark the image as confirmed in the trailer")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--"pad" "Pad the image to the slot size and write the trailer")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--"boot-record" <SW_TYPE> "Add a boot record for this software type")
                    .required(false)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"dependencies" <DEPS> "Image dependencies, \"(id,maj.min.rev+build), ...\"")
                    .required(false)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"clear" "Keep the body in plaintext while emitting the encryption metadata")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(<INFILE> "Input binary")
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(<OUTFILE> "Output image")
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("verify")
            .about("Check the hash and signature of a firmware image")
            .arg(
                arg!(--"key" <FILE> "Public or private key PEM checking the signature")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(endian_arg())
            .arg(
                arg!(<IMAGE> "Image to verify")
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("keyhash")
            .about("Print the SHA-256 of the encoded public key, as found in the KEYHASH TLV")
            .arg(
                arg!(<KEY> "Public or private key PEM")
                    .value_parser(value_parser!(PathBuf)),
            ),
    ];

    Command::new("imgtool")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommands(sub_cmds)
        .arg(
            arg!(-v --"verbose" ... "Increase logging verbosity")
                .global(true),
        )
        .about("Firmware image signing tools")
}

/// Entry point
fn main() {
    let cmd = cli().get_matches();

    let level = match cmd.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = SimpleLogger::new().with_level(level).env().init();

    let result = match cmd.subcommand() {
        Some(("sign", args)) => sign::run_cmd(args),
        Some(("verify", args)) => verify::run_cmd(args),
        Some(("keyhash", args)) => keyhash::run_cmd(args),
        _ => unreachable!(),
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_parse_u32() {
        assert_eq!(parse_u32("4096"), Ok(4096));
        assert_eq!(parse_u32("0x1000"), Ok(4096));
        assert_eq!(parse_u32("0XfF"), Ok(255));
        assert!(parse_u32("0x").is_err());
        assert!(parse_u32("-1").is_err());
        assert!(parse_u32("ten").is_err());
    }

    #[test]
    fn test_primary_only_conflicts_with_otfdec() {
        let result = cli().try_get_matches_from([
            "imgtool",
            "sign",
            "--version",
            "1.0",
            "--primary-only",
            "--otfdec",
            "0x90000000",
            "in.bin",
            "out.bin",
        ]);
        assert!(result.is_err());
    }
}
