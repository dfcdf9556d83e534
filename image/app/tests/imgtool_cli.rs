// Licensed under the Apache-2.0 license

use std::path::Path;
use std::process::{Command, Output};

use imgtool_fake_keys::*;
use imgtool_types::*;
use imgtool_verify::{verify, VerifyResult};

fn imgtool(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_imgtool"))
        .args(args)
        .output()
        .unwrap()
}

fn write(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

fn out_path(dir: &Path, name: &str) -> String {
    dir.join(name).to_str().unwrap().to_string()
}

#[test]
fn test_sign_unsigned_and_verify() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "app.bin", vec![0u8; 1024]);
    let output = out_path(dir.path(), "app.signed.bin");

    let result = imgtool(&["sign", "--version", "1.2.3", "--pad-header", &input, &output]);
    assert!(result.status.success(), "{result:?}");

    let image = std::fs::read(&output).unwrap();
    assert_eq!(image.len(), 1096);
    assert_eq!(
        verify(&image, None),
        (VerifyResult::Ok, Some(ImageVersion::new(1, 2, 3, 0)))
    );

    let result = imgtool(&["verify", &output]);
    assert!(result.status.success(), "{result:?}");
    let stdout = String::from_utf8(result.stdout).unwrap();
    assert!(stdout.contains("Image version: 1.2.3+0"));
}

#[test]
fn test_sign_with_key_config() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sign.pem", EC256_SIGN_PRIVATE);
    write(dir.path(), "enc.pem", RSA2048_ENC_PUBLIC);
    let verify_key = write(dir.path(), "pub_sign.pem", EC256_SIGN_PUBLIC);
    let config = write(
        dir.path(),
        "keys.toml",
        "signing_key = \"sign.pem\"\nencryption_key = \"enc.pem\"\n",
    );
    let input = write(dir.path(), "app.bin", vec![0x5au8; 4000]);
    let output = out_path(dir.path(), "app.signed.bin");

    let result = imgtool(&[
        "sign",
        "--key-config",
        &config,
        "--version",
        "2.0.1+7",
        "--pad-header",
        "--security-counter",
        "auto",
        "--boot-record",
        "SPE",
        "--align",
        "8",
        "--slot-size",
        "0x2000",
        "--pad",
        &input,
        &output,
    ]);
    assert!(result.status.success(), "{result:?}");

    let image = std::fs::read(&output).unwrap();
    assert_eq!(image.len(), 0x2000);
    let header = ImageHeader::decode(&image, Endian::Little).unwrap();
    assert_eq!(header.flags, ImageFlags::ENCRYPTED);
    assert!(header.protect_tlv_size > 0);

    let result = imgtool(&["verify", "--key", &verify_key, &output]);
    assert!(result.status.success(), "{result:?}");
}

#[test]
fn test_verify_rejects_tampered_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "app.bin", vec![1u8; 256]);
    let output = out_path(dir.path(), "app.signed.bin");
    let result = imgtool(&["sign", "--version", "1.0", "--pad-header", &input, &output]);
    assert!(result.status.success(), "{result:?}");

    let mut image = std::fs::read(&output).unwrap();
    image[100] ^= 0xff;
    let tampered = write(dir.path(), "tampered.bin", &image);
    let result = imgtool(&["verify", &tampered]);
    assert!(!result.status.success());
    let stderr = String::from_utf8(result.stderr).unwrap();
    assert!(stderr.contains("invalid sha256 digest"), "{stderr}");
}

#[test]
fn test_verify_wrong_key() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sign.pem", ED25519_PRIVATE);
    let config = write(dir.path(), "keys.toml", "signing_key = \"sign.pem\"\n");
    let other_key = write(dir.path(), "other.pem", RSA2048_SIGN_PUBLIC);
    let input = write(dir.path(), "app.bin", vec![2u8; 300]);
    let output = out_path(dir.path(), "app.signed.bin");

    let result = imgtool(&[
        "sign",
        "--key-config",
        &config,
        "--version",
        "0.1",
        "--pad-header",
        &input,
        &output,
    ]);
    assert!(result.status.success(), "{result:?}");

    let result = imgtool(&["verify", "--key", &other_key, &output]);
    assert!(!result.status.success());
}

#[test]
fn test_sign_errors() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "app.bin", vec![0u8; 256]);
    let output = out_path(dir.path(), "app.signed.bin");

    // Header region is not erased
    let busy = write(dir.path(), "busy.bin", vec![0x11u8; 256]);
    let result = imgtool(&["sign", "--version", "1.0", &busy, &output]);
    assert!(!result.status.success());

    let result = imgtool(&[
        "sign", "--version", "1.0", "--pad-header", "--align", "3", &input, &output,
    ]);
    assert!(!result.status.success());

    let result = imgtool(&[
        "sign",
        "--version",
        "1.0",
        "--pad-header",
        "--slot-size",
        "0x100",
        &input,
        &output,
    ]);
    assert!(!result.status.success());

    let result = imgtool(&["sign", "--version", "1.0", "--pad-header", "--pad", &input, &output]);
    assert!(!result.status.success());
    let stderr = String::from_utf8(result.stderr).unwrap();
    assert!(stderr.contains("without a slot size"), "{stderr}");

    let missing = out_path(dir.path(), "missing.bin");
    let result = imgtool(&["sign", "--version", "1.0", &missing, &output]);
    assert!(!result.status.success());
    let stderr = String::from_utf8(result.stderr).unwrap();
    assert!(stderr.contains("missing.bin"), "{stderr}");
}

#[test]
fn test_keyhash() {
    let dir = tempfile::tempdir().unwrap();
    let private = write(dir.path(), "sign.pem", EC256_SIGN_PRIVATE);
    let public = write(dir.path(), "pub_sign.pem", EC256_SIGN_PUBLIC);

    let from_private = imgtool(&["keyhash", &private]);
    let from_public = imgtool(&["keyhash", &public]);
    assert!(from_private.status.success());
    assert_eq!(from_private.stdout, from_public.stdout);
    assert_eq!(String::from_utf8(from_private.stdout).unwrap().trim().len(), 64);
}
