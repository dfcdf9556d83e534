/*++

Licensed under the Apache-2.0 license.

File Name:

   config.rs

Abstract:

    File contains utilities for parsing the key configuration file

--*/

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Key Configuration
///
/// Key paths are relative to the directory holding the configuration file.
#[derive(Default, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct KeyConfig {
    /// Private key signing the image
    pub signing_key: Option<String>,

    /// Public (or private) key of the party decrypting the image
    pub encryption_key: Option<String>,
}

impl KeyConfig {
    pub(crate) fn signing_key_path(&self, config_dir: &Path) -> Option<PathBuf> {
        self.signing_key.as_ref().map(|file| config_dir.join(file))
    }

    pub(crate) fn encryption_key_path(&self, config_dir: &Path) -> Option<PathBuf> {
        self.encryption_key.as_ref().map(|file| config_dir.join(file))
    }
}

/// Load Key Configuration from file
pub(crate) fn load_key_config(path: &Path) -> anyhow::Result<KeyConfig> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read the config file {}", path.display()))?;

    let config: KeyConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_key_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.toml");
        std::fs::write(
            &path,
            "signing_key = \"sign.pem\"\nencryption_key = \"/etc/keys/enc.pem\"\n",
        )
        .unwrap();

        let config = load_key_config(&path).unwrap();
        assert_eq!(
            config.signing_key_path(dir.path()),
            Some(dir.path().join("sign.pem"))
        );
        // Absolute paths are kept as is
        assert_eq!(
            config.encryption_key_path(dir.path()),
            Some(PathBuf::from("/etc/keys/enc.pem"))
        );
    }

    #[test]
    fn test_empty_key_config() {
        let config: KeyConfig = toml::from_str("").unwrap();
        assert!(config.signing_key_path(Path::new("/tmp")).is_none());
        assert!(config.encryption_key_path(Path::new("/tmp")).is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<KeyConfig>("signing-key = \"a.pem\"").is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_key_config(Path::new("/nonexistent/keys.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/keys.toml"));
    }
}
