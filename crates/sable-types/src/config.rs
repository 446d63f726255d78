//! Bootstrap configuration for a Sable host instance.
//!
//! [`BotConfig`] is loaded once from `config.json` at startup and never
//! mutated at runtime. It carries the gateway credentials, the command
//! prefix, the optional response-deletion delay, and the module/data
//! directories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::SableError;

/// Maximum config file size in bytes. Larger files are rejected rather than
/// parsed, matching the size guard on every other file the host reads.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024; // 1 MB

/// Top-level configuration for a Sable host instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Gateway credential handed to the chat-platform connector.
    pub token: String,
    /// Prefix that marks a message as a command invocation (e.g. `!`).
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    /// If set, the triggering message and the response are deleted this many
    /// seconds after the response is sent.
    #[serde(default)]
    pub delete_after_seconds: Option<u64>,
    /// User granted `permissions.*` at bootstrap, so a fresh install with an
    /// empty (default-deny) store has someone who can administer grants.
    #[serde(default)]
    pub admin_user: Option<String>,
    /// Directory scanned for module packages (each containing `module.json`).
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,
    /// Directory where permission entities are persisted.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_prefix() -> String {
    "!".into()
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            command_prefix: default_prefix(),
            delete_after_seconds: None,
            admin_user: None,
            modules_dir: default_modules_dir(),
            data_dir: default_data_dir(),
        }
    }
}

/// Load a [`BotConfig`] from a JSON file.
///
/// The file must exist, stay under the size guard, and contain at least the
/// `token` field; every other field has a default.
pub fn load_config(path: &Path) -> Result<BotConfig, SableError> {
    let meta = std::fs::metadata(path)
        .map_err(|e| SableError::Config(format!("cannot read {}: {e}", path.display())))?;
    if meta.len() > MAX_CONFIG_FILE_SIZE {
        return Err(SableError::Config(format!(
            "config file {} exceeds {MAX_CONFIG_FILE_SIZE} bytes",
            path.display()
        )));
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| SableError::Config(format!("cannot read {}: {e}", path.display())))?;
    let config: BotConfig = serde_json::from_str(&raw)
        .map_err(|e| SableError::Config(format!("malformed {}: {e}", path.display())))?;

    if config.command_prefix.is_empty() {
        return Err(SableError::Config("command_prefix must not be empty".into()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_minimal_config_applies_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"token": "abc123"}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.token, "abc123");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.delete_after_seconds, None);
        assert_eq!(config.modules_dir, PathBuf::from("modules"));
    }

    #[test]
    fn load_full_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "token": "t",
                "command_prefix": "?",
                "delete_after_seconds": 15,
                "admin_user": "1234",
                "modules_dir": "/opt/sable/modules",
                "data_dir": "/var/lib/sable"
            }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.delete_after_seconds, Some(15));
        assert_eq!(config.admin_user.as_deref(), Some("1234"));
        assert_eq!(config.modules_dir, PathBuf::from("/opt/sable/modules"));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/sable"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_config(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, SableError::Config(_)));
    }

    #[test]
    fn malformed_json_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "not json {{{").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, SableError::Config(_)));
    }

    #[test]
    fn empty_prefix_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"token": "t", "command_prefix": ""}"#).unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(
            err.to_string().contains("command_prefix"),
            "expected prefix error, got: {err}"
        );
    }
}
