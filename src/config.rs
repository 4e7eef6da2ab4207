//! Runtime configuration
//!
//! The warden takes its three required values (token, guild, ban-list
//! directory) from the environment, with an optional YAML file underneath
//! for deployments that prefer files. Everything is validated before the
//! gateway connection is attempted; a bad configuration never starts
//! enforcement.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serenity::all::GuildId;

use crate::error::{WardenError, WardenResult};

/// Default location of the optional YAML config file.
pub const DEFAULT_CONFIG_FILE: &str = "config/warden.yaml";

/// Validated startup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Directory holding the plain-text ban lists.
    #[serde(default)]
    pub banlist_dir: PathBuf,
    /// The one guild this warden enforces.
    #[serde(default)]
    pub guild_id: u64,
    /// Bot token. Usually supplied via `DISCORD_TOKEN` rather than the file.
    #[serde(default)]
    pub token: String,
}

impl WardenConfig {
    /// Load configuration: optional YAML file first, then environment
    /// overrides (`BANLIST_DIR`, `GUILD_ID`, `DISCORD_TOKEN`), then
    /// validation. The file path can be moved with `WARDEN_CONFIG`.
    ///
    /// # Errors
    /// Returns a configuration error if the file is unreadable or malformed,
    /// an override does not parse, or a required value is missing.
    pub fn load() -> WardenResult<Self> {
        let path = env::var("WARDEN_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        let mut config = Self::from_file(&path)?.unwrap_or_default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read the YAML file if it exists.
    fn from_file(path: &Path) -> WardenResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|err| WardenError::ConfigFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let config = serde_yaml::from_str(&text).map_err(|err| WardenError::ConfigFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Some(config))
    }

    /// Environment variables override file values.
    fn apply_env(&mut self) -> WardenResult<()> {
        if let Ok(dir) = env::var("BANLIST_DIR") {
            self.banlist_dir = PathBuf::from(dir);
        }
        if let Ok(guild_id) = env::var("GUILD_ID") {
            self.guild_id = guild_id.trim().parse().map_err(|_| {
                WardenError::InvalidConfig {
                    name: "GUILD_ID",
                    message: format!("not a guild id: {guild_id}"),
                }
            })?;
        }
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            self.token = token;
        }
        Ok(())
    }

    /// Reject startup on missing or unusable values.
    ///
    /// # Errors
    /// Returns `MissingConfig` or `InvalidConfig` naming the offending value.
    pub fn validate(&self) -> WardenResult<()> {
        if self.token.trim().is_empty() {
            return Err(WardenError::MissingConfig("DISCORD_TOKEN"));
        }
        if self.guild_id == 0 {
            return Err(WardenError::MissingConfig("GUILD_ID"));
        }
        if self.banlist_dir.as_os_str().is_empty() {
            return Err(WardenError::MissingConfig("BANLIST_DIR"));
        }
        if !self.banlist_dir.is_dir() {
            return Err(WardenError::InvalidConfig {
                name: "BANLIST_DIR",
                message: format!(
                    "{} is not a readable directory",
                    self.banlist_dir.display()
                ),
            });
        }
        Ok(())
    }

    /// The configured guild as a typed id.
    #[must_use]
    pub fn guild(&self) -> GuildId {
        GuildId::new(self.guild_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn valid_config(dir: &Path) -> WardenConfig {
        WardenConfig {
            banlist_dir: dir.to_path_buf(),
            guild_id: 67890,
            token: "token-abc".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let dir = tempdir().expect("tempdir");
        assert!(valid_config(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_values() {
        let dir = tempdir().expect("tempdir");

        let mut config = valid_config(dir.path());
        config.token = "   ".to_string();
        assert!(matches!(
            config.validate(),
            Err(WardenError::MissingConfig("DISCORD_TOKEN"))
        ));

        let mut config = valid_config(dir.path());
        config.guild_id = 0;
        assert!(matches!(
            config.validate(),
            Err(WardenError::MissingConfig("GUILD_ID"))
        ));

        let mut config = valid_config(dir.path());
        config.banlist_dir = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(WardenError::MissingConfig("BANLIST_DIR"))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_directory() {
        let dir = tempdir().expect("tempdir");
        let mut config = valid_config(dir.path());
        config.banlist_dir = dir.path().join("gone");
        assert!(matches!(
            config.validate(),
            Err(WardenError::InvalidConfig { name: "BANLIST_DIR", .. })
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = WardenConfig {
            banlist_dir: PathBuf::from("/var/banlists"),
            guild_id: 67890,
            token: String::new(),
        };

        let yaml = serde_yaml::to_string(&config).expect("serialize");
        assert!(yaml.contains("guild_id: 67890"));

        let parsed: WardenConfig = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(parsed.guild_id, 67890);
        assert_eq!(parsed.banlist_dir, PathBuf::from("/var/banlists"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: WardenConfig =
            serde_yaml::from_str("banlist_dir: /var/banlists\n").expect("deserialize");
        assert_eq!(parsed.guild_id, 0);
        assert!(parsed.token.is_empty());
    }
}
