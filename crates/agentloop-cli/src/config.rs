//! User configuration for the agentloop CLI
//!
//! Configuration file: ~/.config/agentloop/config.toml (or platform equivalent)

use agentloop_core::RunConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User configuration for the agentloop CLI
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Checkpoint storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Run controller limits
    #[serde(default)]
    pub run: RunSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Directory holding one checkpoint file per conversation
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Maximum decision steps per invocation
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Tool output longer than this many bytes is truncated
    #[serde(default = "default_max_output_len")]
    pub max_output_len: usize,

    /// Identical failing tool calls tolerated in a row (0 = never abort)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,
}

fn default_max_steps() -> usize {
    RunConfig::default().max_steps
}

fn default_max_output_len() -> usize {
    RunConfig::default().max_output_len
}

fn default_max_consecutive_failures() -> usize {
    RunConfig::default().max_consecutive_failures
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_output_len: default_max_output_len(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl RunSettings {
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig::new()
            .with_max_steps(self.max_steps)
            .with_max_output_len(self.max_output_len)
            .with_max_consecutive_failures(self.max_consecutive_failures)
    }
}

const DEFAULT_CONFIG: &str = r#"# agentloop CLI configuration
# Location: ~/.config/agentloop/config.toml

[store]
# Where conversation checkpoints are kept (one JSON file per conversation).
# Defaults to <data dir>/agentloop/conversations
# dir = "/var/lib/agentloop/conversations"

[run]
# Maximum decision steps per invocation
max_steps = 25

# Tool output longer than this many bytes is truncated before it is logged
max_output_len = 50000

# Abort after the same tool call fails this many times in a row (0 = never)
max_consecutive_failures = 3
"#;

impl UserConfig {
    /// Load user configuration from default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("agentloop").join("config.toml"))
    }

    /// Checkpoint directory: `override_dir`, then `[store] dir`, then the
    /// platform data directory
    pub fn store_dir(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir.or(self.store.dir.as_deref()) {
            return Ok(dir.to_path_buf());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("agentloop").join("conversations"))
    }

    /// Create a default configuration file with comments
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::create_default_at(&path)?;
        Ok(path)
    }

    pub fn create_default_at(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = UserConfig::default();
        assert!(config.store.dir.is_none());
        assert_eq!(config.run.max_steps, 25);
        assert_eq!(config.run.max_consecutive_failures, 3);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[store]
dir = "/tmp/agentloop-test"

[run]
max_steps = 5
"#;

        let config: UserConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.store.dir, Some(PathBuf::from("/tmp/agentloop-test")));
        assert_eq!(config.run.max_steps, 5);
        // Unset fields keep their defaults
        assert_eq!(config.run.max_output_len, 50_000);

        let run = config.run.to_run_config();
        assert_eq!(run.max_steps, 5);
        assert_eq!(run.max_consecutive_failures, 3);
    }

    #[test]
    fn test_store_dir_precedence() {
        let mut config = UserConfig::default();
        config.store.dir = Some(PathBuf::from("/from/config"));

        assert_eq!(
            config.store_dir(Some(Path::new("/from/flag"))).unwrap(),
            PathBuf::from("/from/flag")
        );
        assert_eq!(config.store_dir(None).unwrap(), PathBuf::from("/from/config"));
    }

    #[test]
    fn test_default_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agentloop").join("config.toml");

        UserConfig::create_default_at(&path).unwrap();
        let loaded = UserConfig::load_from(&path).unwrap();
        assert_eq!(loaded.run.max_steps, UserConfig::default().run.max_steps);
        assert!(loaded.store.dir.is_none());

        assert!(UserConfig::create_default_at(&path).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = UserConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.run.max_steps, 25);
    }
}
