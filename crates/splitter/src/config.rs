//! Splitter configuration
//!
//! Loaded from TOML, optionally overridden from the environment:
//!
//! ```toml
//! genesis_epoch = 1
//!
//! [roles]
//! governance = "0x6060606060606060606060606060606060606060"
//! vault = "0x7070707070707070707070707070707070707070"
//!
//! [genesis_policy]
//! recipients = ["0x01…", "0x02…", "0x03…"]
//! weights_bps = [5000, 3000, 2000]
//!
//! [storage]
//! backend = "sled"
//! path = "./data/trisplit"
//! flush_every_ms = 500
//!
//! [logging]
//! level = "info"
//! ```

use crate::auth::StaticAuthority;
use crate::errors::Result;
use crate::splitter::DonationSplitter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use trisplit_storage::{
    MemoryStore, SledStore, SplitterStore, StorageError, DEFAULT_FLUSH_EVERY_MS,
};
use trisplit_types::{
    Address, AssetInfo, Bps, Epoch, EpochPolicy, PolicyError, MAX_DECIMALS, RECIPIENT_COUNT,
};

/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "TRISPLIT_LOG_LEVEL";
/// Environment variable overriding `storage.path`
pub const ENV_STORAGE_PATH: &str = "TRISPLIT_STORAGE_PATH";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid genesis policy: {0}")]
    GenesisPolicy(#[from] PolicyError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to open store: {0}")]
    Storage(#[from] StorageError),
}

/// Top-level splitter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Epoch a fresh store starts at
    #[serde(default = "default_genesis_epoch")]
    pub genesis_epoch: Epoch,
    pub roles: RolesConfig,
    /// Policy installed at the genesis epoch of a fresh store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_policy: Option<GenesisPolicyConfig>,
    #[serde(default)]
    pub asset: AssetInfo,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Role holders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
    pub governance: Address,
    pub vault: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisPolicyConfig {
    pub recipients: [Address; RECIPIENT_COUNT],
    pub weights_bps: [Bps; RECIPIENT_COUNT],
}

impl GenesisPolicyConfig {
    pub fn to_policy(&self) -> std::result::Result<EpochPolicy, PolicyError> {
        EpochPolicy::new(self.recipients, self.weights_bps)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database directory, required for the sled backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Sled background flush interval; 0 disables the flusher thread
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            flush_every_ms: default_flush_every_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_genesis_epoch() -> Epoch {
    1
}

fn default_flush_every_ms() -> u64 {
    DEFAULT_FLUSH_EVERY_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SplitterConfig {
    /// Minimal in-memory configuration with the given role holders.
    pub fn new(governance: Address, vault: Address) -> Self {
        Self {
            genesis_epoch: default_genesis_epoch(),
            roles: RolesConfig { governance, vault },
            genesis_policy: None,
            asset: AssetInfo::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file. No environment overrides or validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(target: "splitter", path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load a file, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `TRISPLIT_LOG_LEVEL` and `TRISPLIT_STORAGE_PATH`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            self.logging.level = level.trim().to_lowercase();
        }
        if let Ok(path) = std::env::var(ENV_STORAGE_PATH) {
            if path.trim().is_empty() {
                warn!(target: "splitter", "Ignoring empty {}", ENV_STORAGE_PATH);
            } else {
                self.storage.path = Some(PathBuf::from(path));
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.roles.governance.is_zero() {
            return Err(ConfigError::Invalid(
                "roles.governance must not be the null address".into(),
            ));
        }
        if self.roles.vault.is_zero() {
            return Err(ConfigError::Invalid(
                "roles.vault must not be the null address".into(),
            ));
        }
        if self.roles.governance == self.roles.vault {
            return Err(ConfigError::Invalid(
                "roles.governance and roles.vault must be different addresses".into(),
            ));
        }

        if let Some(policy) = &self.genesis_policy {
            policy.to_policy()?;
        }

        if self.asset.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "asset.decimals must be at most {}, got {}",
                MAX_DECIMALS, self.asset.decimals
            )));
        }

        if self.storage.backend == StorageBackend::Sled && self.storage.path.is_none() {
            return Err(ConfigError::Invalid(
                "storage.path is required for the sled backend".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {:?}, got {:?}",
                LOG_LEVELS, self.logging.level
            )));
        }
        Ok(())
    }

    pub fn genesis_policy(&self) -> std::result::Result<Option<EpochPolicy>, ConfigError> {
        Ok(self
            .genesis_policy
            .as_ref()
            .map(GenesisPolicyConfig::to_policy)
            .transpose()?)
    }

    pub fn authority(&self) -> StaticAuthority {
        StaticAuthority::new(self.roles.governance, self.roles.vault)
    }

    /// Open the configured storage backend.
    pub fn open_store(&self) -> std::result::Result<Box<dyn SplitterStore>, ConfigError> {
        match self.storage.backend {
            StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
            StorageBackend::Sled => {
                let path = self.storage.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("storage.path is required for the sled backend".into())
                })?;
                let flush_every_ms = match self.storage.flush_every_ms {
                    0 => None,
                    ms => Some(ms),
                };
                info!(
                    target: "splitter",
                    path = %path.display(),
                    ?flush_every_ms,
                    "Opening sled store"
                );
                Ok(Box::new(SledStore::open_with_flush_interval(
                    path,
                    flush_every_ms,
                )?))
            }
        }
    }
}

impl DonationSplitter {
    /// Build a splitter from a validated configuration.
    pub fn from_config(config: &SplitterConfig) -> Result<Self> {
        config.validate()?;
        let store = config.open_store()?;
        let genesis_policy = config.genesis_policy()?;
        DonationSplitter::new(
            store,
            Box::new(config.authority()),
            config.genesis_epoch,
            genesis_policy,
        )
    }
}
