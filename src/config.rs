// config.rs - Engine Configuration
//
//! Engine settings loaded from a TOML file with environment overrides.
//!
//! ```toml
//! [agent]
//! acl_representation = "bit-efficient"
//! payload_encoding = "utf8"
//!
//! [protocol]
//! timeout_ms = 30000
//! contract_net_max_participants = 32
//!
//! [logging]
//! level = "warn,fipa_acl_engine=info"
//! format = "compact"
//! ```
//!
//! Any key can be overridden from the environment with the `FIPA_ACL`
//! prefix and `__` as the section separator, for example
//! `FIPA_ACL__PROTOCOL__TIMEOUT_MS=5000`.

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::acl_message::{AclRepresentation, PayloadEncoding};
use crate::observability::TracingConfig;

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "FIPA_ACL";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Defaults for messages created by an agent
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub acl_representation: AclRepresentation,
    pub payload_encoding: PayloadEncoding,
}

/// Interaction protocol settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Idle time after which a waiting conversation gives up
    pub timeout_ms: u64,
    /// Upper bound on contract-net bidders
    pub contract_net_max_participants: usize,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            contract_net_max_participants: 32,
        }
    }
}

impl ProtocolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub agent: AgentSettings,
    pub protocol: ProtocolSettings,
    pub logging: TracingConfig,
}

impl EngineConfig {
    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
            .build()?;

        let cfg: EngineConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an optional TOML file plus `FIPA_ACL__*` environment overrides
    pub fn load_with_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_env_prefix(path: Option<&Path>, prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: EngineConfig = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Protocol timeout must be greater than 0".to_string(),
            ));
        }

        if self.protocol.contract_net_max_participants < 2 {
            return Err(ConfigError::Invalid(format!(
                "Contract-net needs room for at least 2 participants, got {}",
                self.protocol.contract_net_max_participants
            )));
        }

        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Invalid(format!(
                "Bad log level '{}': {e}",
                self.logging.level
            )));
        }

        Ok(())
    }
}
