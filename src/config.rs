//! Configuration System
//!
//! Layered configuration: built-in defaults, then the user's global file, then the workspace
//! file, then `ERASER__SECTION__KEY` environment variables. Validation collects every problem
//! instead of stopping at the first.

use crate::error::EditError;
use crate::logging::LoggingConfig;
use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod merge_policy;
mod sources;

pub use crate::provider::ProviderConfig;
pub use sources::global_file::global_config_path;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EraserConfig {
    /// Background-removal provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Editing session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long to wait for a transform before abandoning it. 0 waits indefinitely.
    #[serde(default = "default_transform_timeout_secs")]
    pub transform_timeout_secs: u64,
}

fn default_transform_timeout_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transform_timeout_secs: default_transform_timeout_secs(),
        }
    }
}

impl SessionConfig {
    pub fn transform_timeout(&self) -> Option<Duration> {
        match self.transform_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Provider(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl EraserConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one [`EditError::ConfigError`].
    pub fn ensure_valid(&self) -> Result<(), EditError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            EditError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}

/// Loads [`EraserConfig`] from its layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, workspace file, environment.
    pub fn load(workspace_root: &Path) -> Result<EraserConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(Environment::with_prefix("ERASER").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Defaults and a single explicit file; the file must exist.
    pub fn load_from_file(path: &Path) -> Result<EraserConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
