//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("provider.connect_timeout_secs", 10)?
        .set_default("provider.request_timeout_secs", 120)?
        .set_default("session.transform_timeout_secs", 300)?
        .set_default("logging.level", "info")
}
