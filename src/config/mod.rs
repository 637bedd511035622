//! Configuration loading
//!
//! Sources, later ones winning:
//! 1. built-in defaults (`Settings::default()`)
//! 2. an optional `config/default.{toml,json,yaml,...}` file
//! 3. `EDGEBUS__<SECTION>__<KEY>` environment variables, after `.env` is
//!    loaded by `dotenvy`

mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LoggingSettings, NetworkSettings, PartialSettings, Settings,
};

/// File looked up by `load_config`, extension excluded.
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads the configuration from `path` (extension optional) and environment
/// variables, merged onto the defaults. A missing file is not an error.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let config = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("EDGEBUS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge_onto(Settings::default()))
}
