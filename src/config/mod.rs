//! Layered configuration: built-in defaults, then an optional
//! `config/default.toml`, then `WAMPSUB__*` environment variables.

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings};

/// Prefix of the environment variables read by [`load_config`].
pub const ENV_PREFIX: &str = "WAMPSUB";

/// Loads the configuration from the default file and environment variables
/// (`WAMPSUB__SERVER__PORT=9000` sets `server.port`), merged over
/// `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_over(Settings::default()))
}

#[cfg(test)]
mod tests;
