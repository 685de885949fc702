mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat, FileSourceFile};

use settings::PartialSettings;

pub use settings::{
    DiscoverySettings, LoggingSettings, PublishSettings, Settings, TransportSettings,
};

/// Loads configuration from `config/default` (any supported format, optional),
/// `.env` and `TOPICMON__*` environment variables, merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();
    build(File::with_name("config/default").required(false))
}

/// Like `load_config`, but reads the given file, which must exist.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    build(File::from(path).required(true))
}

fn build(file: File<FileSourceFile, FileFormat>) -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("TOPICMON")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(merge(partial))
}

fn merge(partial: PartialSettings) -> Settings {
    let default = Settings::default();

    Settings {
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
        discovery: DiscoverySettings {
            snapshot_path: partial
                .discovery
                .as_ref()
                .and_then(|d| d.snapshot_path.clone())
                .unwrap_or(default.discovery.snapshot_path),
            poll_interval_ms: partial
                .discovery
                .as_ref()
                .and_then(|d| d.poll_interval_ms)
                .unwrap_or(default.discovery.poll_interval_ms),
        },
        publish: PublishSettings {
            connection_wait_secs: partial
                .publish
                .as_ref()
                .and_then(|p| p.connection_wait_secs)
                .unwrap_or(default.publish.connection_wait_secs),
            connection_poll_ms: partial
                .publish
                .as_ref()
                .and_then(|p| p.connection_poll_ms)
                .unwrap_or(default.publish.connection_poll_ms),
            teardown_grace_ms: partial
                .publish
                .as_ref()
                .and_then(|p| p.teardown_grace_ms)
                .unwrap_or(default.publish.teardown_grace_ms),
        },
        transport: TransportSettings {
            max_message_bytes: partial
                .transport
                .as_ref()
                .and_then(|t| t.max_message_bytes)
                .unwrap_or(default.transport.max_message_bytes),
            history_limit: partial
                .transport
                .as_ref()
                .and_then(|t| t.history_limit)
                .unwrap_or(default.transport.history_limit),
        },
        types: partial.types.unwrap_or(default.types),
    }
}
