//! Tool settings: built-in defaults, an optional TOML file, then
//! `FLUX_ETL__*` environment variables.

use crate::error::Result;
use crate::utils::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_DATABASE_NAME, DEFAULT_DATABASE_URI, SETTINGS_ENV_PREFIX,
};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub database: DatabaseSettings,

    #[validate(nested)]
    pub load: LoadSettings,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseSettings {
    #[validate(length(min = 1))]
    pub uri: String,

    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoadSettings {
    #[validate(range(min = 1))]
    pub batch_size: usize,
}

impl Settings {
    /// Load settings; a missing settings file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("database.uri", DEFAULT_DATABASE_URI)?
            .set_default("database.name", DEFAULT_DATABASE_NAME)?
            .set_default("load.batch_size", DEFAULT_BATCH_SIZE as i64)?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(SETTINGS_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn with_overrides(mut self, uri: Option<String>, database: Option<String>) -> Self {
        if let Some(uri) = uri {
            self.database.uri = uri;
        }
        if let Some(name) = database {
            self.database.name = name;
        }
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings {
                uri: DEFAULT_DATABASE_URI.to_string(),
                name: DEFAULT_DATABASE_NAME.to_string(),
            },
            load: LoadSettings {
                batch_size: DEFAULT_BATCH_SIZE,
            },
        }
    }
}
