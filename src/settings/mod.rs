//! Layered application settings.
//!
//! Values are resolved per field from three places, in order of precedence:
//! an explicit environment variable (`ENV`, `CONTAINER_ENV`, `LOG_LEVEL`),
//! the layered settings files (`settings.toml`, `.secrets.toml`, with
//! `DYNACONF_*` overrides), and finally a compiled-in default.

mod coerce;
mod database;
mod error;
mod layered;

pub use database::{DbSettings, VALID_DB_TYPES};
pub use error::SettingsError;
pub use layered::{
    DEFAULT_ENVIRONMENT, DEFAULT_SETTINGS_FILES, ENV_SWITCHER, ENVVAR_PREFIX, EnvSnapshot,
    LayeredSource,
};

use std::path::{Path, PathBuf};

use tracing::debug;

use coerce::Resolver;

const DEFAULT_ENV: &str = "development";
const DEFAULT_CONTAINER_ENV: bool = false;
const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Process-wide application settings.
///
/// Built once at start-up with [`Settings::load`] and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Deployment environment, e.g. "development" or "production".
    pub env: String,
    /// Whether the process runs inside a container.
    pub container_env: bool,
    /// Log level name, e.g. "INFO" or "DEBUG".
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: DEFAULT_ENV.to_string(),
            container_env: DEFAULT_CONTAINER_ENV,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from the current directory and process environment.
    pub fn load() -> Result<Self, SettingsError> {
        SettingsLoader::new().load()
    }

    /// Resolves settings from an already loaded source.
    pub fn from_source(layered: &LayeredSource, env: &EnvSnapshot) -> Result<Self, SettingsError> {
        let resolver = Resolver::new(layered, env);

        Ok(Self {
            env: resolver
                .string("env", "ENV")?
                .unwrap_or_else(|| DEFAULT_ENV.to_string()),
            container_env: resolver
                .boolean("container_env", "CONTAINER_ENV")?
                .unwrap_or(DEFAULT_CONTAINER_ENV),
            log_level: resolver
                .string("log_level", "LOG_LEVEL")?
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// Returns true unless running in the development environment.
    pub fn is_production(&self) -> bool {
        !self.env.eq_ignore_ascii_case(DEFAULT_ENV)
    }
}

/// Configurable entry point for settings loading.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    root: PathBuf,
    files: Vec<String>,
    env: Option<EnvSnapshot>,
    load_dotenv: bool,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// Loader for the default files in the current directory.
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("."),
            files: DEFAULT_SETTINGS_FILES.iter().map(|f| f.to_string()).collect(),
            env: None,
            load_dotenv: true,
        }
    }

    /// Directory the settings files are resolved against.
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    /// Replaces the list of settings files.
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Uses a fixed environment instead of the process environment.
    ///
    /// Disables `.env` loading, since the snapshot is already complete.
    pub fn with_env(mut self, env: EnvSnapshot) -> Self {
        self.env = Some(env);
        self.load_dotenv = false;
        self
    }

    /// Controls whether a `.env` file is loaded into the process environment.
    pub fn with_dotenv(mut self, enabled: bool) -> Self {
        self.load_dotenv = enabled;
        self
    }

    /// Reads the settings files and environment once.
    pub fn source(&self) -> Result<(LayeredSource, EnvSnapshot), SettingsError> {
        if self.load_dotenv {
            // Missing .env is fine
            dotenvy::dotenv().ok();
        }

        let env = self.env.clone().unwrap_or_else(EnvSnapshot::from_process);
        let layered = LayeredSource::load(&self.root, &self.files, &env)?;

        debug!(
            environment = %layered.environment(),
            files = layered.loaded_files().len(),
            "Layered settings resolved"
        );

        Ok((layered, env))
    }

    /// Builds the application settings.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let (layered, env) = self.source()?;
        Settings::from_source(&layered, &env)
    }

    /// Builds the database settings.
    pub fn load_db(&self) -> Result<DbSettings, SettingsError> {
        let (layered, env) = self.source()?;
        DbSettings::from_source(&layered, &env)
    }
}
