//! Database section of the settings.

use std::fmt;

use super::coerce::Resolver;
use super::{EnvSnapshot, LayeredSource, SettingsError};
use crate::database::{
    self, DEFAULT_DATABASE, DEFAULT_DRIVERNAME, DatabaseError, DbUri, Engine, SessionPool,
};

/// Accepted values of `DB_TYPE`.
pub const VALID_DB_TYPES: [&str; 3] = ["sqlite", "postgres", "mssql"];

/// Database connection settings, resolved from `DB_*` keys.
#[derive(Clone, PartialEq, Eq)]
pub struct DbSettings {
    pub db_type: String,
    pub drivername: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub database: String,
    pub echo: bool,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            drivername: DEFAULT_DRIVERNAME.to_string(),
            user: None,
            password: None,
            host: None,
            port: None,
            database: DEFAULT_DATABASE.to_string(),
            echo: false,
        }
    }
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("db_type", &self.db_type)
            .field("drivername", &self.drivername)
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("echo", &self.echo)
            .finish_non_exhaustive()
    }
}

impl DbSettings {
    /// Resolves every field as layered `DB_<FIELD>` value, overridden by the
    /// `DB_<FIELD>` environment variable, falling back to the defaults.
    pub fn from_source(layered: &LayeredSource, env: &EnvSnapshot) -> Result<Self, SettingsError> {
        let resolver = Resolver::new(layered, env);
        let defaults = Self::default();

        let db_type = resolver
            .string("db_type", "DB_TYPE")?
            .unwrap_or(defaults.db_type);
        if !VALID_DB_TYPES.contains(&db_type.to_lowercase().as_str()) {
            return Err(SettingsError::validation(
                "db_type",
                format!(
                    "must be one of {}, got {:?}",
                    VALID_DB_TYPES.join(", "),
                    db_type
                ),
            ));
        }

        Ok(Self {
            db_type,
            drivername: resolver
                .string("db_drivername", "DB_DRIVERNAME")?
                .unwrap_or(defaults.drivername),
            user: resolver
                .string("db_username", "DB_USERNAME")?
                .filter(|v| !v.is_empty()),
            password: resolver
                .string("db_password", "DB_PASSWORD")?
                .filter(|v| !v.is_empty()),
            host: resolver
                .string("db_host", "DB_HOST")?
                .filter(|v| !v.is_empty()),
            port: resolver.integer("db_port", "DB_PORT")?,
            database: resolver
                .string("db_database", "DB_DATABASE")?
                .unwrap_or(defaults.database),
            echo: resolver
                .boolean("db_echo", "DB_ECHO")?
                .unwrap_or(defaults.echo),
        })
    }

    pub fn db_uri(&self) -> Result<DbUri, DatabaseError> {
        database::get_db_uri(
            &self.drivername,
            self.user.as_deref(),
            self.password.as_deref(),
            self.host.as_deref(),
            self.port,
            &self.database,
        )
    }

    /// Engine for these settings, honouring `echo`.
    pub fn engine(&self) -> Result<Engine, DatabaseError> {
        database::get_engine(&self.db_uri()?, self.echo)
    }

    pub fn session_pool(&self) -> Result<SessionPool, DatabaseError> {
        Ok(database::get_session_pool(&self.engine()?))
    }
}
