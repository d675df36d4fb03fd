//! Reusable service building blocks: layered settings, a scoped HTTP client
//! with an optional on-disk response cache, and a relational persistence
//! scaffold.

pub mod database;
pub mod http;
pub mod settings;

pub use database::{DatabaseError, DbUri, Engine, Metadata, SessionPool, Table};
pub use http::{ControllerConfig, HttpController, HttpError};
pub use settings::{DbSettings, Settings, SettingsError, SettingsLoader};
