//! Relational persistence scaffold.
//!
//! A [`DbUri`] describes where the database lives, [`get_engine`] turns it
//! into a lazily connecting pool, [`get_session_pool`] hands out
//! transactional sessions, and [`Metadata`] creates the registered tables.

mod engine;
mod error;
mod schema;
mod uri;

pub use engine::{Engine, Session, SessionPool, get_engine, get_session_pool};
pub use error::{DatabaseError, Result};
pub use schema::{
    Column, ColumnType, Metadata, Table, int_pk, str_10, str_255, table_name_for,
};
pub use uri::{Backend, DEFAULT_DATABASE, DEFAULT_DRIVERNAME, DbUri, get_db_uri};
