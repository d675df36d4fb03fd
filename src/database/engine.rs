//! Engine and session factories over an sqlx connection pool.

use std::str::FromStr;

use log::LevelFilter;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{Any, AnyConnection, AnyPool, ConnectOptions, Transaction};
use tracing::{debug, error, info};

use super::{Backend, DatabaseError, DbUri, Result};

/// Maximum number of pooled connections per engine.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// A lazily connecting pool bound to one database.
///
/// No connection is opened until the first query or session.
#[derive(Debug, Clone)]
pub struct Engine {
    pool: AnyPool,
    uri: DbUri,
    backend: Backend,
    echo: bool,
}

/// Creates an engine for `uri`. With `echo`, every SQL statement is logged at INFO.
///
/// Fails with a validation error outside a Tokio runtime, since the pool
/// maintains its connections on the runtime.
pub fn get_engine(uri: &DbUri, echo: bool) -> Result<Engine> {
    let backend = uri.backend()?;
    if let Err(e) = tokio::runtime::Handle::try_current() {
        error!(uri = %uri, error = %e, "Database engine needs a Tokio runtime");
        return Err(DatabaseError::Validation(format!(
            "database engine needs a Tokio runtime: {e}"
        )));
    }

    sqlx::any::install_default_drivers();

    let level = if echo {
        LevelFilter::Info
    } else {
        LevelFilter::Debug
    };

    let options = AnyConnectOptions::from_str(&uri.connect_url()?)
        .map_err(|source| {
            error!(uri = %uri, error = %source, "Failed to create database engine");
            DatabaseError::Engine { source }
        })?
        .log_statements(level);

    let pool = AnyPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect_lazy_with(options);

    info!(uri = %uri, backend = %backend, echo, "Database engine created");

    Ok(Engine {
        pool,
        uri: uri.clone(),
        backend,
        echo,
    })
}

impl Engine {
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn uri(&self) -> &DbUri {
        &self.uri
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Closes every pooled connection.
    pub async fn dispose(&self) {
        self.pool.close().await;
        debug!(uri = %self.uri, "Database engine disposed");
    }
}

/// Factory for transactional sessions sharing one engine.
#[derive(Debug, Clone)]
pub struct SessionPool {
    pool: AnyPool,
    backend: Backend,
}

/// Creates a session factory bound to `engine`.
pub fn get_session_pool(engine: &Engine) -> SessionPool {
    SessionPool {
        pool: engine.pool.clone(),
        backend: engine.backend,
    }
}

impl SessionPool {
    /// Opens a session with its own transaction.
    pub async fn begin(&self) -> Result<Session> {
        let tx = self.pool.begin().await?;
        Ok(Session {
            tx,
            backend: self.backend,
        })
    }
}

/// A unit of work. Changes are discarded unless [`Session::commit`] is called.
pub struct Session {
    tx: Transaction<'static, Any>,
    backend: Backend,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connection for running queries inside this session.
    pub fn connection(&mut self) -> &mut AnyConnection {
        &mut self.tx
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Runs a statement without bind parameters, returning affected rows.
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
