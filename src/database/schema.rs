//! Table descriptions with the standard column conventions.
//!
//! Tables are composed explicitly: start from [`Table::new`] or
//! [`Table::for_model`], add columns, and call [`Table::with_timestamps`]
//! to append the `created_at`/`updated_at` pair.

use tracing::info;

use super::{Backend, DatabaseError, Engine, Result};

const CURRENT_TIMESTAMP: &str = "CURRENT_TIMESTAMP";

/// SQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Varchar(u32),
    Text,
    Boolean,
    Timestamp,
}

impl ColumnType {
    fn sql(&self) -> String {
        match self {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({})", len),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub unique: bool,
    pub nullable: bool,
    /// SQL expression evaluated by the database on insert.
    pub server_default: Option<String>,
    /// SQL expression assigned by [`Table::update_sql`] on every update.
    pub on_update: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            autoincrement: false,
            unique: false,
            nullable: true,
            server_default: None,
            on_update: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn server_default(mut self, expr: impl Into<String>) -> Self {
        self.server_default = Some(expr.into());
        self
    }

    pub fn on_update(mut self, expr: impl Into<String>) -> Self {
        self.on_update = Some(expr.into());
        self
    }

    fn definition(&self, backend: Backend) -> String {
        if self.primary_key && self.autoincrement && self.column_type == ColumnType::Integer {
            return match backend {
                Backend::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", self.name),
                Backend::Postgres => format!("{} SERIAL PRIMARY KEY", self.name),
            };
        }

        let mut def = format!("{} {}", self.name, self.column_type.sql());
        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        } else {
            if !self.nullable {
                def.push_str(" NOT NULL");
            }
            if self.unique {
                def.push_str(" UNIQUE");
            }
        }
        if let Some(default) = &self.server_default {
            def.push_str(&format!(" DEFAULT {}", default));
        }
        def
    }
}

/// Auto-incrementing integer primary key.
pub fn int_pk(name: impl Into<String>) -> Column {
    Column::new(name, ColumnType::Integer)
        .primary_key()
        .autoincrement()
        .unique()
}

/// `VARCHAR(10)` column.
pub fn str_10(name: impl Into<String>) -> Column {
    Column::new(name, ColumnType::Varchar(10))
}

/// `VARCHAR(255)` column.
pub fn str_255(name: impl Into<String>) -> Column {
    Column::new(name, ColumnType::Varchar(255))
}

/// Table name for a model type: lower-cased and pluralised with `s`.
pub fn table_name_for(type_name: &str) -> String {
    let outer = type_name.split('<').next().unwrap_or(type_name);
    let short = outer.rsplit("::").next().unwrap_or(outer);
    format!("{}s", short.to_lowercase())
}

/// Description of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Table named after `T` (`User` -> `users`).
    pub fn for_model<T: ?Sized>() -> Self {
        Self::new(table_name_for(std::any::type_name::<T>()))
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends `created_at` and `updated_at`, both defaulting to the
    /// database clock; `updated_at` is refreshed by [`Table::update_sql`].
    pub fn with_timestamps(self) -> Self {
        self.column(Column::new("created_at", ColumnType::Timestamp).server_default(CURRENT_TIMESTAMP))
            .column(
                Column::new("updated_at", ColumnType::Timestamp)
                    .server_default(CURRENT_TIMESTAMP)
                    .on_update(CURRENT_TIMESTAMP),
            )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn create_sql(&self, backend: Backend) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.definition(backend)))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            columns.join(",\n")
        )
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }

    /// `UPDATE` statement binding `set_columns` in order, plus the
    /// on-update assignments of every other column.
    ///
    /// Placeholders for `set_columns` are numbered from 1 on postgres;
    /// `where_clause` is appended verbatim. Fails when nothing would be assigned.
    pub fn update_sql(
        &self,
        backend: Backend,
        set_columns: &[&str],
        where_clause: &str,
    ) -> Result<String> {
        let mut assignments: Vec<String> = set_columns
            .iter()
            .enumerate()
            .map(|(i, name)| match backend {
                Backend::Sqlite => format!("{} = ?", name),
                Backend::Postgres => format!("{} = ${}", name, i + 1),
            })
            .collect();

        for column in &self.columns {
            if let Some(expr) = &column.on_update {
                if !set_columns.contains(&column.name.as_str()) {
                    assignments.push(format!("{} = {}", column.name, expr));
                }
            }
        }

        if assignments.is_empty() {
            return Err(DatabaseError::Validation(format!(
                "update of {} assigns no columns",
                self.name
            )));
        }

        Ok(format!(
            "UPDATE {} SET {} WHERE {}",
            self.name,
            assignments.join(", "),
            where_clause
        ))
    }
}

/// Registry of the tables an application owns.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    tables: Vec<Table>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing any table with the same name.
    pub fn register(&mut self, table: Table) -> &mut Self {
        self.tables.retain(|t| t.name != table.name);
        self.tables.push(table);
        self
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Creates every registered table that does not exist yet.
    pub async fn create_all(&self, engine: &Engine) -> Result<()> {
        let mut tx = engine.pool().begin().await?;
        for table in &self.tables {
            let sql = table.create_sql(engine.backend());
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!(tables = self.tables.len(), "Schema created");
        Ok(())
    }

    /// Drops every registered table, in reverse registration order.
    pub async fn drop_all(&self, engine: &Engine) -> Result<()> {
        let mut tx = engine.pool().begin().await?;
        for table in self.tables.iter().rev() {
            sqlx::query(&table.drop_sql()).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!(tables = self.tables.len(), "Schema dropped");
        Ok(())
    }
}
