//! SQLite storage backend.
//!
//! Tables derive from entity profiles on prepare. Statements run on a
//! connection pool and address individual records by rowid, so "first
//! match" means lowest rowid.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{query, Row, SqlitePool};
use tracing::debug;

use palisade_core::profile::FieldKind;
use palisade_core::{
    BackendStatus, CoreError, CoreResult, EntityBackend, EntityProfile, FilterMask,
    ProfileRegistry, Record,
};

pub mod schema;
pub mod translate;

use schema::create_table_sql;
use translate::{build_where, quote_identifier, sql_value, SqlValue};

/// Relational record store over a pooled SQLite database.
pub struct SqliteBackend {
    pool: SqlitePool,
    registry: RwLock<Option<Arc<ProfileRegistry>>>,
}

impl SqliteBackend {
    /// Opens a pool for the given URL.
    ///
    /// In-memory databases are pinned to a single long-lived connection;
    /// every pooled connection would otherwise see its own empty database.
    pub async fn connect(url: &str, max_connections: u32) -> CoreResult<Self> {
        let options = url
            .parse::<SqliteConnectOptions>()
            .map_err(|err| {
                CoreError::backend_unavailable(format!("invalid sqlite url `{url}`: {err}"))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_size = if in_memory { 1 } else { max_connections.max(1) };
        let mut pool_options = SqlitePoolOptions::new().max_connections(pool_size);
        if in_memory {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|err| CoreError::backend_unavailable(err.to_string()))?;

        Ok(Self {
            pool,
            registry: RwLock::new(None),
        })
    }

    /// Returns the underlying pool (useful for composing with other services).
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn registry(&self) -> CoreResult<Arc<ProfileRegistry>> {
        self.registry
            .read()
            .clone()
            .ok_or_else(|| CoreError::backend_unavailable("sqlite backend has not been prepared"))
    }
}

fn select_columns(profile: &EntityProfile) -> String {
    profile
        .fields()
        .iter()
        .map(|field| quote_identifier(field.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_row(profile: &EntityProfile, row: &SqliteRow) -> CoreResult<Record> {
    let mut record = Record::new();
    for field in profile.fields() {
        let name = field.name();
        let value = match field.kind() {
            FieldKind::Int => row
                .try_get::<Option<i64>, _>(name)
                .map(|cell| cell.map(Value::from)),
            FieldKind::Float => row
                .try_get::<Option<f64>, _>(name)
                .map(|cell| cell.map(Value::from)),
            FieldKind::Bool => row
                .try_get::<Option<bool>, _>(name)
                .map(|cell| cell.map(Value::from)),
            FieldKind::Char | FieldKind::Str | FieldKind::Text | FieldKind::Datetime => row
                .try_get::<Option<String>, _>(name)
                .map(|cell| cell.map(Value::from)),
        }
        .map_err(|err| CoreError::storage(format!("column `{name}`: {err}")))?;
        record.set(name, value.unwrap_or(Value::Null));
    }
    Ok(record)
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_all<'q>(mut query: SqliteQuery<'q>, values: &[SqlValue]) -> SqliteQuery<'q> {
    for value in values {
        query = match value {
            SqlValue::Integer(integer) => query.bind(*integer),
            SqlValue::Real(real) => query.bind(*real),
            SqlValue::Text(text) => query.bind(text.clone()),
            SqlValue::Null => query.bind(Option::<i64>::None),
        };
    }
    query
}

fn map_sqlx_error(err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            if message.contains("UNIQUE constraint failed")
                || message.contains("NOT NULL constraint failed")
                || message.contains("FOREIGN KEY constraint failed")
                || message.contains("CHECK constraint failed")
            {
                CoreError::constraint(message)
            } else {
                CoreError::storage(message)
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            CoreError::backend_unavailable(err.to_string())
        }
        sqlx::Error::Io(io_err) => CoreError::backend_unavailable(io_err.to_string()),
        other => CoreError::storage(other.to_string()),
    }
}

#[async_trait]
impl EntityBackend for SqliteBackend {
    async fn prepare(&self, registry: Arc<ProfileRegistry>) -> CoreResult<()> {
        for entity_type in registry.entity_types() {
            let profile = registry.profile(entity_type)?;
            let ddl = create_table_sql(profile);
            query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        debug!(
            "sqlite backend prepared: {} entity types",
            registry.entity_types().len()
        );
        *self.registry.write() = Some(registry);
        Ok(())
    }

    async fn fetch_first(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry()?;
        let profile = registry.profile(entity_type)?;
        let predicate = build_where(profile, masks)?;

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY rowid LIMIT 1",
            select_columns(profile),
            quote_identifier(profile.name()),
            predicate.clause
        );
        let row = bind_all(query(&sql), &predicate.binds)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(Some(map_row(profile, &row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_all(&self, entity_type: &str, masks: &[FilterMask]) -> CoreResult<Vec<Record>> {
        let registry = self.registry()?;
        let profile = registry.profile(entity_type)?;
        let predicate = build_where(profile, masks)?;

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY rowid",
            select_columns(profile),
            quote_identifier(profile.name()),
            predicate.clause
        );
        let rows = bind_all(query(&sql), &predicate.binds)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(|row| map_row(profile, row)).collect()
    }

    async fn insert(&self, entity_type: &str, record: Record) -> CoreResult<Record> {
        let registry = self.registry()?;
        let profile = registry.profile(entity_type)?;

        let mut columns = Vec::new();
        let mut binds = Vec::new();
        for field in profile.fields() {
            if let Some(value) = record.get(field.name()) {
                if field.is_autoincrement() && value.is_null() {
                    continue;
                }
                columns.push(quote_identifier(field.name()));
                binds.push(sql_value(value)?);
            }
        }

        let table = quote_identifier(profile.name());
        let sql = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        let result = bind_all(query(&sql), &binds)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {} FROM {table} WHERE rowid = ?",
            select_columns(profile)
        );
        let row = query(&sql)
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        map_row(profile, &row)
    }

    async fn update(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
        patch: Record,
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry()?;
        let profile = registry.profile(entity_type)?;
        let predicate = build_where(profile, masks)?;
        let table = quote_identifier(profile.name());

        let sql = format!(
            "SELECT rowid AS rowid FROM {table} WHERE {} ORDER BY rowid LIMIT 1",
            predicate.clause
        );
        let row = bind_all(query(&sql), &predicate.binds)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let rowid: i64 = match row {
            Some(row) => row
                .try_get("rowid")
                .map_err(|err| CoreError::storage(err.to_string()))?,
            None => return Ok(None),
        };

        let mut assignments = Vec::new();
        let mut binds = Vec::new();
        for field in profile.fields() {
            if let Some(value) = patch.get(field.name()) {
                assignments.push(format!("{} = ?", quote_identifier(field.name())));
                binds.push(sql_value(value)?);
            }
        }
        if !assignments.is_empty() {
            let sql = format!(
                "UPDATE {table} SET {} WHERE rowid = ?",
                assignments.join(", ")
            );
            bind_all(query(&sql), &binds)
                .bind(rowid)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }

        let sql = format!(
            "SELECT {} FROM {table} WHERE rowid = ?",
            select_columns(profile)
        );
        let row = query(&sql)
            .bind(rowid)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Some(map_row(profile, &row)?))
    }

    async fn remove(
        &self,
        entity_type: &str,
        masks: &[FilterMask],
    ) -> CoreResult<Option<Record>> {
        let registry = self.registry()?;
        let profile = registry.profile(entity_type)?;
        let predicate = build_where(profile, masks)?;
        let table = quote_identifier(profile.name());

        let sql = format!(
            "SELECT rowid AS rowid, {} FROM {table} WHERE {} ORDER BY rowid LIMIT 1",
            select_columns(profile),
            predicate.clause
        );
        let row = bind_all(query(&sql), &predicate.binds)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let rowid: i64 = row
                    .try_get("rowid")
                    .map_err(|err| CoreError::storage(err.to_string()))?;
                let prior = map_row(profile, &row)?;
                query(&format!("DELETE FROM {table} WHERE rowid = ?"))
                    .bind(rowid)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
                Ok(Some(prior))
            }
            None => Ok(None),
        }
    }

    async fn status(&self) -> CoreResult<BackendStatus> {
        match query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(BackendStatus::Healthy),
            Err(_) => Ok(BackendStatus::Degraded),
        }
    }
}
