//! Table-backed migration store.
//!
//! Applied records live in a single table (default `tern_migrations`) in the
//! target database itself. The table is created on first use.

use crate::error::{StoreError, StoreResult};
use crate::store::MigrationStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use std::sync::Arc;
use tern_core::config::{is_valid_table_name, Config};
use tern_core::{AppliedRecord, MigrationUnit, Scope, UnitId};
use tern_db::{Database, DbError, SqlRow, SqlValue};
use tokio::sync::OnceCell;

/// Timestamp format written to and parsed from the `applied_at` column.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Migration store kept in a table of the migrated database.
///
/// Each operation opens its own transaction, separate from the transaction a
/// migration unit runs in.
pub struct TableStore {
    db: Arc<dyn Database>,
    table: String,
    initialized: OnceCell<()>,
}

impl TableStore {
    /// Create a store over `db` using `table` for bookkeeping.
    pub fn new(db: Arc<dyn Database>, table: impl Into<String>) -> StoreResult<Self> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(StoreError::InitError(format!(
                "'{table}' is not a valid table name"
            )));
        }
        Ok(Self {
            db,
            table,
            initialized: OnceCell::new(),
        })
    }

    /// Create a store using the configured table name.
    pub fn from_config(db: Arc<dyn Database>, config: &Config) -> StoreResult<Self> {
        Self::new(db, config.migrations_table.clone())
    }

    /// Name of the bookkeeping table.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        let mut sql = String::new();
        if let Some((schema, _)) = self.table.split_once('.') {
            sql.push_str(&format!("CREATE SCHEMA IF NOT EXISTS {schema};\n"));
        }
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                 id         BIGINT PRIMARY KEY,
                 name       VARCHAR NOT NULL,
                 scope      VARCHAR NOT NULL,
                 applied_at TIMESTAMP NOT NULL
             );",
            self.table
        ));
        sql
    }

    async fn create_table(&self) -> StoreResult<()> {
        let init_err = |e: DbError| StoreError::InitError(e.to_string());
        let mut tx = self.db.begin().await.map_err(init_err)?;
        tx.execute(&self.create_table_sql()).await.map_err(init_err)?;
        tx.commit().await.map_err(init_err)?;
        log::debug!("Migration store table {} is ready", self.table);
        Ok(())
    }

    async fn ensure_initialized(&self) -> StoreResult<()> {
        self.initialized
            .get_or_try_init(|| self.create_table())
            .await?;
        Ok(())
    }

    fn db_id(id: UnitId) -> StoreResult<SqlValue> {
        i64::try_from(id.value())
            .map(SqlValue::Integer)
            .map_err(|_| StoreError::WriteError(format!("identifier {id} exceeds the BIGINT range")))
    }

    fn parse_row(row: &SqlRow) -> StoreResult<AppliedRecord> {
        let corrupt = |what: &str| StoreError::CorruptRecord(format!("{what} in row {row:?}"));
        let [id, name, scope, applied_at] = row.as_slice() else {
            return Err(corrupt("unexpected column count"));
        };

        let id = id
            .as_i64()
            .and_then(|v| u64::try_from(v).ok())
            .map(UnitId::new)
            .ok_or_else(|| corrupt("invalid id"))?;
        let name = name.as_str().ok_or_else(|| corrupt("invalid name"))?;
        let scope = scope
            .as_str()
            .and_then(|s| Scope::parse(s).ok())
            .ok_or_else(|| corrupt("invalid scope"))?;
        let applied_at = applied_at
            .as_str()
            .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| corrupt("invalid applied_at"))?;

        Ok(AppliedRecord {
            id,
            name: name.to_string(),
            scope,
            applied_at,
        })
    }
}

#[async_trait]
impl MigrationStore for TableStore {
    async fn initialize(&self) -> StoreResult<()> {
        self.create_table().await?;
        let _ = self.initialized.set(());
        Ok(())
    }

    async fn list_applied(&self, scope: Option<&Scope>) -> StoreResult<Vec<AppliedRecord>> {
        self.ensure_initialized().await?;

        let read_err = |e: DbError| StoreError::ReadError(e.to_string());
        let mut tx = self.db.begin().await.map_err(read_err)?;
        let rows = tx
            .query(
                &format!(
                    "SELECT id, name, scope, CAST(applied_at AS VARCHAR) FROM {} ORDER BY id",
                    self.table
                ),
                &[],
            )
            .await
            .map_err(read_err)?;
        tx.commit().await.map_err(read_err)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::parse_row(row)?;
            if scope.map_or(true, |s| s.contains(&record.scope)) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn record_applied(&self, unit: &MigrationUnit) -> StoreResult<AppliedRecord> {
        self.ensure_initialized().await?;

        let write_err = |e: DbError| StoreError::WriteError(e.to_string());
        let id = Self::db_id(unit.id)?;
        let record = AppliedRecord::for_unit(unit, Utc::now().trunc_subsecs(6));

        let mut tx = self.db.begin().await.map_err(write_err)?;
        let existing = tx
            .query(
                &format!("SELECT id FROM {} WHERE id = ?", self.table),
                &[id.clone()],
            )
            .await
            .map_err(write_err)?;
        if !existing.is_empty() {
            tx.rollback().await.map_err(write_err)?;
            return Err(StoreError::WriteError(format!(
                "migration {} is already recorded as applied",
                unit.label()
            )));
        }

        tx.execute_with(
            &format!(
                "INSERT INTO {} (id, name, scope, applied_at) VALUES (?, ?, ?, CAST(? AS TIMESTAMP))",
                self.table
            ),
            &[
                id,
                SqlValue::from(record.name.as_str()),
                SqlValue::from(record.scope.to_string()),
                SqlValue::from(format_timestamp(record.applied_at)),
            ],
        )
        .await
        .map_err(write_err)?;
        tx.commit().await.map_err(write_err)?;

        log::debug!("Recorded {} as applied", unit.label());
        Ok(record)
    }

    async fn record_reverted(&self, unit: &MigrationUnit) -> StoreResult<()> {
        self.ensure_initialized().await?;

        let write_err = |e: DbError| StoreError::WriteError(e.to_string());
        let id = Self::db_id(unit.id)?;

        let mut tx = self.db.begin().await.map_err(write_err)?;
        let deleted = tx
            .execute_with(&format!("DELETE FROM {} WHERE id = ?", self.table), &[id])
            .await
            .map_err(write_err)?;
        if deleted == 0 {
            tx.rollback().await.map_err(write_err)?;
            return Err(StoreError::WriteError(format!(
                "migration {} is not recorded as applied",
                unit.label()
            )));
        }
        tx.commit().await.map_err(write_err)?;

        log::debug!("Removed applied record for {}", unit.label());
        Ok(())
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;
