//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{Database, SqlRow, SqlValue, Transaction};
use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn begin(&self) -> DbResult<Box<dyn Transaction>> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))?;
        Ok(Box::new(DuckDbTransaction {
            conn,
            finished: false,
        }))
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

/// Open DuckDB transaction.
///
/// Holds the connection lock for its whole lifetime, so no other statement
/// can interleave with it.
pub struct DuckDbTransaction {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

impl DuckDbTransaction {
    fn bind(params: &[SqlValue]) -> Vec<Value> {
        params
            .iter()
            .map(|p| match p {
                SqlValue::Null => Value::Null,
                SqlValue::Integer(v) => Value::BigInt(*v),
                SqlValue::Text(s) => Value::Text(s.clone()),
            })
            .collect()
    }
}

fn from_duckdb_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(b)),
        Value::TinyInt(v) => SqlValue::Integer(v.into()),
        Value::SmallInt(v) => SqlValue::Integer(v.into()),
        Value::Int(v) => SqlValue::Integer(v.into()),
        Value::BigInt(v) => SqlValue::Integer(v),
        Value::UTinyInt(v) => SqlValue::Integer(v.into()),
        Value::USmallInt(v) => SqlValue::Integer(v.into()),
        Value::UInt(v) => SqlValue::Integer(v.into()),
        Value::UBigInt(v) => i64::try_from(v)
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(v.to_string())),
        Value::HugeInt(v) => i64::try_from(v)
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(v.to_string())),
        Value::Text(s) => SqlValue::Text(s),
        other => SqlValue::Text(format!("{other:?}")),
    }
}

#[async_trait]
impl Transaction for DuckDbTransaction {
    async fn execute(&mut self, sql: &str) -> DbResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    async fn execute_with(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        let mut stmt = self.conn.prepare(sql)?;
        let affected = stmt
            .execute(duckdb::params_from_iter(Self::bind(params)))
            .map_err(|e| DbError::ExecutionError(format!("{e}: {sql}")))?;
        Ok(affected)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqlRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(duckdb::params_from_iter(Self::bind(params)), |row| {
            let columns = row.as_ref().column_count();
            (0..columns)
                .map(|i| row.get::<_, Value>(i).map(from_duckdb_value))
                .collect::<Result<SqlRow, _>>()
        })?;
        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        let mut this = self;
        this.finished = true;
        if let Err(commit_err) = this.conn.execute_batch("COMMIT") {
            let _ = this.conn.execute_batch("ROLLBACK");
            return Err(DbError::TransactionError(format!(
                "COMMIT failed: {commit_err}"
            )));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        let mut this = self;
        this.finished = true;
        this.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| DbError::TransactionError(format!("ROLLBACK failed: {e}")))
    }
}

impl Drop for DuckDbTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::debug!("Rolling back abandoned DuckDB transaction");
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            log::warn!("Rollback of abandoned transaction failed: {e}");
        }
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
