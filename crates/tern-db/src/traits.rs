//! Driver adapter traits
//!
//! The migration engine talks to a database only through [`Database`] and the
//! [`Transaction`] handles it hands out. Supporting another database means
//! implementing these two traits.

use crate::error::DbResult;
use async_trait::async_trait;

/// A bound parameter or a column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Any integer column
    Integer(i64),
    /// Text, and anything rendered as text
    Text(String),
}

impl SqlValue {
    /// Integer payload, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

/// One result row, columns in select order.
pub type SqlRow = Vec<SqlValue>;

/// Database abstraction trait for Tern
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Open a transaction.
    ///
    /// The returned handle has exclusive use of the connection until it is
    /// committed, rolled back or dropped. Dropping an unfinished handle rolls
    /// the transaction back.
    async fn begin(&self) -> DbResult<Box<dyn Transaction>>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}

/// An open transaction.
#[async_trait]
pub trait Transaction: Send {
    /// Execute one or more SQL statements
    async fn execute(&mut self, sql: &str) -> DbResult<()>;

    /// Execute a single parameterised statement, returns affected rows
    async fn execute_with(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Run a parameterised query and return every row
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqlRow>>;

    /// Make the transaction's changes durable
    async fn commit(self: Box<Self>) -> DbResult<()>;

    /// Discard the transaction's changes
    async fn rollback(self: Box<Self>) -> DbResult<()>;
}
