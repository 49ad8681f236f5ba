//! Purpose: Contracts between the request pipeline and a database driver binding.
//! Exports: `Connector`, `Connection`, `ResultCursor`, `RowValues`.
//! Role: Keeps streaming and HTTP code agnostic of concrete drivers and column types.
//! Invariants: A connection is used by exactly one request and closed when it finishes.
//! Invariants: Cursors are forward-only and single-pass; every row has one value per column.

use std::future::Future;

use crate::core::error::Error;

/// One row, one entry per column; `None` is SQL NULL.
pub type RowValues = Vec<Option<String>>;

pub trait Connector: Send + Sync + 'static {
    type Connection: Connection;

    /// Opens a fresh connection. Failures are `ErrorKind::Connection`.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Error>> + Send;
}

pub trait Connection: Send + 'static {
    type Cursor<'c>: ResultCursor + 'c
    where
        Self: 'c;

    /// Executes `statement`. Rejection by the database is `ErrorKind::Query`.
    fn query<'c>(
        &'c mut self,
        statement: &'c str,
    ) -> impl Future<Output = Result<Self::Cursor<'c>, Error>> + Send + 'c;

    fn close(self) -> impl Future<Output = Result<(), Error>> + Send;
}

pub trait ResultCursor: Send {
    /// Column names in result order. Failures are `ErrorKind::Metadata`.
    fn columns(&self) -> Result<Vec<String>, Error>;

    /// Next row coerced to text, or `None` once the result set is exhausted.
    /// Failures are `ErrorKind::Row`.
    fn next_row(&mut self) -> impl Future<Output = Result<Option<RowValues>, Error>> + Send;
}
