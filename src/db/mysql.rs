//! Purpose: MySQL binding for the connection and cursor contracts.
//! Exports: `MySqlConnector`, `MySqlSession`, `MySqlCursor`.
//! Role: Opens one connection per request and reads rows as server-rendered text.
//! Invariants: Sessions use utf8mb4 and the server's own time zone.
//! Invariants: The session `sql_mode` is never amended; statements run as the server reads them.
//! Invariants: Statement rejection surfaces before the first byte is streamed.
//! Notes: Rows are fetched over the text protocol so every value arrives in its
//! natural MySQL rendering; values are never re-formatted client-side.

use std::future::Future;

use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use sqlx::mysql::{MySqlColumn, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Executor, Row, Statement as _};

use crate::core::config::DatabaseConfig;
use crate::core::cursor::{Connection, Connector, ResultCursor, RowValues};
use crate::core::error::{Error, ErrorKind};

const CHARSET: &str = "utf8mb4";

#[derive(Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.name)
            .charset(CHARSET)
            .timezone(None::<String>)
            .pipes_as_concat(false)
            .no_engine_substitution(false)
            .disable_statement_logging();
        Self { options }
    }
}

impl Connector for MySqlConnector {
    type Connection = MySqlSession;

    fn connect(&self) -> impl Future<Output = Result<MySqlSession, Error>> + Send {
        async move {
            let conn = self.options.connect().await.map_err(|err| {
                Error::new(ErrorKind::Connection)
                    .with_message("error connecting to database")
                    .with_source(err)
            })?;
            Ok(MySqlSession { conn })
        }
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
}

impl Connection for MySqlSession {
    type Cursor<'c>
        = MySqlCursor<'c>
    where
        Self: 'c;

    fn query<'c>(
        &'c mut self,
        statement: &'c str,
    ) -> impl Future<Output = Result<MySqlCursor<'c>, Error>> + Send + 'c {
        async move {
            let described: Vec<String> = {
                let prepared = (&mut self.conn)
                    .prepare(statement)
                    .await
                    .map_err(query_error)?;
                column_names(prepared.columns())
            };

            let mut rows = (&mut self.conn).fetch(statement);
            let first = rows.try_next().await.map_err(query_error)?;
            // Procedure calls describe no columns until they run.
            let columns = result_columns(
                described,
                first.as_ref().map(|row| column_names(row.columns())),
            )?;
            Ok(MySqlCursor {
                columns,
                first,
                rows,
            })
        }
    }

    fn close(self) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            sqlx::Connection::close(self.conn).await.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("error closing database connection")
                    .with_source(err)
            })
        }
    }
}

pub struct MySqlCursor<'c> {
    columns: Vec<String>,
    first: Option<MySqlRow>,
    rows: BoxStream<'c, Result<MySqlRow, sqlx::Error>>,
}

impl ResultCursor for MySqlCursor<'_> {
    fn columns(&self) -> Result<Vec<String>, Error> {
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> impl Future<Output = Result<Option<RowValues>, Error>> + Send {
        async move {
            let row = match self.first.take() {
                Some(row) => Some(row),
                None => self.rows.try_next().await.map_err(|err| {
                    Error::new(ErrorKind::Row)
                        .with_message("error fetching results")
                        .with_source(err)
                })?,
            };
            row.map(|row| row_values(&row, &self.columns)).transpose()
        }
    }
}

fn column_names(columns: &[MySqlColumn]) -> Vec<String> {
    columns
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

fn result_columns(
    described: Vec<String>,
    first_row: Option<Vec<String>>,
) -> Result<Vec<String>, Error> {
    if !described.is_empty() {
        return Ok(described);
    }
    match first_row {
        Some(names) if !names.is_empty() => Ok(names),
        _ => Err(Error::new(ErrorKind::Metadata)
            .with_message("statement does not return a result set")),
    }
}

fn row_values(row: &MySqlRow, columns: &[String]) -> Result<RowValues, Error> {
    check_width(row.len(), columns.len())?;
    (0..row.len()).map(|idx| cell_text(row, idx)).collect()
}

fn check_width(found: usize, expected: usize) -> Result<(), Error> {
    if found != expected {
        return Err(Error::new(ErrorKind::Row).with_message(format!(
            "row has {found} columns but the statement described {expected}"
        )));
    }
    Ok(())
}

fn cell_text(row: &MySqlRow, idx: usize) -> Result<Option<String>, Error> {
    let raw = row.try_get_unchecked::<Option<Vec<u8>>, _>(idx).map_err(|err| {
        let name = row
            .columns()
            .get(idx)
            .map(|column| column.name().to_string())
            .unwrap_or_default();
        Error::new(ErrorKind::Row)
            .with_message(format!("error reading column {name}"))
            .with_source(err)
    })?;
    Ok(raw.map(|bytes| match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }))
}

fn query_error(err: sqlx::Error) -> Error {
    Error::new(ErrorKind::Query)
        .with_message("error running query")
        .with_source(err)
}
