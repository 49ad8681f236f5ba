//! Purpose: Load and validate the YAML gateway configuration.
//! Exports: `Config`, `DatabaseConfig`, `QueryConfig`.
//! Role: Single parse point for connection parameters and the named query list.
//! Invariants: The loaded config is read-only; the registry is built from it once.
//! Invariants: Credentials never appear in `Debug` output.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct QueryConfig {
    pub name: String,
    pub query: String,
}

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Config)
                .with_message("error opening configuration file")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_yaml_str(&text).map_err(|err| err.with_path(path))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, Error> {
        let config: Config = serde_yaml::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Config)
                .with_message("error decoding configuration file")
                .with_source(err)
        })?;
        config.validate()?;
        config.warn_duplicate_names();
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let db = &self.database;
        if db.host.trim().is_empty() {
            return Err(Error::new(ErrorKind::Config).with_message("database.host must not be empty"));
        }
        if db.port == 0 {
            return Err(Error::new(ErrorKind::Config).with_message("database.port must be non-zero"));
        }
        if db.name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Config).with_message("database.name must not be empty"));
        }
        for (index, query) in self.queries.iter().enumerate() {
            if query.name.trim().is_empty() {
                return Err(Error::new(ErrorKind::Config)
                    .with_message(format!("queries[{index}].name must not be empty")));
            }
            if query.query.trim().is_empty() {
                return Err(Error::new(ErrorKind::Config)
                    .with_message(format!("queries[{index}].query must not be empty"))
                    .with_query_id(query.name.clone()));
            }
        }
        Ok(())
    }

    fn warn_duplicate_names(&self) {
        let mut seen = HashSet::new();
        for query in &self.queries {
            if !seen.insert(query.name.to_lowercase()) {
                tracing::warn!(
                    query = %query.name,
                    "duplicate query name; the earlier definition wins"
                );
            }
        }
    }
}
