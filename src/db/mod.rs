//! Purpose: Database driver bindings for the connection and cursor contracts.
//! Exports: `mysql` (the MySQL binding used by the binary).

pub mod mysql;
