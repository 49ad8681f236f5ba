//! Purpose: Library crate backing the `querygate` binary and its integration tests.
//! Exports: `core` (errors, config, registry, CSV, streaming), `db` (drivers), `serve` (HTTP).
//! Role: Serves a fixed, configured set of named SQL queries as streaming CSV.
//! Invariants: Clients only ever name a query; SQL text comes from configuration alone.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
pub mod db;
pub mod serve;
