// Core modules implementing configuration, lookup, encoding and streaming.
pub mod config;
pub mod csv;
pub mod cursor;
pub mod error;
pub mod registry;
pub mod stream;
