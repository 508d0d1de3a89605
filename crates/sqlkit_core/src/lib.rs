//! Thin synchronous access layer over an embedded SQLite file.
//! A lazily connected [`Database`] runs parameterized statements and
//! transactions; [`SqliteRecordRepository`] adds generic CRUD on top.

pub mod db;
pub mod logging;
pub mod repo;

pub use db::{
    Database, DatabaseError, DatabaseOptions, DbLogger, DbResult, LogContext, LogCrateLogger,
    ParamKey, Params, Row, Value,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use repo::record_repo::{quote_identifier, Record, RecordRepository, SqliteRecordRepository};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
