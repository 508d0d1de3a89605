//! SQLite access layer: lazy connection, statement execution and transactions.
//!
//! # Responsibility
//! - Own the single live SQLite handle of a [`Database`].
//! - Bind typed parameters and decode rows into [`Row`] maps.
//! - Surface every failure as one [`DatabaseError`] type.
//!
//! # Invariants
//! - The handle is either absent or fully configured.
//! - Failures are logged then returned unchanged, never swallowed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod connection;
mod logger;
mod options;
mod params;
mod value;

pub use connection::Database;
pub use logger::{DbLogger, LogCrateLogger, LogContext};
pub use options::DatabaseOptions;
pub use params::{ParamKey, Params};
pub use value::{Row, Value};

pub type DbResult<T> = Result<T, DatabaseError>;

/// Every failure raised by the access layer.
#[derive(Debug)]
pub enum DatabaseError {
    /// The backing file is absent; the engine was not opened.
    MissingFile(PathBuf),
    /// The backing file exists but cannot be read.
    UnreadableFile { path: PathBuf, reason: String },
    /// The engine refused to open or configure the connection.
    Connect(rusqlite::Error),
    /// Statement preparation, binding, execution or transaction control failed.
    Sqlite(rusqlite::Error),
    /// A named parameter has no matching placeholder in the statement.
    UnknownParameter(String),
    /// A write was requested with no columns.
    EmptyData {
        operation: &'static str,
        table: String,
    },
    /// `find_or_fail` found no row.
    NotFound {
        table: String,
        column: String,
        id: String,
    },
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFile(path) => {
                write!(f, "database file does not exist: {}", path.display())
            }
            Self::UnreadableFile { path, reason } => write!(
                f,
                "database file not readable: {} ({reason})",
                path.display()
            ),
            Self::Connect(err) => write!(f, "{err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnknownParameter(name) => {
                write!(f, "statement has no placeholder for parameter `{name}`")
            }
            Self::EmptyData { operation, table } => {
                write!(f, "cannot {operation} `{table}` with empty data")
            }
            Self::NotFound { table, column, id } => {
                write!(f, "no row in `{table}` where `{column}` = {id}")
            }
        }
    }
}

impl Error for DatabaseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connect(err) | Self::Sqlite(err) => Some(err),
            Self::MissingFile(_)
            | Self::UnreadableFile { .. }
            | Self::UnknownParameter(_)
            | Self::EmptyData { .. }
            | Self::NotFound { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
