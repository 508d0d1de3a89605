//! Lazily connected SQLite handle with execute/fetch/transaction primitives.
//!
//! # Responsibility
//! - Validate the backing file and open it on first use.
//! - Run parameterized statements and decode rows.
//! - Wrap units of work in commit/rollback.
//!
//! # Invariants
//! - Construction never touches the file system.
//! - The handle slot is `None` or holds a configured connection.
//! - `close()` is idempotent and later calls reconnect transparently.
//! - Transaction nesting is left to SQLite: `BEGIN` inside an open
//!   transaction fails with the engine's error.
//!
//! # Concurrency
//! - One connection per `Database`, no locking. The type is `Send` but not
//!   `Sync`; share it across threads only behind external synchronization.

use super::logger::{DbLogger, LogContext};
use super::options::DatabaseOptions;
use super::params::Params;
use super::value::{Row, Value};
use super::{DatabaseError, DbResult};
use rusqlite::{Connection, OpenFlags, Row as SqliteRow, Statement};
use std::cell::{RefCell, RefMut};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const TABLE_EXISTS_SQL: &str = "SELECT 1
FROM sqlite_master
WHERE type = 'table' AND name = ?1
LIMIT 1";

/// Connection manager owning one lazily opened SQLite connection.
pub struct Database {
    path: PathBuf,
    options: DatabaseOptions,
    logger: Option<Arc<dyn DbLogger>>,
    conn: RefCell<Option<Connection>>,
}

impl Database {
    /// Creates an unconnected manager for the database file at `path`.
    ///
    /// The file is not required to exist until the first operation runs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, DatabaseOptions::default(), None)
    }

    /// Creates an unconnected manager that reports through `logger`.
    pub fn with_logger(path: impl Into<PathBuf>, logger: Arc<dyn DbLogger>) -> Self {
        Self::with_options(path, DatabaseOptions::default(), Some(logger))
    }

    pub fn with_options(
        path: impl Into<PathBuf>,
        options: DatabaseOptions,
        logger: Option<Arc<dyn DbLogger>>,
    ) -> Self {
        Self {
            path: path.into(),
            options,
            logger,
            conn: RefCell::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Returns whether a live handle is currently held.
    pub fn is_connected(&self) -> bool {
        self.conn.borrow().is_some()
    }

    /// Returns whether the live handle has an open transaction.
    ///
    /// Never connects; an unconnected manager reports `false`.
    pub fn in_transaction(&self) -> bool {
        self.conn
            .borrow()
            .as_ref()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    /// Runs a non-query statement and returns the affected row count.
    ///
    /// # Errors
    /// - Connection failures (missing/unreadable file, engine open failure).
    /// - Prepare, bind or execution failures, logged with query and params.
    pub fn execute(&self, query: &str, params: &Params) -> DbResult<usize> {
        self.run_statement(query, params, |stmt| Ok(stmt.raw_execute()?))
    }

    /// Returns the first result row, or `None` when the result set is empty.
    pub fn fetch_one(&self, query: &str, params: &Params) -> DbResult<Option<Row>> {
        self.run_statement(query, params, |stmt| {
            let columns = column_names(stmt);
            let mut rows = stmt.raw_query();
            rows.next()?.map(|row| decode_row(row, &columns)).transpose()
        })
    }

    /// Returns every result row; empty when nothing matches.
    pub fn fetch_all(&self, query: &str, params: &Params) -> DbResult<Vec<Row>> {
        self.run_statement(query, params, |stmt| {
            let columns = column_names(stmt);
            let mut rows = stmt.raw_query();
            let mut decoded = Vec::new();
            while let Some(row) = rows.next()? {
                decoded.push(decode_row(row, &columns)?);
            }
            Ok(decoded)
        })
    }

    /// Returns the zero-based `column` of the first row.
    ///
    /// `None` means no row; a NULL cell is `Some(Value::Null)`.
    pub fn fetch_scalar(
        &self,
        query: &str,
        params: &Params,
        column: usize,
    ) -> DbResult<Option<Value>> {
        self.run_statement(query, params, |stmt| {
            let mut rows = stmt.raw_query();
            match rows.next()? {
                Some(row) => Ok(Some(row.get::<_, Value>(column)?)),
                None => Ok(None),
            }
        })
    }

    pub fn begin_transaction(&self) -> DbResult<()> {
        self.transaction_control("BEGIN")
    }

    pub fn commit(&self) -> DbResult<()> {
        self.transaction_control("COMMIT")
    }

    pub fn rollback(&self) -> DbResult<()> {
        self.transaction_control("ROLLBACK")
    }

    /// Runs `work` inside one transaction.
    ///
    /// Commits when `work` returns `Ok`. When it returns `Err` or panics, the
    /// transaction is rolled back and the original error (or panic) is
    /// propagated unchanged. No retry is attempted.
    ///
    /// # Errors
    /// - `BEGIN` or `COMMIT` failures, converted into `E`.
    /// - Whatever `work` returned.
    pub fn run_in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DatabaseError> + Display,
    {
        self.begin_transaction()?;

        match panic::catch_unwind(AssertUnwindSafe(|| work(self))) {
            Ok(Ok(value)) => {
                if let Err(err) = self.commit() {
                    self.rollback_after_failure();
                    return Err(err.into());
                }
                Ok(value)
            }
            Ok(Err(err)) => {
                self.log_error(
                    "transaction",
                    &[
                        ("status", "rolled_back".to_string()),
                        ("error", err.to_string()),
                    ],
                );
                self.rollback_after_failure();
                Err(err)
            }
            Err(payload) => {
                self.log_error(
                    "transaction",
                    &[
                        ("status", "rolled_back".to_string()),
                        ("error", "unit of work panicked".to_string()),
                    ],
                );
                self.rollback_after_failure();
                panic::resume_unwind(payload)
            }
        }
    }

    /// Returns whether a table named `name` exists in the schema catalog.
    pub fn table_exists(&self, name: &str) -> DbResult<bool> {
        let found = self.fetch_scalar(TABLE_EXISTS_SQL, &Params::positional([name]), 0)?;
        Ok(found.is_some())
    }

    /// Returns the rowid assigned by the most recent insert on this handle.
    pub fn last_insert_id(&self) -> DbResult<i64> {
        Ok(self.handle()?.last_insert_rowid())
    }

    /// Drops the live handle if one is held.
    ///
    /// The next operation reconnects lazily.
    pub fn close(&self) {
        let Some(conn) = self.conn.borrow_mut().take() else {
            self.log_debug("db_close", &[("status", "noop".to_string())]);
            return;
        };

        match conn.close() {
            Ok(()) => self.log_info(
                "db_close",
                &[
                    ("status", "ok".to_string()),
                    ("path", self.path.display().to_string()),
                ],
            ),
            // The handle is released on drop either way.
            Err((_conn, err)) => self.log_error(
                "db_close",
                &[
                    ("status", "error".to_string()),
                    ("path", self.path.display().to_string()),
                    ("error", err.to_string()),
                ],
            ),
        }
    }

    fn run_statement<T>(
        &self,
        query: &str,
        params: &Params,
        run: impl FnOnce(&mut Statement<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        self.log_debug(
            "query",
            &[("sql", query.to_string()), ("params", params.to_string())],
        );

        let conn = self.handle()?;
        let result = prepare_and_run(&conn, query, params, run);
        drop(conn);

        if let Err(err) = &result {
            self.log_error(
                "query",
                &[
                    ("status", "error".to_string()),
                    ("sql", query.to_string()),
                    ("params", params.to_string()),
                    ("error", err.to_string()),
                ],
            );
        }
        result
    }

    fn transaction_control(&self, statement: &'static str) -> DbResult<()> {
        let conn = self.handle()?;
        let result = conn.execute_batch(statement);
        drop(conn);

        result.map_err(|err| {
            self.log_error(
                "transaction",
                &[
                    ("status", "error".to_string()),
                    ("statement", statement.to_string()),
                    ("error", err.to_string()),
                ],
            );
            DatabaseError::Sqlite(err)
        })
    }

    // `work` may have closed the handle or finished the transaction itself.
    fn rollback_after_failure(&self) {
        if self.in_transaction() {
            let _ = self.rollback();
        }
    }

    fn handle(&self) -> DbResult<RefMut<'_, Connection>> {
        let mut slot = self.conn.borrow_mut();
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.open_connection()?,
        };
        Ok(RefMut::map(slot, |slot| slot.insert(conn)))
    }

    fn open_connection(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = if self.options.read_only {
            "read_only"
        } else {
            "read_write"
        };
        self.log_info(
            "db_open",
            &[
                ("status", "start".to_string()),
                ("mode", mode.to_string()),
                ("path", self.path.display().to_string()),
            ],
        );

        let result =
            ensure_readable_file(&self.path).and_then(|()| connect(&self.path, &self.options));
        match &result {
            Ok(_) => self.log_info(
                "db_open",
                &[
                    ("status", "ok".to_string()),
                    ("mode", mode.to_string()),
                    ("duration_ms", started_at.elapsed().as_millis().to_string()),
                ],
            ),
            Err(err) => self.log_error(
                "db_open",
                &[
                    ("status", "error".to_string()),
                    ("mode", mode.to_string()),
                    ("duration_ms", started_at.elapsed().as_millis().to_string()),
                    ("error", err.to_string()),
                ],
            ),
        }
        result
    }

    fn log_info(&self, message: &str, context: LogContext<'_>) {
        if let Some(logger) = &self.logger {
            logger.info(message, context);
        }
    }

    fn log_debug(&self, message: &str, context: LogContext<'_>) {
        if let Some(logger) = &self.logger {
            logger.debug(message, context);
        }
    }

    /// Reports a failure detected above the statement layer.
    pub(crate) fn log_error(&self, message: &str, context: LogContext<'_>) {
        if let Some(logger) = &self.logger {
            logger.error(message, context);
        }
    }
}

fn ensure_readable_file(path: &Path) -> DbResult<()> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(DatabaseError::MissingFile(path.to_path_buf()));
        }
        Err(err) => {
            return Err(DatabaseError::UnreadableFile {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    };

    if !metadata.is_file() {
        return Err(DatabaseError::UnreadableFile {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    File::open(path).map_err(|err| DatabaseError::UnreadableFile {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    Ok(())
}

fn connect(path: &Path, options: &DatabaseOptions) -> DbResult<Connection> {
    let access = if options.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let flags = access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let conn = Connection::open_with_flags(path, flags).map_err(DatabaseError::Connect)?;
    conn.busy_timeout(options.busy_timeout)
        .map_err(DatabaseError::Connect)?;
    conn.pragma_update(None, "foreign_keys", options.foreign_keys)
        .map_err(DatabaseError::Connect)?;
    Ok(conn)
}

fn prepare_and_run<T>(
    conn: &Connection,
    query: &str,
    params: &Params,
    run: impl FnOnce(&mut Statement<'_>) -> DbResult<T>,
) -> DbResult<T> {
    let mut stmt = conn.prepare(query)?;
    params.bind_to(&mut stmt)?;
    run(&mut stmt)
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(str::to_string).collect()
}

fn decode_row(row: &SqliteRow<'_>, columns: &[String]) -> DbResult<Row> {
    let mut decoded = Row::with_capacity(columns.len());
    for (index, name) in columns.iter().enumerate() {
        decoded.insert(name.clone(), row.get::<_, Value>(index)?);
    }
    Ok(decoded)
}
