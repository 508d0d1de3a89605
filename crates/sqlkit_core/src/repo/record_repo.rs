//! Generic table-scoped CRUD over a [`Database`].
//!
//! # Responsibility
//! - Build insert/select/update/delete statements for one table keyed by one
//!   primary-key column.
//! - Quote every table and column identifier.
//!
//! # Invariants
//! - Column values bind under generated names (`:v0`, `:v1`, ...) and the key
//!   filter under `:pk`, so no column name can shadow the key binding.
//! - Empty writes fail before any statement reaches the engine.
//! - Rejected writes and missing rows are reported through the database logger.
//! - The repository never mutates the connection handle itself.

use crate::db::{Database, DatabaseError, DbResult, ParamKey, Params, Row, Value};

const DEFAULT_PRIMARY_KEY: &str = "id";
const KEY_PARAM: &str = "pk";

/// Column name → value pairs for one write.
pub type Record = Row;

/// Repository interface for generic record CRUD.
pub trait RecordRepository {
    /// Inserts `data` and returns the new rowid.
    fn create(&self, data: &Record) -> DbResult<i64>;
    /// Loads the row whose primary key equals `id`.
    fn find(&self, id: impl Into<Value>) -> DbResult<Option<Row>>;
    /// Like [`find`](Self::find), but a missing row is an error.
    fn find_or_fail(&self, id: impl Into<Value>) -> DbResult<Row>;
    /// Loads every row of the table.
    fn all(&self) -> DbResult<Vec<Row>>;
    /// Writes `data` into the row keyed by `id`; returns affected rows.
    fn update(&self, id: impl Into<Value>, data: &Record) -> DbResult<usize>;
    /// Deletes the row keyed by `id`; returns affected rows (0 when absent).
    fn delete(&self, id: impl Into<Value>) -> DbResult<usize>;
    /// Counts every row of the table.
    fn count(&self) -> DbResult<i64>;
    /// Returns whether a row keyed by `id` exists.
    fn exists(&self, id: impl Into<Value>) -> DbResult<bool>;
}

/// SQLite-backed repository for one table.
pub struct SqliteRecordRepository<'db> {
    db: &'db Database,
    table: String,
    primary_key: String,
}

impl<'db> SqliteRecordRepository<'db> {
    /// Creates a repository keyed by the `id` column.
    pub fn new(db: &'db Database, table: impl Into<String>) -> Self {
        Self::with_primary_key(db, table, DEFAULT_PRIMARY_KEY)
    }

    pub fn with_primary_key(
        db: &'db Database,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            db,
            table: table.into(),
            primary_key: primary_key.into(),
        }
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn key_filter(&self) -> String {
        format!("{} = :{KEY_PARAM}", quote_identifier(&self.primary_key))
    }

    fn key_params(id: Value) -> Params {
        Params::new().bind(KEY_PARAM, id)
    }

    fn empty_data(&self, operation: &'static str) -> DatabaseError {
        let err = DatabaseError::EmptyData {
            operation,
            table: self.table.clone(),
        };
        self.db.log_error(
            "repo_write",
            &[
                ("status", "error".to_string()),
                ("table", self.table.clone()),
                ("operation", operation.to_string()),
                ("error", err.to_string()),
            ],
        );
        err
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn create(&self, data: &Record) -> DbResult<i64> {
        if data.is_empty() {
            return Err(self.empty_data("insert into"));
        }

        let columns = data
            .keys()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (0..data.len())
            .map(|index| format!(":{}", value_param(index)))
            .collect::<Vec<_>>()
            .join(", ");
        let params = data
            .values()
            .enumerate()
            .map(|(index, value)| (value_param(index), value.clone()))
            .collect::<Params>();

        self.db.execute(
            &format!(
                "INSERT INTO {} ({columns}) VALUES ({placeholders})",
                quote_identifier(&self.table)
            ),
            &params,
        )?;
        self.db.last_insert_id()
    }

    fn find(&self, id: impl Into<Value>) -> DbResult<Option<Row>> {
        self.db.fetch_one(
            &format!(
                "SELECT * FROM {} WHERE {} LIMIT 1",
                quote_identifier(&self.table),
                self.key_filter()
            ),
            &Self::key_params(id.into()),
        )
    }

    fn find_or_fail(&self, id: impl Into<Value>) -> DbResult<Row> {
        let id = id.into();
        match self.find(id.clone())? {
            Some(row) => Ok(row),
            None => {
                let id = id.to_string();
                self.db.log_error(
                    "not_found",
                    &[
                        ("status", "error".to_string()),
                        ("table", self.table.clone()),
                        ("column", self.primary_key.clone()),
                        ("id", id.clone()),
                    ],
                );
                Err(DatabaseError::NotFound {
                    table: self.table.clone(),
                    column: self.primary_key.clone(),
                    id,
                })
            }
        }
    }

    fn all(&self) -> DbResult<Vec<Row>> {
        self.db.fetch_all(
            &format!("SELECT * FROM {}", quote_identifier(&self.table)),
            &Params::new(),
        )
    }

    fn update(&self, id: impl Into<Value>, data: &Record) -> DbResult<usize> {
        if data.is_empty() {
            return Err(self.empty_data("update"));
        }

        let assignments = data
            .keys()
            .enumerate()
            .map(|(index, column)| {
                format!("{} = :{}", quote_identifier(column), value_param(index))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut params = Self::key_params(id.into());
        for (index, value) in data.values().enumerate() {
            params.insert(ParamKey::Name(value_param(index)), value.clone());
        }

        self.db.execute(
            &format!(
                "UPDATE {} SET {assignments} WHERE {}",
                quote_identifier(&self.table),
                self.key_filter()
            ),
            &params,
        )
    }

    fn delete(&self, id: impl Into<Value>) -> DbResult<usize> {
        self.db.execute(
            &format!(
                "DELETE FROM {} WHERE {}",
                quote_identifier(&self.table),
                self.key_filter()
            ),
            &Self::key_params(id.into()),
        )
    }

    fn count(&self) -> DbResult<i64> {
        let count = self.db.fetch_scalar(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.table)),
            &Params::new(),
            0,
        )?;
        Ok(count.and_then(|value| value.as_i64()).unwrap_or(0))
    }

    fn exists(&self, id: impl Into<Value>) -> DbResult<bool> {
        let found = self.db.fetch_scalar(
            &format!(
                "SELECT 1 FROM {} WHERE {} LIMIT 1",
                quote_identifier(&self.table),
                self.key_filter()
            ),
            &Self::key_params(id.into()),
            0,
        )?;
        Ok(found.is_some())
    }
}

/// Quotes a table or column name as a SQLite identifier.
///
/// Embedded double quotes are doubled, so the result is always one token.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_param(index: usize) -> String {
    format!("v{index}")
}
