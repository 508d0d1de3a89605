#![allow(dead_code)]

use sqlkit_core::{Database, DbLogger, LogContext};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: &'static str,
    pub message: String,
    pub context: Vec<(String, String)>,
}

impl LogRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn with_level(&self, level: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    fn push(&self, level: &'static str, message: &str, context: LogContext<'_>) {
        self.records.lock().unwrap().push(LogRecord {
            level,
            message: message.to_string(),
            context: context
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        });
    }
}

impl DbLogger for RecordingLogger {
    fn info(&self, message: &str, context: LogContext<'_>) {
        self.push("info", message, context);
    }

    fn debug(&self, message: &str, context: LogContext<'_>) {
        self.push("debug", message, context);
    }

    fn error(&self, message: &str, context: LogContext<'_>) {
        self.push("error", message, context);
    }
}

/// Creates an empty database file inside a fresh temp dir.
pub fn empty_db_file() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.sqlite3");
    File::create(&path).unwrap();
    (dir, path)
}

pub fn open_with_logger(path: &Path) -> (Database, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::default());
    let db = Database::with_logger(path, logger.clone());
    (db, logger)
}
