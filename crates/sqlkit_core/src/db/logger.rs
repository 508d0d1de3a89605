//! Injected logging capability for the access layer.
//!
//! # Responsibility
//! - Define the `info/debug/error` contract a [`Database`](super::Database)
//!   reports through.
//! - Provide [`LogCrateLogger`], which forwards to the `log` facade.
//!
//! # Invariants
//! - A database built without a logger emits nothing.
//! - Forwarded records are single-line and length-capped.

use crate::logging::single_line;
use log::{debug, error, info};

/// Ordered key/value pairs attached to one log record.
pub type LogContext<'a> = &'a [(&'a str, String)];

/// Logging collaborator accepted by [`Database`](super::Database).
pub trait DbLogger: Send + Sync {
    fn info(&self, message: &str, context: LogContext<'_>);
    fn debug(&self, message: &str, context: LogContext<'_>);
    fn error(&self, message: &str, context: LogContext<'_>);
}

const MAX_CONTEXT_VALUE_CHARS: usize = 512;

/// Forwards records to the `log` facade as `event=<message> module=db k=v ...`.
///
/// Pair with [`crate::init_logging`] to get rolling file output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrateLogger;

impl DbLogger for LogCrateLogger {
    fn info(&self, message: &str, context: LogContext<'_>) {
        info!("{}", format_record(message, context));
    }

    fn debug(&self, message: &str, context: LogContext<'_>) {
        debug!("{}", format_record(message, context));
    }

    fn error(&self, message: &str, context: LogContext<'_>) {
        error!("{}", format_record(message, context));
    }
}

fn format_record(message: &str, context: LogContext<'_>) -> String {
    let mut record = format!("event={message} module=db");
    for (key, value) in context {
        record.push(' ');
        record.push_str(key);
        record.push('=');
        record.push_str(&single_line(value, MAX_CONTEXT_VALUE_CHARS));
    }
    record
}
