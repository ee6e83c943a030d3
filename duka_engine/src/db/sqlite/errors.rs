//! Classification of driver errors into [`StoreError`].
//!
//! SQLite reports missing columns and tables as plain messages, so this is the one place that inspects error text.
use std::sync::OnceLock;

use regex::Regex;

use crate::traits::StoreError;

fn missing_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:no such column:\s*|has no column named\s+)([\w.]+)").unwrap())
}

fn missing_table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"no such table:\s*([\w.]+)").unwrap())
}

fn duplicate_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"UNIQUE constraint failed:\s*([\w.]+)").unwrap())
}

/// The `table.column` named by a uniqueness violation, if the error reports one.
pub(super) fn duplicate_key(error: &StoreError) -> Option<&str> {
    match error {
        StoreError::DatabaseError(message) => {
            duplicate_key_pattern().captures(message).and_then(|caps| caps.get(1)).map(|m| m.as_str())
        },
        _ => None,
    }
}

/// Maps a raw driver message onto a drift variant, if it describes one.
fn classify_message(message: &str) -> Option<StoreError> {
    if let Some(caps) = missing_table_pattern().captures(message) {
        return Some(StoreError::RelationMissing(caps[1].to_string()));
    }
    missing_column_pattern()
        .captures(message)
        .map(|caps| StoreError::SchemaMismatch { missing: format!("column {}", &caps[1]) })
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnNotFound(column) => StoreError::SchemaMismatch { missing: format!("column {column}") },
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                classify_message(&message).unwrap_or(StoreError::DatabaseError(message))
            },
            other => StoreError::DatabaseError(other.to_string()),
        }
    }
}
