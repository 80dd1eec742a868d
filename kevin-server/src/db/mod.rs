pub mod connection;
pub mod repositories;
pub mod schema;

pub use connection::{Database, DbPool};

use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC3339 so timestamps sort lexically in SQL.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp column, surfacing bad data as a conversion error.
pub(crate) fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    value.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
