//! Repository layer: entity-scoped database operations.
//!
//! All public functions are re-exported here so callers can write
//! `db::repository::insert_message(..)` without knowing the file split.

mod encounter;
mod message;

use chrono::{DateTime, SecondsFormat, Utc};

use super::DatabaseError;

pub use encounter::*;
pub use message::*;

/// Fixed-width RFC 3339 (microseconds, `Z`) so that string order in SQLite
/// matches chronological order.
pub(crate) fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_db_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw:?}: {e}")))
}
