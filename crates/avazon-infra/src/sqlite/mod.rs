//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. Ids and timestamps are stored as text.

pub mod avatar;
pub mod content;
pub mod creation;
pub mod pool;
pub mod prompt;
pub mod remix;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use avazon_types::avatar::PageRequest;
use avazon_types::error::RepositoryError;

pub use avatar::SqliteAvatarRepository;
pub use content::SqliteContentRepository;
pub use creation::SqliteCreationRepository;
pub use pool::DatabasePool;
pub use prompt::SqlitePromptRepository;
pub use remix::SqliteRemixRepository;

pub(crate) fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

/// Map a failed INSERT, turning unique violations into `Conflict`.
pub(crate) fn insert_err(e: sqlx::Error, what: impl FnOnce() -> String) -> RepositoryError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict(format!("{} already exists", what()))
        }
        other => query_err(other),
    }
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(query_err)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC so text ordering matches time ordering.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse()
        .map_err(|e| RepositoryError::Query(format!("invalid id '{s}': {e}")))
}

/// Parse a status or enum column through its `FromStr` impl.
pub(crate) fn parse_enum<T: FromStr<Err = String>>(s: &str) -> Result<T, RepositoryError> {
    s.parse().map_err(RepositoryError::Query)
}

pub(crate) fn datetime_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, RepositoryError> {
    parse_datetime(&column::<String>(row, name)?)
}

pub(crate) fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid, RepositoryError> {
    parse_uuid(&column::<String>(row, name)?)
}

pub(crate) fn enum_column<T: FromStr<Err = String>>(row: &SqliteRow, name: &str) -> Result<T, RepositoryError> {
    parse_enum(&column::<String>(row, name)?)
}

/// `(limit, offset)` for a LIMIT/OFFSET clause.
pub(crate) fn page_bounds(page: PageRequest) -> (i64, i64) {
    (i64::from(page.effective_limit()), i64::from(page.offset()))
}
