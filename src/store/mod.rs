//! Per-entity repositories over the workspace database. SQL stays behind
//! this boundary; handlers deal in typed records and `StoreError`.

pub mod assignments;
pub mod attendance;
pub mod clubs;
pub mod feed;
pub mod fees;
pub mod fundraising;
pub mod materials;
pub mod notifications;
pub mod reports;
pub mod subjects;
pub mod timetable;
pub mod users;

use std::fmt;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    NotFound(&'static str),
    VersionConflict { expected: i64, actual: i64 },
    Invalid(String),
    Db(rusqlite::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::VersionConflict { expected, actual } => write!(
                f,
                "stale version token: expected {expected}, record is at {actual}"
            ),
            Self::Invalid(message) => write!(f, "{message}"),
            Self::Db(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(e)
    }
}

/// Optimistic-concurrency check: a caller that sends a token must hold the
/// current version; a caller that sends none gets last-write-wins.
pub(crate) fn check_version(expected: Option<i64>, actual: i64) -> StoreResult<()> {
    if let Some(expected) = expected {
        if expected != actual {
            return Err(StoreError::VersionConflict { expected, actual });
        }
    }
    Ok(())
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
