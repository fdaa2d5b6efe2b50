use jiff::Timestamp;
use thiserror::Error;

use super::AppId;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("io error `{0}`")]
    Io(#[from] std::io::Error),
    #[error("sqlite error `{0}`")]
    SQLite(#[from] tokio_rusqlite::Error),
    #[error("app {app_id} already has a sample at {time}")]
    DuplicateTime { app_id: AppId, time: Timestamp },
    #[error("app {app_id} has no samples between {start} and {end}")]
    NoSamples {
        app_id: AppId,
        start: Timestamp,
        end: Timestamp,
    },
    #[error("no history store exists for app {0}")]
    StoreNotFound(AppId),
    #[error("user count must be non-negative, got {0}")]
    NegativeCount(i64),
    #[error("interval start {start} is after end {end}")]
    InvertedInterval { start: Timestamp, end: Timestamp },
    #[error("timestamp out of range `{0}`")]
    Timestamp(#[from] jiff::Error),
}

/// Coarse classification callers use to pick a retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    DuplicateTime,
    NotFound,
    InvalidInput,
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::SQLite(_) => ErrorKind::Io,
            Self::DuplicateTime { .. } => ErrorKind::DuplicateTime,
            Self::NoSamples { .. } | Self::StoreNotFound(_) => ErrorKind::NotFound,
            Self::NegativeCount(_) | Self::InvertedInterval { .. } | Self::Timestamp(_) => {
                ErrorKind::InvalidInput
            }
        }
    }
}
