use jiff::{RoundMode, Timestamp, TimestampRound, Unit};
use serde::Serialize;

use super::error::HistoryError;

/// One observation of concurrent users for an app.
/// `time` is always whole seconds, `count` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub time: Timestamp,
    pub count: i64,
}

impl Sample {
    /// Validates `count` and floors `time` to second resolution
    pub fn new(time: Timestamp, count: i64) -> Result<Self, HistoryError> {
        if count < 0 {
            return Err(HistoryError::NegativeCount(count));
        }
        Ok(Self {
            time: Timestamp::from_second(floor_second(time)?)?,
            count,
        })
    }

    pub(crate) fn from_row((secs, count): (i64, i64)) -> Result<Self, HistoryError> {
        Ok(Self {
            time: Timestamp::from_second(secs)?,
            count,
        })
    }

    pub fn to_point(&self) -> HistoryPoint {
        HistoryPoint(self.time.as_millisecond(), self.count)
    }
}

/// Last whole unix second at or before `time`
pub fn floor_second(time: Timestamp) -> Result<i64, HistoryError> {
    round_second(time, RoundMode::Floor)
}

/// First whole unix second at or after `time`
pub fn ceil_second(time: Timestamp) -> Result<i64, HistoryError> {
    round_second(time, RoundMode::Ceil)
}

fn round_second(time: Timestamp, mode: RoundMode) -> Result<i64, HistoryError> {
    let rounded = time.round(TimestampRound::new().smallest(Unit::Second).mode(mode))?;
    Ok(rounded.as_second())
}

/// `[unix millis, count]`, the shape charting frontends consume directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryPoint(pub i64, pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Peak {
    pub count: i64,
    pub time: Timestamp,
}
