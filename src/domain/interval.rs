use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A booked time range with both bounds included
///
/// The end is always strictly after the start. Two intervals that only share an endpoint still
/// overlap: a booking ending at 10:00 holds the space at 10:00.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "IntervalFields")]
pub struct Interval {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("end time {end} must be after start time {start}")]
pub struct InvalidInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidInterval> {
        if end <= start {
            return Err(InvalidInterval { start, end });
        }
        Ok(Self {
            start_time: start,
            end_time: end,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Inclusive-bound intersection test: `[a, b]` and `[c, d]` overlap iff `a <= d && c <= b`
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start_time <= other.end_time && other.start_time <= self.end_time
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntervalFields {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl TryFrom<IntervalFields> for Interval {
    type Error = InvalidInterval;

    fn try_from(fields: IntervalFields) -> Result<Self, Self::Error> {
        Interval::new(fields.start_time, fields.end_time)
    }
}
