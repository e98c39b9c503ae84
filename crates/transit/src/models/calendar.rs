//! Date and clock windows for trip listings.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Inclusive window of service days
///
/// An inverted window (`start > end`) contains nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let date = at.date();
        self.start <= date && date <= self.end
    }

    /// Earliest instant inside the window
    pub fn first_instant(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// First instant after the window
    pub fn end_instant(&self) -> NaiveDateTime {
        self.end
            .succ_opt()
            .map_or(NaiveDateTime::MAX, |next| next.and_time(NaiveTime::MIN))
    }
}

/// Half-open clock window `[start, end)`, independent of the date
///
/// When `start > end` the window wraps past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeOfDayWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeOfDayWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let time = at.time();
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}
