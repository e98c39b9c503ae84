//! Transit records, their composite keys, and the tagged forms used by the
//! generic ingestion and deletion interface.
//!
//! Stop locations are `geo::Point`s with `x = longitude`, `y = latitude`.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use geo::Point;

use crate::identifiers::*;
use crate::models::types::{EntityKind, VehicleType};

// ============================================================================
// Roots
// ============================================================================

/// Insertion form of a line; the store assigns the `LineId`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewLine {
    pub line_name: String,
    pub vehicle_type: VehicleType,
}

impl NewLine {
    pub fn new(line_name: impl Into<String>, vehicle_type: VehicleType) -> Self {
        Self {
            line_name: line_name.into(),
            vehicle_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Line {
    pub id: LineId,
    pub name: Arc<str>,
    pub vehicle_type: VehicleType,
}

/// Insertion form of a stop; the store assigns the `StopId`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewStop {
    pub stop_name: String,
    pub location: Point,
}

impl NewStop {
    pub fn new(stop_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            stop_name: stop_name.into(),
            location: Point::new(longitude, latitude),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.location.y()
    }

    pub fn longitude(&self) -> f64 {
        self.location.x()
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stop {
    pub id: StopId,
    pub name: Arc<str>,
    pub location: Point,
}

impl Stop {
    pub fn latitude(&self) -> f64 {
        self.location.y()
    }

    pub fn longitude(&self) -> f64 {
        self.location.x()
    }
}

// ============================================================================
// Line itinerary
// ============================================================================

/// Position of a stop within a line's ordered itinerary
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineStop {
    pub line_id: LineId,
    pub stop_id: StopId,
    /// 1-based position along the line
    pub sequence_number: u32,
    /// Minutes from the trip's departure at the first stop
    pub time_offset_minutes: i32,
}

impl LineStop {
    pub fn new(line_id: LineId, stop_id: StopId, sequence_number: u32, time_offset_minutes: i32) -> Self {
        Self {
            line_id,
            stop_id,
            sequence_number,
            time_offset_minutes,
        }
    }

    pub fn key(&self) -> LineStopKey {
        LineStopKey {
            line_id: self.line_id,
            sequence_number: self.sequence_number,
        }
    }
}

/// Ordering is `(line_id, sequence_number)`, so a range over one line yields
/// its stops in itinerary order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineStopKey {
    pub line_id: LineId,
    pub sequence_number: u32,
}

impl LineStopKey {
    pub fn new(line_id: LineId, sequence_number: u32) -> Self {
        Self {
            line_id,
            sequence_number,
        }
    }
}

impl fmt::Display for LineStopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line_id, self.sequence_number)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// One scheduled vehicle run along a line
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trip {
    pub id: TripIdentifier,
    pub line_id: LineId,
    pub scheduled_departure: NaiveDateTime,
    pub vehicle_id: VehicleIdentifier,
}

impl Trip {
    pub fn new(
        id: impl Into<TripIdentifier>,
        line_id: LineId,
        scheduled_departure: NaiveDateTime,
        vehicle_id: impl Into<VehicleIdentifier>,
    ) -> Self {
        Self {
            id: id.into(),
            line_id,
            scheduled_departure,
            vehicle_id: vehicle_id.into(),
        }
    }

    /// No two trips may share this triple.
    pub fn natural_key(&self) -> (LineId, NaiveDateTime, VehicleIdentifier) {
        (self.line_id, self.scheduled_departure, self.vehicle_id.clone())
    }
}

/// A vehicle's scheduled vs. actual arrival at a stop during a trip
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopEvent {
    pub trip_id: TripIdentifier,
    pub stop_id: StopId,
    pub scheduled_time: NaiveDateTime,
    pub actual_time: NaiveDateTime,
    pub passengers_on: i32,
    pub passengers_off: i32,
}

impl StopEvent {
    pub fn new(
        trip_id: impl Into<TripIdentifier>,
        stop_id: StopId,
        scheduled_time: NaiveDateTime,
        actual_time: NaiveDateTime,
        passengers_on: i32,
        passengers_off: i32,
    ) -> Self {
        Self {
            trip_id: trip_id.into(),
            stop_id,
            scheduled_time,
            actual_time,
            passengers_on,
            passengers_off,
        }
    }

    pub fn key(&self) -> StopEventKey {
        StopEventKey {
            trip_id: self.trip_id.clone(),
            stop_id: self.stop_id,
            scheduled_time: self.scheduled_time,
        }
    }

    /// Signed lateness; negative when the vehicle ran early.
    pub fn delay(&self) -> TimeDelta {
        self.actual_time - self.scheduled_time
    }

    /// `true` iff `actual_time > scheduled_time + threshold`. Arriving exactly
    /// at the threshold is on time.
    pub fn is_delayed(&self, threshold: TimeDelta) -> bool {
        self.delay() > threshold
    }

    /// Boardings plus alightings
    pub fn activity(&self) -> i64 {
        i64::from(self.passengers_on) + i64::from(self.passengers_off)
    }
}

/// Ordering is `(trip_id, stop_id, scheduled_time)`, so a range over one trip
/// yields all of its events.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopEventKey {
    pub trip_id: TripIdentifier,
    pub stop_id: StopId,
    pub scheduled_time: NaiveDateTime,
}

impl StopEventKey {
    pub fn new(trip_id: impl Into<TripIdentifier>, stop_id: StopId, scheduled_time: NaiveDateTime) -> Self {
        Self {
            trip_id: trip_id.into(),
            stop_id,
            scheduled_time,
        }
    }

    /// Smallest key belonging to `trip_id`.
    pub(crate) fn first_of(trip_id: &TripIdentifier) -> Self {
        Self::new(trip_id.clone(), StopId::MIN, NaiveDateTime::MIN)
    }

    /// Largest key belonging to `trip_id`.
    pub(crate) fn last_of(trip_id: &TripIdentifier) -> Self {
        Self::new(trip_id.clone(), StopId::MAX, NaiveDateTime::MAX)
    }

    /// Smallest possible key overall; pairs with index prefixes in range scans.
    pub(crate) fn lowest() -> Self {
        Self::new("", StopId::MIN, NaiveDateTime::MIN)
    }
}

impl fmt::Display for StopEventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.trip_id, self.stop_id, self.scheduled_time)
    }
}

// ============================================================================
// Tagged forms
// ============================================================================

/// A candidate record for `TransitStore::insert`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Record {
    Line(NewLine),
    Stop(NewStop),
    LineStop(LineStop),
    Trip(Trip),
    StopEvent(StopEvent),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Line(_) => EntityKind::Line,
            Record::Stop(_) => EntityKind::Stop,
            Record::LineStop(_) => EntityKind::LineStop,
            Record::Trip(_) => EntityKind::Trip,
            Record::StopEvent(_) => EntityKind::StopEvent,
        }
    }
}

/// Primary key of any stored record
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityKey {
    Line(LineId),
    Stop(StopId),
    LineStop(LineStopKey),
    Trip(TripIdentifier),
    StopEvent(StopEventKey),
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityKey::Line(_) => EntityKind::Line,
            EntityKey::Stop(_) => EntityKind::Stop,
            EntityKey::LineStop(_) => EntityKind::LineStop,
            EntityKey::Trip(_) => EntityKind::Trip,
            EntityKey::StopEvent(_) => EntityKind::StopEvent,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Line(id) => write!(f, "line {id}"),
            EntityKey::Stop(id) => write!(f, "stop {id}"),
            EntityKey::LineStop(key) => write!(f, "line_stop {key}"),
            EntityKey::Trip(id) => write!(f, "trip {id}"),
            EntityKey::StopEvent(key) => write!(f, "stop_event {key}"),
        }
    }
}

impl From<LineId> for EntityKey {
    fn from(id: LineId) -> Self {
        EntityKey::Line(id)
    }
}

impl From<StopId> for EntityKey {
    fn from(id: StopId) -> Self {
        EntityKey::Stop(id)
    }
}

impl From<LineStopKey> for EntityKey {
    fn from(key: LineStopKey) -> Self {
        EntityKey::LineStop(key)
    }
}

impl From<TripIdentifier> for EntityKey {
    fn from(id: TripIdentifier) -> Self {
        EntityKey::Trip(id)
    }
}

impl From<StopEventKey> for EntityKey {
    fn from(key: StopEventKey) -> Self {
        EntityKey::StopEvent(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn event(scheduled: NaiveDateTime, actual: NaiveDateTime) -> StopEvent {
        StopEvent::new("T0001", StopId(1), scheduled, actual, 4, 2)
    }

    #[test]
    fn test_stop_event_delay() {
        let late = event(at(8, 0), at(8, 5));
        assert_eq!(late.delay(), TimeDelta::minutes(5));
        assert!(late.is_delayed(TimeDelta::minutes(2)));

        let early = event(at(8, 0), at(7, 58));
        assert_eq!(early.delay(), TimeDelta::minutes(-2));
        assert!(!early.is_delayed(TimeDelta::minutes(2)));
    }

    #[test]
    fn test_delay_threshold_is_strict() {
        let exact = event(at(8, 0), at(8, 2));
        assert!(!exact.is_delayed(TimeDelta::minutes(2)));

        let one_second_over = StopEvent {
            actual_time: at(8, 2) + TimeDelta::seconds(1),
            ..exact
        };
        assert!(one_second_over.is_delayed(TimeDelta::minutes(2)));
    }

    #[test]
    fn test_extreme_thresholds() {
        let late = event(at(8, 0), at(8, 3));
        assert!(late.is_delayed(TimeDelta::MIN));
        assert!(late.is_delayed(TimeDelta::minutes(-10)));
        assert!(!late.is_delayed(TimeDelta::MAX));

        let early = event(at(8, 0), at(7, 55));
        assert!(early.is_delayed(TimeDelta::minutes(-10)));
        assert!(!early.is_delayed(TimeDelta::zero()));
    }

    #[test]
    fn test_stop_event_keys_group_by_trip() {
        let key = event(at(8, 0), at(8, 0)).key();
        let trip = TripIdentifier::new("T0001");
        assert!(StopEventKey::first_of(&trip) <= key);
        assert!(key <= StopEventKey::last_of(&trip));
        assert!(StopEventKey::last_of(&trip) < StopEventKey::first_of(&"T0002".into()));
    }

    #[test]
    fn test_line_stop_key_orders_by_sequence() {
        let a = LineStop::new(LineId(1), StopId(9), 2, 5).key();
        let b = LineStop::new(LineId(1), StopId(3), 10, 30).key();
        let c = LineStop::new(LineId(2), StopId(3), 1, 0).key();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_stop_coordinates() {
        let stop = NewStop::new("Wilshire / Veteran", 34.0589, -118.4452);
        assert_eq!(stop.latitude(), 34.0589);
        assert_eq!(stop.longitude(), -118.4452);
    }

    #[test]
    fn test_entity_key_display() {
        assert_eq!(EntityKey::from(LineStopKey::new(LineId(1), 3)).to_string(), "line_stop (line#1, 3)");
        assert_eq!(EntityKey::from(TripIdentifier::new("T0001")).kind(), EntityKind::Trip);
    }
}
