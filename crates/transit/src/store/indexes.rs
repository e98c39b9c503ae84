//! Secondary indexes kept in lockstep with the primary collections.
//!
//! Every index is an ordered set of tuples whose leading fields are the
//! lookup attribute, so equality and range lookups are `BTreeSet::range`
//! scans over a prefix.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use chrono::NaiveDateTime;

use crate::identifiers::*;
use crate::models::records::*;

/// Reverse lookup from a stop to the lines serving it.
///
/// Keyed `(stop_id, line_id)` to the sequence number; since a stop appears
/// at most once per line this doubles as the `(line_id, stop_id)` uniqueness
/// index.
#[derive(Clone, Debug, Default)]
pub(crate) struct LineStopIndexes {
    pub by_stop: BTreeMap<(StopId, LineId), u32>,
}

impl LineStopIndexes {
    pub fn insert(&mut self, line_stop: &LineStop) {
        self.by_stop
            .insert((line_stop.stop_id, line_stop.line_id), line_stop.sequence_number);
    }

    pub fn remove(&mut self, line_stop: &LineStop) {
        self.by_stop.remove(&(line_stop.stop_id, line_stop.line_id));
    }

    pub fn sequence_of(&self, line_id: LineId, stop_id: StopId) -> Option<u32> {
        self.by_stop.get(&(stop_id, line_id)).copied()
    }

    pub fn lines_at(&self, stop_id: StopId) -> impl Iterator<Item = (LineId, u32)> + '_ {
        self.by_stop
            .range((stop_id, LineId::MIN)..=(stop_id, LineId::MAX))
            .map(|(&(_, line_id), &sequence)| (line_id, sequence))
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TripIndexes {
    pub by_line: BTreeSet<(LineId, NaiveDateTime, TripIdentifier)>,
    pub by_departure: BTreeSet<(NaiveDateTime, TripIdentifier)>,
    pub natural_keys: HashMap<(LineId, NaiveDateTime, VehicleIdentifier), TripIdentifier>,
}

impl TripIndexes {
    pub fn insert(&mut self, trip: &Trip) {
        self.by_line
            .insert((trip.line_id, trip.scheduled_departure, trip.id.clone()));
        self.by_departure
            .insert((trip.scheduled_departure, trip.id.clone()));
        self.natural_keys.insert(trip.natural_key(), trip.id.clone());
    }

    pub fn remove(&mut self, trip: &Trip) {
        self.by_line
            .remove(&(trip.line_id, trip.scheduled_departure, trip.id.clone()));
        self.by_departure
            .remove(&(trip.scheduled_departure, trip.id.clone()));
        self.natural_keys.remove(&trip.natural_key());
    }

    /// Trips of one line in departure order, starting at `from`.
    pub fn for_line(
        &self,
        line_id: LineId,
        from: NaiveDateTime,
    ) -> impl Iterator<Item = (NaiveDateTime, &TripIdentifier)> + '_ {
        self.by_line
            .range((line_id, from, TripIdentifier::new(""))..)
            .take_while(move |(line, _, _)| *line == line_id)
            .map(|(_, departure, id)| (*departure, id))
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct StopEventIndexes {
    pub by_stop: BTreeSet<(StopId, StopEventKey)>,
    pub by_scheduled: BTreeSet<(NaiveDateTime, StopEventKey)>,
    pub by_actual: BTreeSet<(NaiveDateTime, StopEventKey)>,
}

impl StopEventIndexes {
    pub fn insert(&mut self, event: &StopEvent) {
        let key = event.key();
        self.by_stop.insert((event.stop_id, key.clone()));
        self.by_scheduled.insert((event.scheduled_time, key.clone()));
        self.by_actual.insert((event.actual_time, key));
    }

    pub fn remove(&mut self, event: &StopEvent) {
        let key = event.key();
        self.by_stop.remove(&(event.stop_id, key.clone()));
        self.by_scheduled.remove(&(event.scheduled_time, key.clone()));
        self.by_actual.remove(&(event.actual_time, key));
    }

    pub fn at_stop(&self, stop_id: StopId) -> impl Iterator<Item = &StopEventKey> + '_ {
        self.by_stop
            .range((stop_id, StopEventKey::lowest())..)
            .take_while(move |(stop, _)| *stop == stop_id)
            .map(|(_, key)| key)
    }

    /// Keys whose scheduled time falls in `[from, to)`.
    pub fn scheduled_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> impl Iterator<Item = &StopEventKey> + '_ {
        time_range(&self.by_scheduled, from, to)
    }

    /// Keys whose actual time falls in `[from, to)`.
    pub fn arrived_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> impl Iterator<Item = &StopEventKey> + '_ {
        time_range(&self.by_actual, from, to)
    }

    /// Keys whose actual time is at or after `from`, ordered by actual time.
    pub fn arrived_from(&self, from: NaiveDateTime) -> impl Iterator<Item = &StopEventKey> + '_ {
        self.by_actual
            .range((Bound::Included((from, StopEventKey::lowest())), Bound::Unbounded))
            .map(|(_, key)| key)
    }

    pub fn earliest_scheduled(&self) -> Option<NaiveDateTime> {
        self.by_scheduled.first().map(|(scheduled, _)| *scheduled)
    }
}

fn time_range(
    index: &BTreeSet<(NaiveDateTime, StopEventKey)>,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> impl Iterator<Item = &StopEventKey> + '_ {
    // BTreeSet::range panics on inverted bounds
    let to = to.max(from);
    index
        .range((
            Bound::Included((from, StopEventKey::lowest())),
            Bound::Excluded((to, StopEventKey::lowest())),
        ))
        .map(|(_, key)| key)
}
