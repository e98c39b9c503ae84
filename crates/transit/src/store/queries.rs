//! Listing queries over the store's indexes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};

use super::TransitStore;
use crate::analytics::{self, DelayQuery, DelayedTrip};
use crate::identifiers::*;
use crate::models::calendar::{DateRange, TimeOfDayWindow};
use crate::models::records::*;
use crate::models::types::{Result, TransitError};

/// A stop served by several lines
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TransferStop {
    pub stop_id: StopId,
    pub stop_name: Arc<str>,
    pub line_count: usize,
}

impl TransitStore {
    /// The stops of a line in itinerary order. Unknown lines have no stops.
    pub fn list_stops_for_line(&self, line_id: LineId) -> Vec<(&LineStop, &Stop)> {
        self.line_stops
            .range(LineStopKey::new(line_id, u32::MIN)..=LineStopKey::new(line_id, u32::MAX))
            .filter_map(|(_, line_stop)| Some((line_stop, self.stops.get(&line_stop.stop_id)?)))
            .collect()
    }

    pub fn lines_serving_stop(&self, stop_id: StopId) -> BTreeSet<LineId> {
        self.line_stop_indexes
            .lines_at(stop_id)
            .map(|(line_id, _)| line_id)
            .collect()
    }

    /// Trips of a line in departure order, optionally limited to service days
    /// within `range`.
    pub fn trips_for_line(&self, line_id: LineId, range: Option<DateRange>) -> Vec<&Trip> {
        let from = range.map_or(NaiveDateTime::MIN, |r| r.first_instant());
        self.trip_indexes
            .for_line(line_id, from)
            .take_while(|(departure, _)| range.map_or(true, |r| r.contains(*departure)))
            .filter_map(|(_, id)| self.trips.get(id))
            .collect()
    }

    /// The itinerary of the line a trip runs on.
    pub fn route_for_trip(&self, trip_id: &TripIdentifier) -> Result<Vec<(&LineStop, &Stop)>> {
        let trip = self
            .trips
            .get(trip_id)
            .ok_or_else(|| TransitError::NotFound(EntityKey::Trip(trip_id.clone())))?;
        Ok(self.list_stops_for_line(trip.line_id))
    }

    /// Trips departing inside a clock window on any day, in departure order.
    pub fn trips_departing_within(&self, window: TimeOfDayWindow) -> Vec<&Trip> {
        self.trip_indexes
            .by_departure
            .iter()
            .filter(|(departure, _)| window.contains(*departure))
            .filter_map(|(_, id)| self.trips.get(id))
            .collect()
    }

    /// Stops served by at least `min_lines` distinct lines, busiest first,
    /// ties by name.
    pub fn transfer_stops(&self, min_lines: usize) -> Vec<TransferStop> {
        let mut line_counts: HashMap<StopId, usize> = HashMap::new();
        for &(stop_id, _) in self.line_stop_indexes.by_stop.keys() {
            *line_counts.entry(stop_id).or_default() += 1;
        }

        let mut transfers: Vec<TransferStop> = line_counts
            .into_iter()
            .filter(|&(_, count)| count >= min_lines)
            .filter_map(|(stop_id, line_count)| {
                let stop = self.stops.get(&stop_id)?;
                Some(TransferStop {
                    stop_id,
                    stop_name: stop.name.clone(),
                    line_count,
                })
            })
            .collect();

        transfers.sort_by(|a, b| {
            b.line_count
                .cmp(&a.line_count)
                .then_with(|| a.stop_name.cmp(&b.stop_name))
        });
        transfers
    }

    /// Lines whose itinerary includes every stop in `stop_ids`, by name.
    /// An empty stop list matches nothing.
    pub fn lines_serving_all(&self, stop_ids: &[StopId]) -> Vec<&Line> {
        let Some((&first, rest)) = stop_ids.split_first() else {
            return Vec::new();
        };

        let mut lines: Vec<&Line> = self
            .line_stop_indexes
            .lines_at(first)
            .filter(|&(line_id, _)| {
                rest.iter()
                    .all(|&stop_id| self.line_stop_indexes.sequence_of(line_id, stop_id).is_some())
            })
            .filter_map(|(line_id, _)| self.lines.get(&line_id))
            .collect();

        lines.sort_by(|a, b| a.name.cmp(&b.name));
        lines
    }

    /// Trips with at least `min_count` stop events later than `threshold`,
    /// ordered by trip id.
    pub fn delayed_trips(&self, threshold: TimeDelta, min_count: usize) -> Vec<DelayedTrip> {
        analytics::delayed_trips(self, &DelayQuery::new(threshold, min_count))
    }
}
