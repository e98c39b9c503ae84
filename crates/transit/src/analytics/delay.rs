//! Detection of trips that run late at several stops.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::TimeDelta;
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::identifiers::*;
use crate::models::calendar::DateRange;
use crate::models::records::StopEvent;
use crate::store::TransitStore;

/// How to order [`delayed_trips`] output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DelayOrder {
    /// Ascending trip id
    #[default]
    TripId,
    /// Most delayed stops first, ties by ascending trip id
    CountDescending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayQuery {
    /// Lateness that still counts as on time
    pub threshold: TimeDelta,
    /// Minimum number of delayed stops for a trip to be reported
    pub min_count: usize,
    pub order: DelayOrder,
    /// Only consider events scheduled on these days
    pub window: Option<DateRange>,
}

impl DelayQuery {
    pub fn new(threshold: TimeDelta, min_count: usize) -> Self {
        Self {
            threshold,
            min_count,
            order: DelayOrder::default(),
            window: None,
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.threshold(), config.min_delayed_stops)
    }

    pub fn ordered_by(self, order: DelayOrder) -> Self {
        Self { order, ..self }
    }

    pub fn within(self, window: DateRange) -> Self {
        Self {
            window: Some(window),
            ..self
        }
    }
}

impl Default for DelayQuery {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DelayedTrip {
    pub trip_id: TripIdentifier,
    pub delayed_stop_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LineDelayCount {
    pub line_id: LineId,
    pub line_name: Arc<str>,
    pub delay_count: usize,
}

/// Events that may be delayed.
///
/// With a window, the scheduled-time index bounds the scan. Without one, no
/// event can be late unless it arrived after the earliest scheduled time plus
/// `threshold`, so the actual-time index skips everything before that.
fn candidate_events<'a>(
    store: &'a TransitStore,
    threshold: TimeDelta,
    window: Option<DateRange>,
) -> Box<dyn Iterator<Item = &'a StopEvent> + 'a> {
    let indexes = &store.stop_event_indexes;
    match window {
        Some(range) => Box::new(store.stop_events_scheduled_between(range.first_instant(), range.end_instant())),
        None => match indexes
            .earliest_scheduled()
            .and_then(|earliest| earliest.checked_add_signed(threshold))
        {
            Some(floor) => Box::new(
                indexes
                    .arrived_from(floor)
                    .filter_map(|key| store.stop_event(key)),
            ),
            None => Box::new(store.stop_events()),
        },
    }
}

/// Trips with at least `min_count` stop events whose actual time is strictly
/// later than `scheduled_time + threshold`.
///
/// Trips without any delayed event are never reported, even with
/// `min_count == 0`.
pub fn delayed_trips(store: &TransitStore, query: &DelayQuery) -> Vec<DelayedTrip> {
    let mut counts: BTreeMap<&TripIdentifier, usize> = BTreeMap::new();
    for event in candidate_events(store, query.threshold, query.window) {
        if event.is_delayed(query.threshold) {
            *counts.entry(&event.trip_id).or_default() += 1;
        }
    }

    let mut trips: Vec<DelayedTrip> = counts
        .into_iter()
        .filter(|&(_, count)| count >= query.min_count)
        .map(|(trip_id, delayed_stop_count)| DelayedTrip {
            trip_id: trip_id.clone(),
            delayed_stop_count,
        })
        .collect();

    // already ascending by trip id
    if query.order == DelayOrder::CountDescending {
        trips.sort_by(|a, b| b.delayed_stop_count.cmp(&a.delayed_stop_count));
    }

    debug!(
        threshold_s = query.threshold.num_seconds(),
        min_count = query.min_count,
        trips = trips.len(),
        "delayed trips"
    );
    trips
}

/// Delayed stop events per line, most delayed first, ties by line name.
/// Lines without delays are omitted.
pub fn delays_by_line(store: &TransitStore, threshold: TimeDelta) -> Vec<LineDelayCount> {
    let mut counts: HashMap<LineId, usize> = HashMap::new();
    for event in store.stop_events().filter(|event| event.is_delayed(threshold)) {
        if let Some(trip) = store.trip(&event.trip_id) {
            *counts.entry(trip.line_id).or_default() += 1;
        }
    }

    let mut lines: Vec<LineDelayCount> = counts
        .into_iter()
        .filter_map(|(line_id, delay_count)| {
            let line = store.line(line_id)?;
            Some(LineDelayCount {
                line_id,
                line_name: line.name.clone(),
                delay_count,
            })
        })
        .collect();

    lines.sort_by(|a, b| {
        b.delay_count
            .cmp(&a.delay_count)
            .then_with(|| a.line_name.cmp(&b.line_name))
    });
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::records::{NewLine, NewStop, StopEvent, Trip};
    use crate::models::types::VehicleType;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    struct Fixture {
        store: TransitStore,
        stops: Vec<StopId>,
    }

    fn fixture() -> Fixture {
        let mut store = TransitStore::new();
        let red = store.insert_line(NewLine::new("Red", VehicleType::Rail)).unwrap();
        let blue = store.insert_line(NewLine::new("Blue", VehicleType::Bus)).unwrap();
        let stops = (0..5)
            .map(|i| store.insert_stop(NewStop::new(format!("Stop {i}"), 34.0, -118.0 + i as f64 * 0.01)).unwrap())
            .collect();

        store.insert_trip(Trip::new("T0001", red, at(1, 8, 0), "V1")).unwrap();
        store.insert_trip(Trip::new("T0002", red, at(2, 8, 0), "V1")).unwrap();
        store.insert_trip(Trip::new("T0003", blue, at(1, 9, 0), "V2")).unwrap();
        Fixture { store, stops }
    }

    /// One event per stop, `late_by[i]` minutes late at stop `i`.
    fn record(f: &mut Fixture, trip: &str, day: u32, late_by: &[i64]) {
        for (i, &minutes) in late_by.iter().enumerate() {
            let scheduled = at(day, 8, 10 * i as u32);
            f.store
                .insert_stop_event(StopEvent::new(
                    trip,
                    f.stops[i],
                    scheduled,
                    scheduled + TimeDelta::minutes(minutes),
                    1,
                    1,
                ))
                .unwrap();
        }
    }

    #[test]
    fn test_empty_store_has_no_delays() {
        let store = TransitStore::new();
        assert!(delayed_trips(&store, &DelayQuery::default()).is_empty());
        assert!(delays_by_line(&store, TimeDelta::minutes(2)).is_empty());
    }

    #[test]
    fn test_min_count_threshold() {
        let mut f = fixture();
        record(&mut f, "T0001", 1, &[3, 5, 1]);

        assert!(delayed_trips(&f.store, &DelayQuery::default()).is_empty());

        let two = delayed_trips(&f.store, &DelayQuery::new(TimeDelta::minutes(2), 2));
        assert_eq!(
            two,
            [DelayedTrip {
                trip_id: "T0001".into(),
                delayed_stop_count: 2
            }]
        );
    }

    #[test]
    fn test_zero_min_count_never_reports_punctual_trips() {
        let mut f = fixture();
        record(&mut f, "T0001", 1, &[0, 1]);
        record(&mut f, "T0002", 2, &[4]);

        let trips = delayed_trips(&f.store, &DelayQuery::new(TimeDelta::minutes(2), 0));
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].trip_id.as_str(), "T0002");
    }

    #[test]
    fn test_ordering() {
        let mut f = fixture();
        record(&mut f, "T0003", 1, &[5, 5, 5]);
        record(&mut f, "T0001", 1, &[5, 5, 5, 5]);
        record(&mut f, "T0002", 2, &[5, 5, 5]);

        let by_id: Vec<String> = delayed_trips(&f.store, &DelayQuery::default())
            .into_iter()
            .map(|t| t.trip_id.to_string())
            .collect();
        assert_eq!(by_id, ["T0001", "T0002", "T0003"]);

        let by_count = delayed_trips(&f.store, &DelayQuery::default().ordered_by(DelayOrder::CountDescending));
        let summary: Vec<(&str, usize)> = by_count
            .iter()
            .map(|t| (t.trip_id.as_str(), t.delayed_stop_count))
            .collect();
        assert_eq!(summary, [("T0001", 4), ("T0002", 3), ("T0003", 3)]);
    }

    #[test]
    fn test_actual_time_pruning_keeps_late_events() {
        let mut f = fixture();
        record(&mut f, "T0001", 1, &[0, 1, 9]);
        record(&mut f, "T0002", 2, &[5, 5, -3]);
        record(&mut f, "T0003", 1, &[-2, 3, 3]);

        let floor = at(1, 8, 2);
        let pruned = f.store.stop_event_indexes.arrived_from(floor).count();
        assert!(pruned < f.store.counts().stop_events);

        let summary: Vec<(String, usize)> = delayed_trips(&f.store, &DelayQuery::new(TimeDelta::minutes(2), 1))
            .into_iter()
            .map(|t| (t.trip_id.to_string(), t.delayed_stop_count))
            .collect();
        assert_eq!(
            summary,
            [
                ("T0001".to_string(), 1),
                ("T0002".to_string(), 2),
                ("T0003".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_unbounded_negative_threshold_counts_every_event() {
        let mut f = fixture();
        record(&mut f, "T0001", 1, &[3, -5, 0]);

        let trips = delayed_trips(&f.store, &DelayQuery::new(TimeDelta::MIN, 0));
        assert_eq!(
            trips,
            [DelayedTrip {
                trip_id: "T0001".into(),
                delayed_stop_count: 3
            }]
        );
    }

    #[test]
    fn test_window_limits_scheduled_days() {
        let mut f = fixture();
        record(&mut f, "T0001", 1, &[5, 5, 5]);
        record(&mut f, "T0002", 2, &[5, 5, 5]);

        let day_two = DateRange::single(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        let trips = delayed_trips(&f.store, &DelayQuery::default().within(day_two));
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].trip_id.as_str(), "T0002");
    }

    #[test]
    fn test_delays_by_line() {
        let mut f = fixture();
        record(&mut f, "T0001", 1, &[5, 0, 5]);
        record(&mut f, "T0002", 2, &[3]);
        record(&mut f, "T0003", 1, &[9, 9, 9]);

        let summary: Vec<(String, usize)> = delays_by_line(&f.store, TimeDelta::minutes(2))
            .into_iter()
            .map(|line| (line.line_name.to_string(), line.delay_count))
            .collect();
        assert_eq!(summary, [("Blue".to_string(), 3), ("Red".to_string(), 3)]);
    }
}
