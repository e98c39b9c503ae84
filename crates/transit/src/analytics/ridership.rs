//! Ridership summaries from per-stop boardings and alightings.

use std::collections::HashMap;
use std::sync::Arc;

use crate::identifiers::*;
use crate::models::records::StopEvent;
use crate::store::TransitStore;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LineRidership {
    pub line_id: LineId,
    pub line_name: Arc<str>,
    /// Mean of `passengers_on + passengers_off` per stop event
    pub average_passengers: f64,
    pub stop_events: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StopActivity {
    pub stop_id: StopId,
    pub stop_name: Arc<str>,
    pub total: i64,
}

/// Average passengers moved per stop event, for each line with events,
/// ordered by line name.
pub fn average_ridership_by_line(store: &TransitStore) -> Vec<LineRidership> {
    let mut totals: HashMap<LineId, (i64, usize)> = HashMap::new();
    for event in store.stop_events() {
        if let Some(trip) = store.trip(&event.trip_id) {
            let (sum, count) = totals.entry(trip.line_id).or_default();
            *sum += event.activity();
            *count += 1;
        }
    }

    let mut lines: Vec<LineRidership> = totals
        .into_iter()
        .filter_map(|(line_id, (sum, count))| {
            let line = store.line(line_id)?;
            Some(LineRidership {
                line_id,
                line_name: line.name.clone(),
                average_passengers: sum as f64 / count as f64,
                stop_events: count,
            })
        })
        .collect();

    lines.sort_by(|a, b| a.line_name.cmp(&b.line_name));
    lines
}

fn per_stop(store: &TransitStore, measure: impl Fn(&StopEvent) -> i64) -> Vec<StopActivity> {
    let mut totals: HashMap<StopId, i64> = HashMap::new();
    for event in store.stop_events() {
        *totals.entry(event.stop_id).or_default() += measure(event);
    }

    let mut stops: Vec<StopActivity> = totals
        .into_iter()
        .filter_map(|(stop_id, total)| {
            let stop = store.stop(stop_id)?;
            Some(StopActivity {
                stop_id,
                stop_name: stop.name.clone(),
                total,
            })
        })
        .collect();

    stops.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.stop_name.cmp(&b.stop_name)));
    stops
}

/// The `limit` stops with the most boardings plus alightings.
pub fn busiest_stops(store: &TransitStore, limit: usize) -> Vec<StopActivity> {
    let mut stops = per_stop(store, |event| event.activity());
    stops.truncate(limit);
    stops
}

/// Stops whose total boardings exceed the mean over all stops that have
/// any recorded events.
pub fn stops_above_average_boardings(store: &TransitStore) -> Vec<StopActivity> {
    let stops = per_stop(store, |event| i64::from(event.passengers_on));
    if stops.is_empty() {
        return stops;
    }

    let mean = stops.iter().map(|s| s.total as f64).sum::<f64>() / stops.len() as f64;
    stops.into_iter().filter(|s| s.total as f64 > mean).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::records::{NewLine, NewStop, Trip};
    use crate::models::types::VehicleType;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    fn at(m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, m, 0)
            .unwrap()
    }

    /// Red runs T1 over A and B; Blue runs T2 over B and C.
    fn fixture() -> TransitStore {
        let mut store = TransitStore::new();
        let red = store.insert_line(NewLine::new("Red", VehicleType::Rail)).unwrap();
        let blue = store.insert_line(NewLine::new("Blue", VehicleType::Bus)).unwrap();
        let a = store.insert_stop(NewStop::new("A", 34.0, -118.0)).unwrap();
        let b = store.insert_stop(NewStop::new("B", 34.1, -118.0)).unwrap();
        let c = store.insert_stop(NewStop::new("C", 34.2, -118.0)).unwrap();
        store.insert_trip(Trip::new("T1", red, at(0), "V1")).unwrap();
        store.insert_trip(Trip::new("T2", blue, at(0), "V2")).unwrap();

        for (trip, stop, minute, on, off) in [
            ("T1", a, 0, 10, 0),
            ("T1", b, 5, 3, 4),
            ("T2", b, 0, 6, 1),
            ("T2", c, 7, 0, 9),
        ] {
            store
                .insert_stop_event(StopEvent::new(trip, stop, at(minute), at(minute) + TimeDelta::seconds(30), on, off))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_average_ridership_by_line() {
        let store = fixture();
        let lines = average_ridership_by_line(&store);

        assert_eq!(lines.len(), 2);
        assert_eq!(&*lines[0].line_name, "Blue");
        assert_relative_eq!(lines[0].average_passengers, 8.0);
        assert_eq!(&*lines[1].line_name, "Red");
        assert_relative_eq!(lines[1].average_passengers, 8.5);
        assert_eq!(lines[1].stop_events, 2);
    }

    #[test]
    fn test_busiest_stops() {
        let store = fixture();
        let busiest = busiest_stops(&store, 2);
        let summary: Vec<(&str, i64)> = busiest.iter().map(|s| (&*s.stop_name, s.total)).collect();
        assert_eq!(summary, [("B", 14), ("A", 10)]);
    }

    #[test]
    fn test_stops_above_average_boardings() {
        let store = fixture();
        // boardings: A 10, B 9, C 0 -> mean 6.33
        let names: Vec<String> = stops_above_average_boardings(&store)
            .into_iter()
            .map(|s| s.stop_name.to_string())
            .collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_empty_store() {
        let store = TransitStore::new();
        assert!(average_ridership_by_line(&store).is_empty());
        assert!(busiest_stops(&store, 10).is_empty());
        assert!(stops_above_average_boardings(&store).is_empty());
    }
}
