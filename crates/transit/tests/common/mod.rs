#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use transit_ops::prelude::*;

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub struct Network {
    pub store: TransitStore,
    pub route_20: LineId,
    pub expo: LineId,
    pub stops: Vec<StopId>,
}

/// Route 20 (bus) visits the first three stops, Expo (rail) the last three.
pub fn network() -> Network {
    let mut store = TransitStore::new();
    let route_20 = store.insert_line(NewLine::new("Route 20", VehicleType::Bus)).unwrap();
    let expo = store.insert_line(NewLine::new("Expo", VehicleType::Rail)).unwrap();

    let stops: Vec<StopId> = [
        ("Wilshire / Veteran", 34.0589, -118.4452),
        ("Le Conte / Broxton", 34.0635, -118.4455),
        ("Westwood / Weyburn", 34.0629, -118.4470),
        ("Expo / Sepulveda", 34.0354, -118.4338),
    ]
    .into_iter()
    .map(|(name, lat, lon)| store.insert_stop(NewStop::new(name, lat, lon)).unwrap())
    .collect();

    for (seq, &stop) in stops[..3].iter().enumerate() {
        store
            .insert_line_stop(LineStop::new(route_20, stop, seq as u32 + 1, seq as i32 * 5))
            .unwrap();
    }
    for (seq, &stop) in stops[1..].iter().enumerate() {
        store
            .insert_line_stop(LineStop::new(expo, stop, seq as u32 + 1, seq as i32 * 3))
            .unwrap();
    }

    Network {
        store,
        route_20,
        expo,
        stops,
    }
}

/// A stop event at `stops[stop]` running `late_by` minutes behind schedule.
pub fn event(stops: &[StopId], trip: &str, stop: usize, scheduled: NaiveDateTime, late_by: i64) -> StopEvent {
    StopEvent::new(trip, stops[stop], scheduled, scheduled + TimeDelta::minutes(late_by), 5, 2)
}
