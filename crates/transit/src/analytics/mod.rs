//! Read-only analytics over a [`TransitStore`](crate::store::TransitStore).
//!
//! Results depend only on the stored data and the query parameters, never on
//! map iteration order.

pub mod delay;
pub mod ridership;

pub use delay::{delayed_trips, delays_by_line, DelayOrder, DelayQuery, DelayedTrip, LineDelayCount};
pub use ridership::{average_ridership_by_line, busiest_stops, stops_above_average_boardings, LineRidership, StopActivity};
