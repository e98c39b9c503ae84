//! # transit-ops
//!
//! Transit operations data with strict integrity and delay analytics.
//!
//! ## Features
//!
//! - **Validated records**: lines, stops, itineraries, trips and stop events
//!   are checked field by field before they are admitted
//! - **Referential integrity**: dangling references are rejected; deletes
//!   restrict or cascade per relationship
//! - **Indexed store**: ordered itineraries, reverse stop lookups, trips by
//!   line and departure, stop events by stop and time
//! - **Delay analytics**: trips that ran late at several stops
//!
//! ## Example
//!
//! ```
//! use transit_ops::prelude::*;
//! use chrono::{NaiveDate, TimeDelta};
//!
//! let mut store = TransitStore::new();
//! let line = store.insert_line(NewLine::new("Route 20", VehicleType::Bus)).unwrap();
//! let stop = store.insert_stop(NewStop::new("Wilshire / Veteran", 34.0589, -118.4452)).unwrap();
//! store.insert_line_stop(LineStop::new(line, stop, 1, 0)).unwrap();
//!
//! let departure = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! store.insert_trip(Trip::new("T0001", line, departure, "V-100")).unwrap();
//! store
//!     .insert_stop_event(StopEvent::new("T0001", stop, departure, departure + TimeDelta::minutes(5), 12, 3))
//!     .unwrap();
//!
//! let delayed = store.delayed_trips(TimeDelta::minutes(2), 1);
//! assert_eq!(delayed.len(), 1);
//! assert_eq!(delayed[0].trip_id.as_str(), "T0001");
//! ```

pub mod analytics;
pub mod config;
pub mod identifiers;
pub mod integrity;
pub mod models;
pub mod store;
pub mod validation;

// Re-exports for convenience
pub mod prelude {
    pub use crate::analytics::{DelayOrder, DelayQuery, DelayedTrip};
    pub use crate::config::AnalyticsConfig;
    pub use crate::identifiers::*;
    pub use crate::integrity::{DeletePolicy, Relationship};
    pub use crate::models::{calendar::*, records::*, types::*};
    pub use crate::store::{SharedTransitStore, StoreCounts, TransitStore};
    pub use crate::validation::{Rule, Validate};
}

pub use prelude::*;
