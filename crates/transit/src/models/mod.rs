//! Transit records, keys, and value types.

pub mod calendar;
pub mod records;
pub mod types;

// Re-exports for convenience
pub use calendar::{DateRange, TimeOfDayWindow};
pub use records::{
    EntityKey, Line, LineStop, LineStopKey, NewLine, NewStop, Record, Stop, StopEvent, StopEventKey, Trip,
};
pub use types::{EntityKind, Result, TransitError, VehicleType};
