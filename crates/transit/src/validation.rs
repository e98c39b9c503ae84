//! Per-field domain rules applied before a record reaches the store.
//!
//! Validation is pure: it looks only at the candidate record and never at
//! stored data. Referential checks live in [`crate::integrity`].

use std::fmt;
use std::str::FromStr;

use crate::models::records::*;
use crate::models::types::{EntityKind, Result, TransitError, VehicleType};

pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// A domain rule a single field must satisfy
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rule {
    NonEmpty,
    /// Inclusive on both ends; NaN never satisfies it.
    InRange { min: f64, max: f64 },
    AtLeast(i64),
    OneOf(&'static [&'static str]),
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::NonEmpty => write!(f, "non-empty"),
            Rule::InRange { min, max } => write!(f, "range [{min}, {max}]"),
            Rule::AtLeast(min) => write!(f, ">= {min}"),
            Rule::OneOf(values) => write!(f, "one of {{{}}}", values.join(", ")),
        }
    }
}

fn violation(entity: EntityKind, field: &'static str, rule: Rule, value: impl fmt::Display) -> TransitError {
    TransitError::ConstraintViolation {
        entity,
        field,
        rule,
        value: value.to_string(),
    }
}

fn non_empty(entity: EntityKind, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(violation(entity, field, Rule::NonEmpty, format!("{value:?}")));
    }
    Ok(())
}

fn in_range(entity: EntityKind, field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(violation(entity, field, Rule::InRange { min, max }, value));
    }
    Ok(())
}

fn at_least(entity: EntityKind, field: &'static str, value: i64, min: i64) -> Result<()> {
    if value < min {
        return Err(violation(entity, field, Rule::AtLeast(min), value));
    }
    Ok(())
}

/// Parse a vehicle mode from untyped input (CSV cells, CLI arguments).
pub fn parse_vehicle_type(raw: &str) -> Result<VehicleType> {
    VehicleType::from_str(raw.trim())
        .map_err(|_| violation(EntityKind::Line, "vehicle_type", Rule::OneOf(VehicleType::NAMES), format!("{raw:?}")))
}

/// Records that carry field-level domain rules
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for NewLine {
    fn validate(&self) -> Result<()> {
        // vehicle_type is closed at the type level
        non_empty(EntityKind::Line, "line_name", &self.line_name)
    }
}

impl Validate for NewStop {
    fn validate(&self) -> Result<()> {
        non_empty(EntityKind::Stop, "stop_name", &self.stop_name)?;
        in_range(EntityKind::Stop, "latitude", self.latitude(), LATITUDE_RANGE)?;
        in_range(EntityKind::Stop, "longitude", self.longitude(), LONGITUDE_RANGE)
    }
}

impl Validate for LineStop {
    fn validate(&self) -> Result<()> {
        at_least(EntityKind::LineStop, "sequence_number", self.sequence_number.into(), 1)?;
        at_least(EntityKind::LineStop, "time_offset_minutes", self.time_offset_minutes.into(), 0)
    }
}

impl Validate for Trip {
    fn validate(&self) -> Result<()> {
        non_empty(EntityKind::Trip, "trip_id", self.id.as_str())?;
        non_empty(EntityKind::Trip, "vehicle_id", self.vehicle_id.as_str())
    }
}

impl Validate for StopEvent {
    fn validate(&self) -> Result<()> {
        at_least(EntityKind::StopEvent, "passengers_on", self.passengers_on.into(), 0)?;
        at_least(EntityKind::StopEvent, "passengers_off", self.passengers_off.into(), 0)
    }
}

impl Validate for Record {
    fn validate(&self) -> Result<()> {
        match self {
            Record::Line(line) => line.validate(),
            Record::Stop(stop) => stop.validate(),
            Record::LineStop(line_stop) => line_stop.validate(),
            Record::Trip(trip) => trip.validate(),
            Record::StopEvent(event) => event.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{LineId, StopId};
    use chrono::NaiveDate;

    fn field_of(err: TransitError) -> &'static str {
        match err {
            TransitError::ConstraintViolation { field, .. } => field,
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn test_latitude_boundary_is_inclusive() {
        assert!(NewStop::new("North Pole", 90.0, 0.0).validate().is_ok());
        assert!(NewStop::new("South Pole", -90.0, 0.0).validate().is_ok());

        let err = NewStop::new("Beyond", 91.0, 0.0).validate().unwrap_err();
        assert_eq!(field_of(err), "latitude");
    }

    #[test]
    fn test_longitude_bounds() {
        assert!(NewStop::new("Antimeridian", 0.0, 180.0).validate().is_ok());

        let err = NewStop::new("Nowhere", 0.0, -180.5).validate().unwrap_err();
        assert_eq!(field_of(err), "longitude");
    }

    #[test]
    fn test_nan_coordinates_rejected() {
        let err = NewStop::new("Nan", f64::NAN, 0.0).validate().unwrap_err();
        assert_eq!(field_of(err), "latitude");
    }

    #[test]
    fn test_blank_names_rejected() {
        let err = NewLine::new("   ", VehicleType::Bus).validate().unwrap_err();
        assert_eq!(field_of(err), "line_name");

        let err = NewStop::new("", 10.0, 10.0).validate().unwrap_err();
        assert_eq!(field_of(err), "stop_name");
    }

    #[test]
    fn test_line_stop_rules() {
        assert!(LineStop::new(LineId(1), StopId(1), 1, 0).validate().is_ok());

        let err = LineStop::new(LineId(1), StopId(1), 0, 0).validate().unwrap_err();
        assert_eq!(field_of(err), "sequence_number");

        let err = LineStop::new(LineId(1), StopId(1), 2, -5).validate().unwrap_err();
        assert_eq!(field_of(err), "time_offset_minutes");
    }

    #[test]
    fn test_passenger_counts_non_negative() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let event = StopEvent::new("T0001", StopId(1), at, at, 0, 0);
        assert!(event.validate().is_ok());

        let err = StopEvent { passengers_off: -1, ..event }.validate().unwrap_err();
        assert_eq!(field_of(err), "passengers_off");
    }

    #[test]
    fn test_parse_vehicle_type() {
        assert_eq!(parse_vehicle_type(" rail ").unwrap(), VehicleType::Rail);

        match parse_vehicle_type("ferry").unwrap_err() {
            TransitError::ConstraintViolation { rule, value, .. } => {
                assert_eq!(rule, Rule::OneOf(&["rail", "bus"]));
                assert_eq!(value, "\"ferry\"");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_rule_display() {
        assert_eq!(Rule::AtLeast(1).to_string(), ">= 1");
        assert_eq!(Rule::OneOf(VehicleType::NAMES).to_string(), "one of {rail, bus}");
    }
}
