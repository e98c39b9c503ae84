//! Core enums and the error taxonomy for transit records.

use strum::{AsRefStr, Display, EnumString};

use crate::models::records::EntityKey;
use crate::validation::Rule;

// ============================================================================
// Enums
// ============================================================================

/// Vehicle mode operating a line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VehicleType {
    Rail,
    Bus,
}

impl VehicleType {
    pub const ALL: [VehicleType; 2] = [VehicleType::Rail, VehicleType::Bus];
    pub const NAMES: &'static [&'static str] = &["rail", "bus"];
}

/// The five entity collections held by a store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityKind {
    Line,
    Stop,
    LineStop,
    Trip,
    StopEvent,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    /// A field failed its domain rule.
    #[error("{entity}.{field} violates {rule} (got {value})")]
    ConstraintViolation {
        entity: EntityKind,
        field: &'static str,
        rule: Rule,
        value: String,
    },

    #[error("{entity} references missing {parent}")]
    DanglingReference {
        entity: EntityKind,
        parent: EntityKey,
    },

    #[error("{entity} with key {key} already exists")]
    UniquenessViolation { entity: EntityKind, key: String },

    #[error("cannot delete {parent}: {count} dependent {child} record(s)")]
    ReferentialRestriction {
        parent: EntityKey,
        child: EntityKind,
        count: usize,
    },

    #[error("{0} not found")]
    NotFound(EntityKey),
}

pub type Result<T> = std::result::Result<T, TransitError>;
