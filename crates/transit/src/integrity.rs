//! Referential integrity: parent resolution, composite uniqueness, and the
//! delete policy for every parent/child relationship.
//!
//! All checks run against an immutable store and return either a plan or the
//! first violation found. Nothing here mutates, so a failed check leaves the
//! store untouched.

use crate::identifiers::*;
use crate::models::records::*;
use crate::models::types::{EntityKind, Result, TransitError};
use crate::store::TransitStore;

/// A parent/child foreign-key relationship
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relationship {
    LineStopToLine,
    LineStopToStop,
    TripToLine,
    StopEventToTrip,
    StopEventToStop,
}

/// What deleting a parent does to its children
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Deletion fails while any child exists.
    Restrict,
    /// Children are deleted in the same operation.
    Cascade,
}

#[derive(Clone, Copy, Debug)]
pub struct RelationshipRule {
    pub relationship: Relationship,
    pub parent: EntityKind,
    pub child: EntityKind,
    pub on_delete: DeletePolicy,
}

const fn rule(relationship: Relationship, parent: EntityKind, child: EntityKind, on_delete: DeletePolicy) -> RelationshipRule {
    RelationshipRule {
        relationship,
        parent,
        child,
        on_delete,
    }
}

/// Identity changes (trip renames) always cascade to children; deletes
/// follow `on_delete`.
pub const RELATIONSHIPS: [RelationshipRule; 5] = [
    rule(Relationship::LineStopToLine, EntityKind::Line, EntityKind::LineStop, DeletePolicy::Restrict),
    rule(Relationship::TripToLine, EntityKind::Line, EntityKind::Trip, DeletePolicy::Restrict),
    rule(Relationship::LineStopToStop, EntityKind::Stop, EntityKind::LineStop, DeletePolicy::Restrict),
    rule(Relationship::StopEventToStop, EntityKind::Stop, EntityKind::StopEvent, DeletePolicy::Restrict),
    rule(Relationship::StopEventToTrip, EntityKind::Trip, EntityKind::StopEvent, DeletePolicy::Cascade),
];

pub fn delete_policy(relationship: Relationship) -> DeletePolicy {
    RELATIONSHIPS
        .iter()
        .find(|r| r.relationship == relationship)
        .map_or(DeletePolicy::Restrict, |r| r.on_delete)
}

/// Keys removed by a delete, children first so the target goes last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletePlan {
    pub target: EntityKey,
    pub cascaded: Vec<EntityKey>,
}

// ============================================================================
// Reference checks
// ============================================================================

fn require_line(store: &TransitStore, entity: EntityKind, line_id: LineId) -> Result<()> {
    if store.lines.contains_key(&line_id) {
        return Ok(());
    }
    Err(TransitError::DanglingReference {
        entity,
        parent: EntityKey::Line(line_id),
    })
}

fn require_stop(store: &TransitStore, entity: EntityKind, stop_id: StopId) -> Result<()> {
    if store.stops.contains_key(&stop_id) {
        return Ok(());
    }
    Err(TransitError::DanglingReference {
        entity,
        parent: EntityKey::Stop(stop_id),
    })
}

fn require_trip(store: &TransitStore, entity: EntityKind, trip_id: &TripIdentifier) -> Result<()> {
    if store.trips.contains_key(trip_id) {
        return Ok(());
    }
    Err(TransitError::DanglingReference {
        entity,
        parent: EntityKey::Trip(trip_id.clone()),
    })
}

/// Foreign-key and uniqueness checks for a candidate record
pub trait Referential {
    /// Every foreign key must resolve to a stored parent.
    fn check_references(&self, store: &TransitStore) -> Result<()>;

    /// Primary, natural and composite keys must not collide with any stored
    /// record other than `replacing`, the record an update overwrites.
    fn check_unique(&self, store: &TransitStore, replacing: Option<&EntityKey>) -> Result<()>;
}

fn duplicate(entity: EntityKind, key: impl ToString) -> TransitError {
    TransitError::UniquenessViolation {
        entity,
        key: key.to_string(),
    }
}

fn is_replaced(replacing: Option<&EntityKey>, key: EntityKey) -> bool {
    replacing == Some(&key)
}

impl Referential for NewLine {
    fn check_references(&self, _store: &TransitStore) -> Result<()> {
        Ok(())
    }

    fn check_unique(&self, store: &TransitStore, replacing: Option<&EntityKey>) -> Result<()> {
        let name = self.line_name.trim();
        match store.line_names.get(name) {
            Some(&id) if !is_replaced(replacing, EntityKey::Line(id)) => {
                Err(duplicate(EntityKind::Line, format!("line_name={name:?}")))
            }
            _ => Ok(()),
        }
    }
}

impl Referential for NewStop {
    fn check_references(&self, _store: &TransitStore) -> Result<()> {
        Ok(())
    }

    fn check_unique(&self, store: &TransitStore, replacing: Option<&EntityKey>) -> Result<()> {
        let name = self.stop_name.trim();
        match store.stop_names.get(name) {
            Some(&id) if !is_replaced(replacing, EntityKey::Stop(id)) => {
                Err(duplicate(EntityKind::Stop, format!("stop_name={name:?}")))
            }
            _ => Ok(()),
        }
    }
}

impl Referential for LineStop {
    fn check_references(&self, store: &TransitStore) -> Result<()> {
        require_line(store, EntityKind::LineStop, self.line_id)?;
        require_stop(store, EntityKind::LineStop, self.stop_id)
    }

    fn check_unique(&self, store: &TransitStore, replacing: Option<&EntityKey>) -> Result<()> {
        let key = self.key();
        if store.line_stops.contains_key(&key) && !is_replaced(replacing, EntityKey::LineStop(key)) {
            return Err(duplicate(EntityKind::LineStop, key));
        }
        match store.line_stop_indexes.sequence_of(self.line_id, self.stop_id) {
            Some(sequence)
                if !is_replaced(replacing, EntityKey::LineStop(LineStopKey::new(self.line_id, sequence))) =>
            {
                Err(duplicate(
                    EntityKind::LineStop,
                    format!("({}, {}) at sequence {sequence}", self.line_id, self.stop_id),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl Referential for Trip {
    fn check_references(&self, store: &TransitStore) -> Result<()> {
        require_line(store, EntityKind::Trip, self.line_id)
    }

    fn check_unique(&self, store: &TransitStore, replacing: Option<&EntityKey>) -> Result<()> {
        if store.trips.contains_key(&self.id) && !is_replaced(replacing, EntityKey::Trip(self.id.clone())) {
            return Err(duplicate(EntityKind::Trip, &self.id));
        }
        match store.trip_indexes.natural_keys.get(&self.natural_key()) {
            Some(existing) if !is_replaced(replacing, EntityKey::Trip(existing.clone())) => Err(duplicate(
                EntityKind::Trip,
                format!(
                    "({}, {}, {}) held by {existing}",
                    self.line_id, self.scheduled_departure, self.vehicle_id
                ),
            )),
            _ => Ok(()),
        }
    }
}

impl Referential for StopEvent {
    fn check_references(&self, store: &TransitStore) -> Result<()> {
        require_trip(store, EntityKind::StopEvent, &self.trip_id)?;
        require_stop(store, EntityKind::StopEvent, self.stop_id)
    }

    fn check_unique(&self, store: &TransitStore, replacing: Option<&EntityKey>) -> Result<()> {
        let key = self.key();
        if store.stop_events.contains_key(&key) && !is_replaced(replacing, EntityKey::StopEvent(key.clone())) {
            return Err(duplicate(EntityKind::StopEvent, key));
        }
        Ok(())
    }
}

impl Referential for Record {
    fn check_references(&self, store: &TransitStore) -> Result<()> {
        match self {
            Record::Line(line) => line.check_references(store),
            Record::Stop(stop) => stop.check_references(store),
            Record::LineStop(line_stop) => line_stop.check_references(store),
            Record::Trip(trip) => trip.check_references(store),
            Record::StopEvent(event) => event.check_references(store),
        }
    }

    fn check_unique(&self, store: &TransitStore, replacing: Option<&EntityKey>) -> Result<()> {
        match self {
            Record::Line(line) => line.check_unique(store, replacing),
            Record::Stop(stop) => stop.check_unique(store, replacing),
            Record::LineStop(line_stop) => line_stop.check_unique(store, replacing),
            Record::Trip(trip) => trip.check_unique(store, replacing),
            Record::StopEvent(event) => event.check_unique(store, replacing),
        }
    }
}

// ============================================================================
// Delete planning
// ============================================================================

/// Stored children of `parent` along `relationship`.
fn children(store: &TransitStore, relationship: Relationship, parent: &EntityKey) -> Vec<EntityKey> {
    match (relationship, parent) {
        (Relationship::LineStopToLine, EntityKey::Line(line_id)) => store
            .line_stops
            .range(LineStopKey::new(*line_id, u32::MIN)..=LineStopKey::new(*line_id, u32::MAX))
            .map(|(key, _)| EntityKey::LineStop(*key))
            .collect(),
        (Relationship::TripToLine, EntityKey::Line(line_id)) => store
            .trip_indexes
            .for_line(*line_id, chrono::NaiveDateTime::MIN)
            .map(|(_, id)| EntityKey::Trip(id.clone()))
            .collect(),
        (Relationship::LineStopToStop, EntityKey::Stop(stop_id)) => store
            .line_stop_indexes
            .lines_at(*stop_id)
            .map(|(line_id, sequence)| EntityKey::LineStop(LineStopKey::new(line_id, sequence)))
            .collect(),
        (Relationship::StopEventToStop, EntityKey::Stop(stop_id)) => store
            .stop_event_indexes
            .at_stop(*stop_id)
            .map(|key| EntityKey::StopEvent(key.clone()))
            .collect(),
        (Relationship::StopEventToTrip, EntityKey::Trip(trip_id)) => store
            .stop_events_for_trip(trip_id)
            .map(|event| EntityKey::StopEvent(event.key()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolve a delete request against the policy table.
///
/// Fails with `ReferentialRestriction` if any restricted child exists
/// anywhere below `target`, otherwise returns every key to remove.
pub fn plan_delete(store: &TransitStore, target: &EntityKey) -> Result<DeletePlan> {
    if !store.contains(target) {
        return Err(TransitError::NotFound(target.clone()));
    }

    let mut cascaded = Vec::new();
    let mut pending = vec![target.clone()];

    while let Some(parent) = pending.pop() {
        let kind = parent.kind();
        for rule in RELATIONSHIPS.iter().filter(|r| r.parent == kind) {
            let found = children(store, rule.relationship, &parent);
            if found.is_empty() {
                continue;
            }
            match rule.on_delete {
                DeletePolicy::Restrict => {
                    return Err(TransitError::ReferentialRestriction {
                        parent,
                        child: rule.child,
                        count: found.len(),
                    });
                }
                DeletePolicy::Cascade => {
                    pending.extend(found.iter().cloned());
                    cascaded.extend(found);
                }
            }
        }
    }

    // grandchildren were appended after their parents
    cascaded.reverse();

    Ok(DeletePlan {
        target: target.clone(),
        cascaded,
    })
}
