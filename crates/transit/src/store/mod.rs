//! In-memory entity store.
//!
//! Every mutation runs the same pipeline: field validation, reference
//! resolution, uniqueness, then apply. All checks finish before anything is
//! written, and applying a checked mutation cannot fail, so a rejected
//! request leaves the store exactly as it was.

mod indexes;
mod queries;
mod shared;

pub use queries::TransferStop;
pub use shared::SharedTransitStore;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::identifiers::*;
use crate::integrity::{self, Referential};
use crate::models::records::*;
use crate::models::types::{EntityKind, Result, TransitError};
use crate::validation::Validate;

use indexes::{LineStopIndexes, StopEventIndexes, TripIndexes};

/// Record counts per collection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub lines: usize,
    pub stops: usize,
    pub line_stops: usize,
    pub trips: usize,
    pub stop_events: usize,
}

/// Keyed collections for the five transit entities plus their indexes
///
/// Cloning copies all data; use [`SharedTransitStore`] to share one store
/// between threads.
#[derive(Clone, Debug, Default)]
pub struct TransitStore {
    next_line_id: u32,
    next_stop_id: u32,

    pub(crate) lines: BTreeMap<LineId, Line>,
    pub(crate) line_names: HashMap<Arc<str>, LineId>,
    pub(crate) stops: BTreeMap<StopId, Stop>,
    pub(crate) stop_names: HashMap<Arc<str>, StopId>,

    pub(crate) line_stops: BTreeMap<LineStopKey, LineStop>,
    pub(crate) line_stop_indexes: LineStopIndexes,

    pub(crate) trips: HashMap<TripIdentifier, Trip>,
    pub(crate) trip_indexes: TripIndexes,

    pub(crate) stop_events: BTreeMap<StopEventKey, StopEvent>,
    pub(crate) stop_event_indexes: StopEventIndexes,
}

impl TransitStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Admission ----

    fn admit<R>(&self, entity: EntityKind, record: &R, replacing: Option<&EntityKey>) -> Result<()>
    where
        R: Validate + Referential,
    {
        record
            .validate()
            .and_then(|()| record.check_references(self))
            .and_then(|()| record.check_unique(self, replacing))
            .inspect_err(|err| debug!(%entity, %err, "rejected"))
    }

    // ---- Ingestion ----

    /// Validate and store any record, returning its primary key.
    pub fn insert(&mut self, record: Record) -> Result<EntityKey> {
        match record {
            Record::Line(line) => self.insert_line(line).map(EntityKey::Line),
            Record::Stop(stop) => self.insert_stop(stop).map(EntityKey::Stop),
            Record::LineStop(line_stop) => self.insert_line_stop(line_stop).map(EntityKey::LineStop),
            Record::Trip(trip) => self.insert_trip(trip).map(EntityKey::Trip),
            Record::StopEvent(event) => self.insert_stop_event(event).map(EntityKey::StopEvent),
        }
    }

    pub fn insert_line(&mut self, line: NewLine) -> Result<LineId> {
        self.admit(EntityKind::Line, &line, None)?;

        self.next_line_id += 1;
        let id = LineId(self.next_line_id);
        self.put_line(id, line);
        debug!(%id, "inserted line");
        Ok(id)
    }

    pub fn insert_stop(&mut self, stop: NewStop) -> Result<StopId> {
        self.admit(EntityKind::Stop, &stop, None)?;

        self.next_stop_id += 1;
        let id = StopId(self.next_stop_id);
        self.put_stop(id, stop);
        debug!(%id, "inserted stop");
        Ok(id)
    }

    pub fn insert_line_stop(&mut self, line_stop: LineStop) -> Result<LineStopKey> {
        self.admit(EntityKind::LineStop, &line_stop, None)?;

        let key = self.put_line_stop(line_stop);
        debug!(%key, "inserted line stop");
        Ok(key)
    }

    pub fn insert_trip(&mut self, trip: Trip) -> Result<TripIdentifier> {
        self.admit(EntityKind::Trip, &trip, None)?;

        let id = trip.id.clone();
        self.put_trip(trip);
        debug!(%id, "inserted trip");
        Ok(id)
    }

    /// Stop events are append-only; there is no update counterpart.
    pub fn insert_stop_event(&mut self, event: StopEvent) -> Result<StopEventKey> {
        self.admit(EntityKind::StopEvent, &event, None)?;

        let key = self.put_stop_event(event);
        debug!(%key, "inserted stop event");
        Ok(key)
    }

    // ---- Updates ----

    /// Replace a line's name and vehicle type.
    pub fn update_line(&mut self, id: LineId, line: NewLine) -> Result<()> {
        let key = EntityKey::Line(id);
        if !self.lines.contains_key(&id) {
            return Err(TransitError::NotFound(key));
        }
        self.admit(EntityKind::Line, &line, Some(&key))?;

        self.take_line(id);
        self.put_line(id, line);
        debug!(%id, "updated line");
        Ok(())
    }

    /// Replace a stop's name and location.
    pub fn update_stop(&mut self, id: StopId, stop: NewStop) -> Result<()> {
        let key = EntityKey::Stop(id);
        if !self.stops.contains_key(&id) {
            return Err(TransitError::NotFound(key));
        }
        self.admit(EntityKind::Stop, &stop, Some(&key))?;

        self.take_stop(id);
        self.put_stop(id, stop);
        debug!(%id, "updated stop");
        Ok(())
    }

    /// Point an itinerary slot at a different stop and/or offset.
    pub fn update_line_stop(&mut self, key: LineStopKey, stop_id: StopId, time_offset_minutes: i32) -> Result<()> {
        let candidate = LineStop::new(key.line_id, stop_id, key.sequence_number, time_offset_minutes);
        self.replace_line_stop(key, candidate).map(|_| ())
    }

    /// Move an itinerary slot to a free sequence number on the same line.
    pub fn renumber_line_stop(&mut self, key: LineStopKey, sequence_number: u32) -> Result<LineStopKey> {
        let Some(current) = self.line_stops.get(&key) else {
            return Err(TransitError::NotFound(EntityKey::LineStop(key)));
        };
        let candidate = LineStop {
            sequence_number,
            ..current.clone()
        };
        self.replace_line_stop(key, candidate)
    }

    fn replace_line_stop(&mut self, key: LineStopKey, candidate: LineStop) -> Result<LineStopKey> {
        let replacing = EntityKey::LineStop(key);
        if !self.line_stops.contains_key(&key) {
            return Err(TransitError::NotFound(replacing));
        }
        self.admit(EntityKind::LineStop, &candidate, Some(&replacing))?;

        self.take_line_stop(key);
        let new_key = self.put_line_stop(candidate);
        debug!(old = %key, new = %new_key, "updated line stop");
        Ok(new_key)
    }

    /// Reassign a trip's line, departure, or vehicle. Its stop events follow
    /// the trip id and are unaffected.
    pub fn update_trip(
        &mut self,
        id: &TripIdentifier,
        line_id: LineId,
        scheduled_departure: NaiveDateTime,
        vehicle_id: VehicleIdentifier,
    ) -> Result<()> {
        let key = EntityKey::Trip(id.clone());
        if !self.trips.contains_key(id) {
            return Err(TransitError::NotFound(key));
        }
        let candidate = Trip::new(id.clone(), line_id, scheduled_departure, vehicle_id);
        self.admit(EntityKind::Trip, &candidate, Some(&key))?;

        self.take_trip(id);
        self.put_trip(candidate);
        debug!(%id, "updated trip");
        Ok(())
    }

    /// Change a trip's identity, re-keying all of its stop events with it.
    pub fn rename_trip(&mut self, id: &TripIdentifier, new_id: TripIdentifier) -> Result<()> {
        let key = EntityKey::Trip(id.clone());
        let Some(current) = self.trips.get(id) else {
            return Err(TransitError::NotFound(key));
        };
        if *id == new_id {
            return Ok(());
        }
        let candidate = Trip {
            id: new_id.clone(),
            ..current.clone()
        };
        self.admit(EntityKind::Trip, &candidate, Some(&key))?;

        let event_keys: Vec<StopEventKey> = self.stop_events_for_trip(id).map(StopEvent::key).collect();
        let events: Vec<StopEvent> = event_keys
            .iter()
            .filter_map(|event_key| self.take_stop_event(event_key))
            .collect();

        self.take_trip(id);
        self.put_trip(candidate);
        for event in events {
            self.put_stop_event(StopEvent {
                trip_id: new_id.clone(),
                ..event
            });
        }

        info!(old = %id, new = %new_id, events = event_keys.len(), "renamed trip");
        Ok(())
    }

    // ---- Deletion ----

    /// Delete a record, applying the restrict/cascade policy of each
    /// relationship it is a parent in.
    pub fn delete(&mut self, key: &EntityKey) -> Result<()> {
        let plan = integrity::plan_delete(self, key).inspect_err(|err| debug!(%key, %err, "delete rejected"))?;

        for child in &plan.cascaded {
            self.remove(child);
        }
        self.remove(&plan.target);

        if plan.cascaded.is_empty() {
            debug!(%key, "deleted");
        } else {
            info!(%key, cascaded = plan.cascaded.len(), "deleted with dependents");
        }
        Ok(())
    }

    // ---- Transactions ----

    /// Run several operations as one unit: either all of them apply or, if
    /// `f` returns an error, none do.
    ///
    /// Operates on a copy of the store, so the cost is proportional to the
    /// data held.
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut TransitStore) -> Result<T>) -> Result<T> {
        let mut staged = self.clone();
        let out = f(&mut staged).inspect_err(|err| debug!(%err, "transaction rolled back"))?;
        *self = staged;
        Ok(out)
    }

    // ---- Lookups ----

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    /// Surrounding whitespace is ignored, as it is when names are stored.
    pub fn line_by_name(&self, name: &str) -> Option<&Line> {
        self.line_names.get(name.trim()).and_then(|id| self.lines.get(id))
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.get(&id)
    }

    pub fn stop_by_name(&self, name: &str) -> Option<&Stop> {
        self.stop_names.get(name.trim()).and_then(|id| self.stops.get(id))
    }

    pub fn line_stop(&self, key: LineStopKey) -> Option<&LineStop> {
        self.line_stops.get(&key)
    }

    pub fn trip(&self, id: &TripIdentifier) -> Option<&Trip> {
        self.trips.get(id)
    }

    pub fn stop_event(&self, key: &StopEventKey) -> Option<&StopEvent> {
        self.stop_events.get(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        match key {
            EntityKey::Line(id) => self.lines.contains_key(id),
            EntityKey::Stop(id) => self.stops.contains_key(id),
            EntityKey::LineStop(key) => self.line_stops.contains_key(key),
            EntityKey::Trip(id) => self.trips.contains_key(id),
            EntityKey::StopEvent(key) => self.stop_events.contains_key(key),
        }
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            lines: self.lines.len(),
            stops: self.stops.len(),
            line_stops: self.line_stops.len(),
            trips: self.trips.len(),
            stop_events: self.stop_events.len(),
        }
    }

    /// Lines in id order
    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.lines.values()
    }

    /// Stops in id order
    pub fn stops(&self) -> impl Iterator<Item = &Stop> + '_ {
        self.stops.values()
    }

    /// Trips in departure order
    pub fn trips(&self) -> impl Iterator<Item = &Trip> + '_ {
        self.trip_indexes
            .by_departure
            .iter()
            .filter_map(|(_, id)| self.trips.get(id))
    }

    /// Stop events in key order (grouped by trip)
    pub fn stop_events(&self) -> impl Iterator<Item = &StopEvent> + '_ {
        self.stop_events.values()
    }

    pub fn stop_events_for_trip(&self, trip_id: &TripIdentifier) -> impl Iterator<Item = &StopEvent> + '_ {
        self.stop_events
            .range(StopEventKey::first_of(trip_id)..=StopEventKey::last_of(trip_id))
            .map(|(_, event)| event)
    }

    pub fn stop_events_at_stop(&self, stop_id: StopId) -> impl Iterator<Item = &StopEvent> + '_ {
        self.resolve_events(self.stop_event_indexes.at_stop(stop_id))
    }

    /// Events scheduled in `[from, to)`, ordered by scheduled time.
    pub fn stop_events_scheduled_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> impl Iterator<Item = &StopEvent> + '_ {
        self.resolve_events(self.stop_event_indexes.scheduled_between(from, to))
    }

    /// Events that actually happened in `[from, to)`, ordered by actual time.
    pub fn stop_events_arrived_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> impl Iterator<Item = &StopEvent> + '_ {
        self.resolve_events(self.stop_event_indexes.arrived_between(from, to))
    }

    fn resolve_events<'a>(
        &'a self,
        keys: impl Iterator<Item = &'a StopEventKey> + 'a,
    ) -> impl Iterator<Item = &'a StopEvent> + 'a {
        keys.filter_map(|key| self.stop_events.get(key))
    }

    // ---- Raw mutation (callers have already checked) ----

    fn put_line(&mut self, id: LineId, line: NewLine) {
        let name: Arc<str> = line.line_name.trim().into();
        self.line_names.insert(name.clone(), id);
        self.lines.insert(
            id,
            Line {
                id,
                name,
                vehicle_type: line.vehicle_type,
            },
        );
    }

    fn take_line(&mut self, id: LineId) -> Option<Line> {
        let line = self.lines.remove(&id)?;
        self.line_names.remove(&line.name);
        Some(line)
    }

    fn put_stop(&mut self, id: StopId, stop: NewStop) {
        let name: Arc<str> = stop.stop_name.trim().into();
        self.stop_names.insert(name.clone(), id);
        self.stops.insert(
            id,
            Stop {
                id,
                name,
                location: stop.location,
            },
        );
    }

    fn take_stop(&mut self, id: StopId) -> Option<Stop> {
        let stop = self.stops.remove(&id)?;
        self.stop_names.remove(&stop.name);
        Some(stop)
    }

    fn put_line_stop(&mut self, line_stop: LineStop) -> LineStopKey {
        let key = line_stop.key();
        self.line_stop_indexes.insert(&line_stop);
        self.line_stops.insert(key, line_stop);
        key
    }

    fn take_line_stop(&mut self, key: LineStopKey) -> Option<LineStop> {
        let line_stop = self.line_stops.remove(&key)?;
        self.line_stop_indexes.remove(&line_stop);
        Some(line_stop)
    }

    fn put_trip(&mut self, trip: Trip) {
        self.trip_indexes.insert(&trip);
        self.trips.insert(trip.id.clone(), trip);
    }

    fn take_trip(&mut self, id: &TripIdentifier) -> Option<Trip> {
        let trip = self.trips.remove(id)?;
        self.trip_indexes.remove(&trip);
        Some(trip)
    }

    fn put_stop_event(&mut self, event: StopEvent) -> StopEventKey {
        let key = event.key();
        self.stop_event_indexes.insert(&event);
        self.stop_events.insert(key.clone(), event);
        key
    }

    fn take_stop_event(&mut self, key: &StopEventKey) -> Option<StopEvent> {
        let event = self.stop_events.remove(key)?;
        self.stop_event_indexes.remove(&event);
        Some(event)
    }

    fn remove(&mut self, key: &EntityKey) -> bool {
        match key {
            EntityKey::Line(id) => self.take_line(*id).is_some(),
            EntityKey::Stop(id) => self.take_stop(*id).is_some(),
            EntityKey::LineStop(key) => self.take_line_stop(*key).is_some(),
            EntityKey::Trip(id) => self.take_trip(id).is_some(),
            EntityKey::StopEvent(key) => self.take_stop_event(key).is_some(),
        }
    }
}
