//! Per-environment ingest log and the user-controlled recording view.

use indexmap::IndexMap;

use super::events::{EnvironmentId, Event, LogEvent};

/// Append-only event log of one environment. Sequence ids start at 0 and
/// equal the event's position.
#[derive(Debug, Clone)]
pub struct EventLog {
    environment_id: EnvironmentId,
    events: Vec<Event>,
}

impl EventLog {
    pub fn new(environment_id: EnvironmentId) -> Self {
        Self {
            environment_id,
            events: Vec::new(),
        }
    }

    pub fn environment_id(&self) -> EnvironmentId {
        self.environment_id
    }

    /// Append an event and return its sequence id. Never rejects.
    pub fn ingest(&mut self, name: impl Into<String>, event: LogEvent) -> u64 {
        let seq = self.events.len() as u64;
        self.events.push(Event {
            seq,
            environment_id: self.environment_id,
            name: name.into(),
            event,
        });
        seq
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events with a sequence id of at least `seq`.
    pub fn since(&self, seq: u64) -> &[Event] {
        let start = usize::try_from(seq).unwrap_or(usize::MAX).min(self.events.len());
        &self.events[start..]
    }

    pub fn get(&self, seq: u64) -> Option<&Event> {
        usize::try_from(seq).ok().and_then(|i| self.events.get(i))
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.events.last().map(|event| event.seq)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Events captured while the user has recording switched on.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    active: bool,
    events: IndexMap<EnvironmentId, Vec<Event>>,
}

impl RecordingSession {
    pub fn new(active: bool) -> Self {
        Self {
            active,
            events: IndexMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    /// Stop routing new events. What was recorded stays.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Drop recorded events for every environment. Liveness is untouched.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Keep a copy of `event` if recording. Returns whether it was kept.
    pub fn record(&mut self, event: &Event) -> bool {
        if !self.active {
            return false;
        }
        self.events
            .entry(event.environment_id)
            .or_default()
            .push(event.clone());
        true
    }

    pub fn events(&self, environment_id: EnvironmentId) -> &[Event] {
        self.events
            .get(&environment_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
