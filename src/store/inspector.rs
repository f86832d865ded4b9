//! The inspector-side store: every environment's log, live state, recording
//! and snapshots, plus the query surface the panel reads from.

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::events::{EnvironmentId, EnvironmentInfo, Event, LogEvent, StoreData, TransactionId};
use super::index::{RecordIndex, StoreState};
use super::log::{EventLog, RecordingSession};
use super::projections::EventDetails;
use super::requests::{derive_requests, RequestEntry};
use super::snapshot::{Snapshot, SnapshotStore};
use super::wire::{EventData, Inbound};
use crate::config::Config;

const CHANGE_CAPACITY: usize = 64;

/// Published after every write so views know to re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    EnvironmentAdded(EnvironmentId),
    StoreDataReceived(EnvironmentId),
    EventsReceived(EnvironmentId),
    SnapshotTaken {
        environment_id: EnvironmentId,
        snapshot_id: u64,
    },
    RecordingChanged(bool),
    EventsCleared,
}

/// One runtime environment as seen by the inspector.
#[derive(Debug, Clone)]
pub struct Environment {
    pub info: EnvironmentInfo,
    log: EventLog,
    state: StoreState,
}

impl Environment {
    fn new(id: EnvironmentId, name: String) -> Self {
        Self {
            info: EnvironmentInfo {
                id,
                environment_name: name,
            },
            log: EventLog::new(id),
            state: StoreState::new(),
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }
}

#[derive(Debug)]
pub struct InspectorStore {
    environments: IndexMap<EnvironmentId, Environment>,
    recording: RecordingSession,
    snapshots: SnapshotStore,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for InspectorStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl InspectorStore {
    /// A store that starts recording when `[inspector] record_on_start` says so.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.inspector.record_on_start)
    }

    pub fn new(record_on_start: bool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            environments: IndexMap::new(),
            recording: RecordingSession::new(record_on_start),
            snapshots: SnapshotStore::new(),
            changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn notify(&self, change: StoreChange) {
        if self.changes.send(change).is_err() {
            debug!("No store change subscribers");
        }
    }

    fn environment_mut(&mut self, id: EnvironmentId) -> &mut Environment {
        if !self.environments.contains_key(&id) {
            self.environments
                .insert(id, Environment::new(id, String::new()));
            self.notify(StoreChange::EnvironmentAdded(id));
        }
        &mut self.environments[&id]
    }

    /// Register or rename an environment.
    pub fn add_environment(&mut self, info: EnvironmentInfo) {
        info!(environment_id = info.id, name = %info.environment_name, "Environment initialized");
        self.environment_mut(info.id).info.environment_name = info.environment_name;
    }

    pub fn environments(&self) -> impl Iterator<Item = &EnvironmentInfo> {
        self.environments.values().map(|env| &env.info)
    }

    pub fn environment(&self, id: EnvironmentId) -> Option<&Environment> {
        self.environments.get(&id)
    }

    /// Append a decoded event under its canonical tag. Returns its sequence id.
    pub fn ingest(&mut self, environment_id: EnvironmentId, event: LogEvent) -> u64 {
        let name = event.name().unwrap_or_default().to_string();
        self.append(environment_id, name, event)
    }

    /// Append a raw runtime event. The received tag is kept even when the
    /// payload cannot be decoded.
    pub fn ingest_raw(&mut self, environment_id: EnvironmentId, data: Value) -> u64 {
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let event = serde_json::from_value(data).unwrap_or_else(|err| {
            debug!(environment_id, name = %name, error = %err, "Undecodable log event");
            LogEvent::Unknown
        });
        self.append(environment_id, name, event)
    }

    fn append(&mut self, environment_id: EnvironmentId, name: String, event: LogEvent) -> u64 {
        let env = self.environment_mut(environment_id);
        env.state.apply(&event);
        let seq = env.log.ingest(name, event);
        if let Some(appended) = self
            .environments
            .get(&environment_id)
            .and_then(|env| env.log.get(seq))
        {
            self.recording.record(appended);
        }
        seq
    }

    /// Feed one batch of agent events. Notifies once per environment touched.
    pub fn receive_events(&mut self, events: Vec<EventData>) {
        let mut touched: Vec<EnvironmentId> = Vec::new();
        for EventData { id, data, .. } in events {
            self.ingest_raw(id, data);
            if !touched.contains(&id) {
                touched.push(id);
            }
        }
        for id in touched {
            self.notify(StoreChange::EventsReceived(id));
        }
    }

    /// Replace an environment's durable records with a full dump.
    pub fn receive_store_data(&mut self, data: StoreData) {
        let StoreData { name, id, records } = data;
        let env = self.environment_mut(id);
        if !name.is_empty() {
            env.info.environment_name = name;
        }
        env.state.records = RecordIndex::from_records(&records);
        self.notify(StoreChange::StoreDataReceived(id));
    }

    pub fn apply_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::EnvironmentInitialized(info) => self.add_environment(info),
            Inbound::Events(events) => self.receive_events(events),
            Inbound::StoreRecords(data) => self.receive_store_data(data),
        }
    }

    pub fn get_records(&self, environment_id: EnvironmentId) -> Option<&RecordIndex> {
        self.environments
            .get(&environment_id)
            .map(|env| &env.state.records)
    }

    pub fn get_optimistic_updates(&self, environment_id: EnvironmentId) -> Option<&RecordIndex> {
        self.environments
            .get(&environment_id)
            .map(|env| &env.state.optimistic)
    }

    /// Events recorded for an environment.
    pub fn get_events(&self, environment_id: EnvironmentId) -> &[Event] {
        self.recording.events(environment_id)
    }

    /// Every event ingested for an environment, recorded or not.
    pub fn log(&self, environment_id: EnvironmentId) -> &[Event] {
        self.environments
            .get(&environment_id)
            .map(|env| env.log.events())
            .unwrap_or_default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_active()
    }

    pub fn start_recording(&mut self) {
        self.recording.start();
        self.notify(StoreChange::RecordingChanged(true));
    }

    pub fn stop_recording(&mut self) {
        self.recording.stop();
        self.notify(StoreChange::RecordingChanged(false));
    }

    pub fn clear_all_events(&mut self) {
        self.recording.clear();
        self.notify(StoreChange::EventsCleared);
    }

    /// Capture the live records. `None` for an unknown environment.
    pub fn take_snapshot(&mut self, environment_id: EnvironmentId) -> Option<u64> {
        let records = &self.environments.get(&environment_id)?.state.records;
        let snapshot_id = self.snapshots.take(environment_id, records);
        self.notify(StoreChange::SnapshotTaken {
            environment_id,
            snapshot_id,
        });
        Some(snapshot_id)
    }

    pub fn snapshots(&self, environment_id: EnvironmentId) -> &[Snapshot] {
        self.snapshots.list(environment_id)
    }

    pub fn snapshot(&self, environment_id: EnvironmentId, snapshot_id: u64) -> Option<&Snapshot> {
        self.snapshots.get(environment_id, snapshot_id)
    }

    /// Request lifecycle for an environment, folded from its full log.
    pub fn requests(&self, environment_id: EnvironmentId) -> IndexMap<TransactionId, RequestEntry> {
        derive_requests(self.log(environment_id).iter().map(|event| &event.event))
    }

    /// Details of the recorded event at `index`.
    pub fn event_details(&self, environment_id: EnvironmentId, index: usize) -> EventDetails {
        EventDetails::of(self.get_events(environment_id).get(index))
    }
}
