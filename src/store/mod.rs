//! Inspector-side event log and the state derived from it.

pub mod events;
pub mod index;
pub mod inspector;
pub mod log;
pub mod panel;
pub mod projections;
pub mod requests;
pub mod snapshot;
pub mod wire;

pub use events::{
    DataId, EnvironmentId, EnvironmentInfo, Event, LogEvent, NetworkEvent, Record, StoreData,
    StoreRecords, TransactionId,
};
pub use index::{derive_record_index, derive_store_state, RecordIndex, StoreState, TypeIndex};
pub use inspector::{Environment, InspectorStore, StoreChange};
pub use log::{EventLog, RecordingSession};
pub use panel::Panel;
pub use projections::{EventDetails, RecordsKind};
pub use requests::{derive_requests, RequestEntry, RequestStatus};
pub use snapshot::{Snapshot, SnapshotStore};
pub use wire::{DecodeError, EventData, Inbound, WallEvent};
