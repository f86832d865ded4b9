//! The event vocabulary reported by the inspected runtime.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of one record in the runtime's store.
pub type DataId = String;

/// One store record: field name to value, including `__typename`.
pub type Record = serde_json::Map<String, Value>;

/// A record mapping as the runtime sends it. `None` marks a deleted record.
pub type StoreRecords = IndexMap<DataId, Option<Record>>;

/// Ids flagged by a notification; only `true` entries count as updated.
pub type UpdatedRecords = IndexMap<DataId, bool>;

pub type EnvironmentId = u64;
pub type TransactionId = u64;

/// Reserved field carrying a record's type.
pub const TYPENAME_KEY: &str = "__typename";
/// Reserved field carrying a record's id.
pub const ID_KEY: &str = "__id";

/// One log event, discriminated by its `name` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum LogEvent {
    #[serde(rename = "queryresource.fetch")]
    QueryResourceFetch(QueryResourceFetch),
    #[serde(rename = "store.publish")]
    StorePublish(StorePublish),
    #[serde(rename = "store.gc")]
    StoreGc(StoreGc),
    #[serde(rename = "store.restore")]
    StoreRestore,
    #[serde(rename = "store.snapshot")]
    StoreSnapshot,
    #[serde(rename = "store.notify.start")]
    StoreNotifyStart,
    #[serde(rename = "store.notify.complete")]
    StoreNotifyComplete(StoreNotifyComplete),
    #[serde(rename = "execute.start", alias = "network.start")]
    NetworkStart(NetworkEvent),
    #[serde(rename = "execute.next", alias = "network.next")]
    NetworkNext(NetworkEvent),
    #[serde(rename = "execute.info", alias = "network.info")]
    NetworkInfo(NetworkEvent),
    #[serde(rename = "execute.error", alias = "network.error")]
    NetworkError(NetworkEvent),
    #[serde(rename = "execute.complete", alias = "network.complete")]
    NetworkComplete(NetworkEvent),
    #[serde(rename = "execute.unsubscribe", alias = "network.unsubscribe")]
    NetworkUnsubscribe(NetworkEvent),
    /// Any tag this build does not know. Kept in the log, projected to nothing.
    #[serde(other)]
    Unknown,
}

impl LogEvent {
    /// Canonical tag of the event; `None` for unknown tags.
    pub fn name(&self) -> Option<&'static str> {
        Some(match self {
            LogEvent::QueryResourceFetch(_) => "queryresource.fetch",
            LogEvent::StorePublish(_) => "store.publish",
            LogEvent::StoreGc(_) => "store.gc",
            LogEvent::StoreRestore => "store.restore",
            LogEvent::StoreSnapshot => "store.snapshot",
            LogEvent::StoreNotifyStart => "store.notify.start",
            LogEvent::StoreNotifyComplete(_) => "store.notify.complete",
            LogEvent::NetworkStart(_) => "execute.start",
            LogEvent::NetworkNext(_) => "execute.next",
            LogEvent::NetworkInfo(_) => "execute.info",
            LogEvent::NetworkError(_) => "execute.error",
            LogEvent::NetworkComplete(_) => "execute.complete",
            LogEvent::NetworkUnsubscribe(_) => "execute.unsubscribe",
            LogEvent::Unknown => return None,
        })
    }

    /// The network payload, for the `execute.*` / `network.*` family.
    pub fn network(&self) -> Option<&NetworkEvent> {
        match self {
            LogEvent::NetworkStart(event)
            | LogEvent::NetworkNext(event)
            | LogEvent::NetworkInfo(event)
            | LogEvent::NetworkError(event)
            | LogEvent::NetworkComplete(event)
            | LogEvent::NetworkUnsubscribe(event) => Some(event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResourceFetch {
    #[serde(default)]
    pub operation: Value,
    #[serde(default)]
    pub fetch_policy: Option<String>,
    #[serde(default)]
    pub render_policy: Option<String>,
    #[serde(default)]
    pub has_full_query: bool,
    #[serde(default)]
    pub should_fetch: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorePublish {
    #[serde(default)]
    pub source: StoreRecords,
    #[serde(default)]
    pub optimistic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreGc {
    #[serde(default)]
    pub references: Vec<DataId>,
    #[serde(default)]
    pub gc_records: StoreRecords,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreNotifyComplete {
    #[serde(default, rename = "updatedRecordIDs")]
    pub updated_record_ids: UpdatedRecords,
    #[serde(default, rename = "invalidatedRecordIDs")]
    pub invalidated_record_ids: Vec<DataId>,
    #[serde(default)]
    pub updated_records: StoreRecords,
    #[serde(default)]
    pub invalidated_records: StoreRecords,
}

/// Payload shared by every network lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEvent {
    #[serde(default, rename = "transactionID")]
    pub transaction_id: Option<TransactionId>,
    #[serde(default)]
    pub network_request_id: Option<TransactionId>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub variables: Value,
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl NetworkEvent {
    /// The transaction this event belongs to. Older runtimes only send a
    /// network request id.
    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction_id.or(self.network_request_id)
    }
}

/// One entry of an environment's ingest log. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub seq: u64,
    pub environment_id: EnvironmentId,
    /// The tag as received, which may be one [`LogEvent`] does not know.
    pub name: String,
    pub event: LogEvent,
}

/// Name and id of one runtime environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub id: EnvironmentId,
    pub environment_name: String,
}

/// A full dump of an environment's records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub name: String,
    pub id: EnvironmentId,
    #[serde(default)]
    pub records: StoreRecords,
}

/// Read the type tag of a record.
pub fn typename(record: &Record) -> Option<&str> {
    record.get(TYPENAME_KEY).and_then(Value::as_str)
}
