//! Network request lifecycle, folded per transaction from the event log.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::events::{LogEvent, NetworkEvent, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Active,
    Unsubscribed,
    Completed,
    Error,
}

/// What is known about one request after folding its events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEntry {
    pub id: TransactionId,
    pub params: Value,
    pub variables: Value,
    pub status: RequestStatus,
    pub responses: Vec<Value>,
    pub infos: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RequestEntry {
    fn new(id: TransactionId) -> Self {
        Self {
            id,
            params: Value::Null,
            variables: Value::Null,
            status: RequestStatus::Active,
            responses: Vec::new(),
            infos: Vec::new(),
            error: None,
        }
    }

    /// The request as seen by a single event, without the rest of its history.
    pub fn from_event(event: &LogEvent) -> Option<Self> {
        let id = event.network()?.transaction()?;
        let mut entry = Self::new(id);
        entry.apply(event);
        Some(entry)
    }

    fn fill_request(&mut self, event: &NetworkEvent) {
        if self.params.is_null() && !event.params.is_null() {
            self.params = event.params.clone();
        }
        if self.variables.is_null() && !event.variables.is_null() {
            self.variables = event.variables.clone();
        }
    }

    fn apply(&mut self, event: &LogEvent) {
        if let Some(network) = event.network() {
            self.fill_request(network);
        }
        match event {
            LogEvent::NetworkStart(_) => self.status = RequestStatus::Active,
            LogEvent::NetworkNext(network) => {
                self.status = RequestStatus::Active;
                self.responses
                    .push(network.response.clone().unwrap_or(Value::Null));
            }
            LogEvent::NetworkInfo(network) => {
                self.status = RequestStatus::Active;
                self.infos.push(network.info.clone().unwrap_or(Value::Null));
            }
            LogEvent::NetworkError(network) => {
                self.status = RequestStatus::Error;
                self.error = network.error.clone();
            }
            LogEvent::NetworkComplete(_) => self.status = RequestStatus::Completed,
            LogEvent::NetworkUnsubscribe(_) => self.status = RequestStatus::Unsubscribed,
            LogEvent::QueryResourceFetch(_)
            | LogEvent::StorePublish(_)
            | LogEvent::StoreGc(_)
            | LogEvent::StoreRestore
            | LogEvent::StoreSnapshot
            | LogEvent::StoreNotifyStart
            | LogEvent::StoreNotifyComplete(_)
            | LogEvent::Unknown => {}
        }
    }
}

/// Group network events by transaction, in order of first appearance.
/// Events without a transaction id are skipped.
pub fn derive_requests<'a>(
    events: impl IntoIterator<Item = &'a LogEvent>,
) -> IndexMap<TransactionId, RequestEntry> {
    let mut requests: IndexMap<TransactionId, RequestEntry> = IndexMap::new();
    for event in events {
        let Some(id) = event.network().and_then(NetworkEvent::transaction) else {
            continue;
        };
        requests
            .entry(id)
            .or_insert_with(|| RequestEntry::new(id))
            .apply(event);
    }
    requests
}
