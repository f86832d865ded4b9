//! Read-only views of single events: what a selected log entry shows.

use serde::Serialize;

use super::events::{typename, Event, LogEvent, StoreGc, StoreNotifyComplete, StoreRecords};
use super::index::{TypeIndex, DELETED_RECORDS, UNKNOWN_TYPENAME};
use super::requests::RequestEntry;

/// Records a `store.gc` event reports as collected: the referenced ids that
/// still have a value, in reference order.
pub fn collected_records(gc: &StoreGc) -> StoreRecords {
    gc.references
        .iter()
        .filter_map(|id| match gc.gc_records.get(id) {
            Some(Some(record)) => Some((id.clone(), Some(record.clone()))),
            _ => None,
        })
        .collect()
}

/// Records a notification flags as updated, with their partition. Null
/// records are kept and bucketed under [`DELETED_RECORDS`]; flagged ids with
/// no entry at all are left out.
pub fn updated_records(notify: &StoreNotifyComplete) -> (StoreRecords, TypeIndex) {
    let records: StoreRecords = notify
        .updated_record_ids
        .iter()
        .filter(|(_, updated)| **updated)
        .filter_map(|(id, _)| {
            notify
                .updated_records
                .get(id)
                .map(|record| (id.clone(), record.clone()))
        })
        .collect();

    let mut by_type = TypeIndex::new();
    for (id, record) in &records {
        match record {
            Some(record) => by_type.push(typename(record).unwrap_or(UNKNOWN_TYPENAME), id.clone()),
            None => by_type.push(DELETED_RECORDS, id.clone()),
        }
    }
    (records, by_type)
}

/// Records a notification reports as invalidated, with their partition.
pub fn invalidated_records(notify: &StoreNotifyComplete) -> (StoreRecords, TypeIndex) {
    let records: StoreRecords = notify
        .invalidated_records
        .iter()
        .filter(|(_, record)| record.is_some())
        .map(|(id, record)| (id.clone(), record.clone()))
        .collect();
    let by_type = TypeIndex::partition(&records);
    (records, by_type)
}

/// Short label shown in the event list; `None` hides the event.
pub fn label(event: &LogEvent) -> Option<&'static str> {
    Some(match event {
        LogEvent::StorePublish(publish) if publish.optimistic => "Store Optimistic Update",
        LogEvent::StorePublish(_) => "Store Publish",
        LogEvent::StoreGc(_) => "Store GC",
        LogEvent::StoreRestore => "Store Restore",
        LogEvent::StoreSnapshot => "Store Snapshot",
        LogEvent::StoreNotifyStart => "Notify Start",
        LogEvent::StoreNotifyComplete(_) => "Notify Complete",
        LogEvent::QueryResourceFetch(_) => "QueryResource Fetch",
        LogEvent::NetworkStart(_) => "Network Start",
        LogEvent::NetworkInfo(_) => "Network Info",
        LogEvent::NetworkNext(_) => "Network Next",
        LogEvent::NetworkComplete(_) => "Network Complete",
        LogEvent::NetworkUnsubscribe(_) => "Network Unsubscribe",
        LogEvent::NetworkError(_) => "Network Error",
        LogEvent::Unknown => return None,
    })
}

/// Events whose label contains any whitespace-separated term, ignoring case.
pub fn search_events<'a>(events: &'a [Event], query: &str) -> Vec<&'a Event> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    events
        .iter()
        .filter(|event| {
            let Some(label) = label(&event.event) else {
                return false;
            };
            let label = label.to_lowercase();
            terms.is_empty() || terms.iter().any(|term| label.contains(term))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordsKind {
    Published,
    OptimisticUpdate,
    Collected,
}

impl RecordsKind {
    pub fn explanation(self) -> &'static str {
        match self {
            RecordsKind::Published => "The following records have been published to the store:",
            RecordsKind::OptimisticUpdate => {
                "The following records are part of an optimistic update to the store:"
            }
            RecordsKind::Collected => "The following records have been garbage collected:",
        }
    }
}

/// Everything the detail pane shows for one selected event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventDetails {
    /// No event at the selected position.
    Missing,
    Records {
        records_kind: RecordsKind,
        records: StoreRecords,
        by_type: TypeIndex,
    },
    Notify {
        updated: StoreRecords,
        updated_by_type: TypeIndex,
        invalidated: StoreRecords,
        invalidated_by_type: TypeIndex,
    },
    Request {
        explanation: &'static str,
        request: RequestEntry,
    },
    Marker {
        message: &'static str,
    },
    /// Nothing to show: unknown tag or a network event without a transaction.
    Empty,
}

impl EventDetails {
    pub fn of(event: Option<&Event>) -> Self {
        match event {
            Some(event) => Self::for_event(&event.event),
            None => EventDetails::Missing,
        }
    }

    pub fn for_event(event: &LogEvent) -> Self {
        match event {
            LogEvent::StorePublish(publish) => EventDetails::Records {
                records_kind: if publish.optimistic {
                    RecordsKind::OptimisticUpdate
                } else {
                    RecordsKind::Published
                },
                by_type: TypeIndex::partition(&publish.source),
                records: publish.source.clone(),
            },
            LogEvent::StoreGc(gc) => {
                let records = collected_records(gc);
                EventDetails::Records {
                    records_kind: RecordsKind::Collected,
                    by_type: TypeIndex::partition(&records),
                    records,
                }
            }
            LogEvent::StoreNotifyComplete(notify) => {
                let (updated, updated_by_type) = updated_records(notify);
                let (invalidated, invalidated_by_type) = invalidated_records(notify);
                EventDetails::Notify {
                    updated,
                    updated_by_type,
                    invalidated,
                    invalidated_by_type,
                }
            }
            LogEvent::NetworkStart(_)
            | LogEvent::NetworkNext(_)
            | LogEvent::NetworkInfo(_)
            | LogEvent::NetworkError(_)
            | LogEvent::NetworkComplete(_)
            | LogEvent::NetworkUnsubscribe(_) => match RequestEntry::from_event(event) {
                Some(request) => EventDetails::Request {
                    explanation: request_explanation(event),
                    request,
                },
                None => EventDetails::Empty,
            },
            LogEvent::StoreRestore => EventDetails::Marker {
                message: "All optimistic updates have been restored",
            },
            LogEvent::QueryResourceFetch(_) => EventDetails::Marker {
                message: "Query Resource Fetched",
            },
            LogEvent::StoreSnapshot => EventDetails::Marker {
                message: "A snapshot was taken in the runtime store.",
            },
            LogEvent::StoreNotifyStart => EventDetails::Marker {
                message: "A notification was sent to the store, signaling an update.",
            },
            LogEvent::Unknown => EventDetails::Empty,
        }
    }
}

fn request_explanation(event: &LogEvent) -> &'static str {
    match event {
        LogEvent::NetworkStart(_) => {
            "The following network request has been sent. Responses will soon follow in an execute.next event:"
        }
        LogEvent::NetworkNext(_) => "A response for the following request was received:",
        LogEvent::NetworkInfo(_) => "The info array for the following request was updated:",
        LogEvent::NetworkError(_) => "There was an error with the following network request:",
        LogEvent::NetworkComplete(_) => {
            "The following network request is complete. All info and responses have been received:"
        }
        LogEvent::NetworkUnsubscribe(_) => "The following network request is no longer active:",
        _ => "",
    }
}
