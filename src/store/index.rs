//! Type-partitioned record sets and the fold that derives them from the log.

use indexmap::IndexMap;
use serde::Serialize;

use super::events::{typename, DataId, Event, LogEvent, Record, StoreRecords};

/// Bucket for updated records whose new value is null.
pub const DELETED_RECORDS: &str = "DeletedRecords";
/// Bucket for records that carry no string type tag.
pub const UNKNOWN_TYPENAME: &str = "(unknown)";

/// Typename → record ids, both in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TypeIndex {
    buckets: IndexMap<String, Vec<DataId>>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition a record mapping. Null records are skipped.
    pub fn partition(records: &StoreRecords) -> Self {
        Self::from_records(
            records
                .iter()
                .filter_map(|(id, record)| record.as_ref().map(|record| (id, record))),
        )
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = (&'a DataId, &'a Record)>) -> Self {
        let mut index = Self::new();
        for (id, record) in records {
            index.push(typename(record).unwrap_or(UNKNOWN_TYPENAME), id.clone());
        }
        index
    }

    pub(crate) fn push(&mut self, typename: &str, id: DataId) {
        match self.buckets.get_mut(typename) {
            Some(ids) => ids.push(id),
            None => {
                self.buckets.insert(typename.to_string(), vec![id]);
            }
        }
    }

    pub fn bucket(&self, typename: &str) -> Option<&[DataId]> {
        self.buckets.get(typename).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DataId])> {
        self.buckets
            .iter()
            .map(|(typename, ids)| (typename.as_str(), ids.as_slice()))
    }

    pub fn typenames(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of ids across all buckets.
    pub fn id_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn typename_of(&self, id: &str) -> Option<&str> {
        self.buckets
            .iter()
            .find(|(_, ids)| ids.iter().any(|candidate| candidate == id))
            .map(|(typename, _)| typename.as_str())
    }

    /// Keep ids where any whitespace-separated term occurs, case-insensitively,
    /// in the id or its typename. Buckets left empty are dropped. A blank
    /// query keeps everything.
    pub fn filter(&self, query: &str) -> TypeIndex {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return self.clone();
        }

        let mut filtered = TypeIndex::new();
        for (typename, ids) in &self.buckets {
            let lowered_type = typename.to_lowercase();
            for id in ids {
                let lowered_id = id.to_lowercase();
                if terms
                    .iter()
                    .any(|term| lowered_id.contains(term) || lowered_type.contains(term))
                {
                    filtered.push(typename, id.clone());
                }
            }
        }
        filtered
    }
}

/// A record set at one point in time together with its type partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIndex {
    records: IndexMap<DataId, Record>,
    by_type: TypeIndex,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &StoreRecords) -> Self {
        let mut index = Self::new();
        index.merge(records);
        index
    }

    /// Merge `source` into the set: records overwrite by id, nulls delete.
    pub fn merge(&mut self, source: &StoreRecords) {
        for (id, record) in source {
            match record {
                Some(record) => {
                    self.records.insert(id.clone(), record.clone());
                }
                None => {
                    self.records.shift_remove(id);
                }
            }
        }
        self.reindex();
    }

    fn reindex(&mut self) {
        self.by_type = TypeIndex::from_records(self.records.iter());
    }

    pub fn records(&self) -> &IndexMap<DataId, Record> {
        &self.records
    }

    pub fn by_type(&self) -> &TypeIndex {
        &self.by_type
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Durable records and the optimistic overlay of one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub records: RecordIndex,
    pub optimistic: RecordIndex,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a full dump of the durable records.
    pub fn with_records(records: &StoreRecords) -> Self {
        Self {
            records: RecordIndex::from_records(records),
            optimistic: RecordIndex::new(),
        }
    }

    /// Fold one event. Returns whether either record set changed.
    pub fn apply(&mut self, event: &LogEvent) -> bool {
        match event {
            LogEvent::StorePublish(publish) => {
                if publish.optimistic {
                    self.optimistic.merge(&publish.source);
                } else {
                    self.records.merge(&publish.source);
                }
                true
            }
            // Collected and notified records are projections of the event
            // itself, never of the live set.
            LogEvent::StoreGc(_) | LogEvent::StoreNotifyComplete(_) => false,
            LogEvent::NetworkStart(_)
            | LogEvent::NetworkNext(_)
            | LogEvent::NetworkInfo(_)
            | LogEvent::NetworkError(_)
            | LogEvent::NetworkComplete(_)
            | LogEvent::NetworkUnsubscribe(_) => false,
            LogEvent::StoreRestore
            | LogEvent::StoreSnapshot
            | LogEvent::StoreNotifyStart
            | LogEvent::QueryResourceFetch(_)
            | LogEvent::Unknown => false,
        }
    }
}

/// Fold `events` (up to and including `upto`, when given) into store state.
pub fn derive_store_state(events: &[Event], upto: Option<u64>) -> StoreState {
    let mut state = StoreState::new();
    for event in events
        .iter()
        .take_while(|event| upto.map_or(true, |upto| event.seq <= upto))
    {
        state.apply(&event.event);
    }
    state
}

/// The durable record index as of `upto`.
pub fn derive_record_index(events: &[Event], upto: Option<u64>) -> RecordIndex {
    derive_store_state(events, upto).records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::events::StorePublish;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(typename: &str, id: &str) -> Record {
        let serde_json::Value::Object(map) = json!({"__typename": typename, "__id": id}) else {
            unreachable!()
        };
        map
    }

    fn publish(seq: u64, entries: &[(&str, Option<&str>)], optimistic: bool) -> Event {
        let source: StoreRecords = entries
            .iter()
            .map(|(id, ty)| (id.to_string(), ty.map(|ty| record(ty, id))))
            .collect();
        Event {
            seq,
            environment_id: 1,
            name: "store.publish".to_string(),
            event: LogEvent::StorePublish(StorePublish { source, optimistic }),
        }
    }

    #[test]
    fn partition_keeps_first_seen_order_and_skips_nulls() {
        let mut records = StoreRecords::new();
        records.insert("u1".into(), Some(record("User", "u1")));
        records.insert("p1".into(), Some(record("Post", "p1")));
        records.insert("gone".into(), None);
        records.insert("u2".into(), Some(record("User", "u2")));

        let index = TypeIndex::partition(&records);

        assert_eq!(index.typenames().collect::<Vec<_>>(), vec!["User", "Post"]);
        assert_eq!(index.bucket("User").unwrap(), ["u1", "u2"]);
        assert_eq!(index.id_count(), 3);
        assert_eq!(index.typename_of("gone"), None);
    }

    #[test]
    fn all_null_mapping_yields_empty_index() {
        let mut records = StoreRecords::new();
        records.insert("a".into(), None);
        let index = RecordIndex::from_records(&records);
        assert!(index.is_empty());
        assert!(index.by_type().is_empty());
    }

    #[test]
    fn publish_then_null_deletes() {
        let events = vec![
            publish(0, &[("r1", Some("User"))], false),
            publish(1, &[("r1", None)], false),
        ];
        let index = derive_record_index(&events, None);
        assert!(index.is_empty());
        assert!(index.by_type().is_empty());

        let before = derive_record_index(&events, Some(0));
        assert!(before.contains("r1"));
    }

    #[test]
    fn optimistic_publish_lands_in_overlay() {
        let events = vec![
            publish(0, &[("r1", Some("User"))], false),
            publish(1, &[("r2", Some("User"))], true),
        ];
        let state = derive_store_state(&events, None);
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.optimistic.len(), 1);
        assert!(state.optimistic.contains("r2"));
    }

    #[test]
    fn overwrite_can_move_a_record_between_types() {
        let events = vec![
            publish(0, &[("x", Some("Draft"))], false),
            publish(1, &[("x", Some("Post"))], false),
        ];
        let index = derive_record_index(&events, None);
        assert_eq!(index.by_type().bucket("Draft"), None);
        assert_eq!(index.by_type().bucket("Post").unwrap(), ["x"]);
    }

    #[test]
    fn untyped_records_go_to_unknown_bucket() {
        let mut records = StoreRecords::new();
        records.insert("client:root".into(), Some(Record::new()));
        let index = TypeIndex::partition(&records);
        assert_eq!(index.bucket(UNKNOWN_TYPENAME).unwrap(), ["client:root"]);
    }

    #[test]
    fn filter_matches_ids_or_typenames() {
        let mut records = StoreRecords::new();
        records.insert("user-1".into(), Some(record("User", "user-1")));
        records.insert("post-1".into(), Some(record("Post", "post-1")));
        records.insert("c1".into(), Some(record("Comment", "c1")));
        let index = TypeIndex::partition(&records);

        let filtered = index.filter("USER comm");
        assert_eq!(filtered.bucket("User").unwrap(), ["user-1"]);
        assert_eq!(filtered.bucket("Comment").unwrap(), ["c1"]);
        assert_eq!(filtered.bucket("Post"), None);
        assert_eq!(index.filter("   "), index);
    }

    fn arb_records() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
        prop::collection::vec(
            (
                "[a-e][0-9]",
                prop::option::of(prop::sample::select(vec![
                    "User".to_string(),
                    "Post".to_string(),
                    "Comment".to_string(),
                ])),
            ),
            0..24,
        )
    }

    fn to_store_records(entries: &[(String, Option<String>)]) -> StoreRecords {
        entries
            .iter()
            .map(|(id, ty)| (id.clone(), ty.as_ref().map(|ty| record(ty, id))))
            .collect()
    }

    proptest! {
        #[test]
        fn partition_covers_every_non_null_record_once(entries in arb_records()) {
            let records = to_store_records(&entries);
            let index = TypeIndex::partition(&records);

            let non_null = records.values().filter(|r| r.is_some()).count();
            prop_assert_eq!(index.id_count(), non_null);
            for (id, record) in &records {
                let hits = index.iter().filter(|(_, ids)| ids.contains(id)).count();
                prop_assert_eq!(hits, usize::from(record.is_some()));
            }
        }

        #[test]
        fn derivation_is_deterministic_and_appending_only_adds(
            first in arb_records(),
            second in arb_records(),
        ) {
            let mut events = vec![Event {
                seq: 0,
                environment_id: 1,
                name: "store.publish".into(),
                event: LogEvent::StorePublish(StorePublish {
                    source: to_store_records(&first),
                    optimistic: false,
                }),
            }];
            let before = derive_record_index(&events, None);
            prop_assert_eq!(&before, &derive_record_index(&events, None));

            let second = to_store_records(&second);
            events.push(Event {
                seq: 1,
                environment_id: 1,
                name: "store.publish".into(),
                event: LogEvent::StorePublish(StorePublish { source: second.clone(), optimistic: false }),
            });
            let after = derive_record_index(&events, None);

            for id in before.records().keys() {
                let deleted = matches!(second.get(id), Some(None));
                prop_assert_eq!(after.contains(id), !deleted);
            }
        }
    }
}
