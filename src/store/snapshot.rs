//! Point-in-time captures of an environment's record index.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::events::EnvironmentId;
use super::index::RecordIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: u64,
    pub environment_id: EnvironmentId,
    pub index: RecordIndex,
    pub created_at: DateTime<Utc>,
}

/// Snapshots per environment, in capture order. Never evicted.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    by_environment: HashMap<EnvironmentId, Vec<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `index` into a new snapshot and return its id. Ids count from 0
    /// per environment.
    pub fn take(&mut self, environment_id: EnvironmentId, index: &RecordIndex) -> u64 {
        let snapshots = self.by_environment.entry(environment_id).or_default();
        let id = snapshots.len() as u64;
        snapshots.push(Snapshot {
            id,
            environment_id,
            index: index.clone(),
            created_at: Utc::now(),
        });
        tracing::debug!(environment_id, snapshot_id = id, records = index.len(), "Snapshot taken");
        id
    }

    pub fn list(&self, environment_id: EnvironmentId) -> &[Snapshot] {
        self.by_environment
            .get(&environment_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, environment_id: EnvironmentId, id: u64) -> Option<&Snapshot> {
        self.list(environment_id)
            .get(usize::try_from(id).ok()?)
    }

    pub fn latest(&self, environment_id: EnvironmentId) -> Option<&Snapshot> {
        self.list(environment_id).last()
    }
}
