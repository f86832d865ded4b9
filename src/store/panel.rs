//! The inspector panel's end of a devtools port: decodes agent traffic into
//! the shared [`InspectorStore`] and sends panel requests back.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::EnvironmentId;
use super::inspector::InspectorStore;
use super::wire::{decode_message, refresh_store_message};
use crate::bridge::{
    channel, Background, PortError, PortMessage, RemotePort, RemoteSender, TabId,
};
use crate::config::Config;

/// Handle the view layer uses while the pump task runs.
#[derive(Clone)]
pub struct Panel {
    store: Arc<Mutex<InspectorStore>>,
    sender: RemoteSender,
}

impl Panel {
    pub fn store(&self) -> &Arc<Mutex<InspectorStore>> {
        &self.store
    }

    /// Capture the live records and ask the agent for a fresh dump.
    pub async fn take_snapshot(
        &self,
        environment_id: EnvironmentId,
    ) -> Result<Option<u64>, PortError> {
        let snapshot_id = self.store.lock().take_snapshot(environment_id);
        self.sender
            .send(refresh_store_message(environment_id))
            .await?;
        Ok(snapshot_id)
    }

    /// Send any wall event toward the agent.
    pub async fn send(&self, message: PortMessage) -> Result<(), PortError> {
        self.sender.send(message).await
    }
}

/// Apply one port message to `store`. Returns how many wall events were used.
pub fn apply_message(store: &Mutex<InspectorStore>, message: &PortMessage) -> usize {
    let events = match decode_message(message) {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %err, "Dropping undecodable panel message");
            return 0;
        }
    };

    let mut applied = 0;
    for wall in events {
        let name = wall.event.clone();
        match wall.into_inbound() {
            Ok(Some(inbound)) => {
                store.lock().apply_inbound(inbound);
                applied += 1;
            }
            Ok(None) => debug!(event = %name, "Ignoring wall event"),
            Err(err) => warn!(error = %err, "Dropping malformed wall event"),
        }
    }
    applied
}

/// Drive `remote` until it disconnects, feeding every message into `store`.
pub fn spawn(mut remote: RemotePort, store: Arc<Mutex<InspectorStore>>) -> (Panel, JoinHandle<u64>) {
    let panel = Panel {
        store: store.clone(),
        sender: remote.sender(),
    };

    let handle = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(message) = remote.recv().await {
            received += 1;
            apply_message(&store, &message);
        }
        info!(received, "Panel disconnected");
        received
    });

    (panel, handle)
}

/// Open the devtools channel for `tab` on `background` and start a panel
/// over a fresh store built from `config`.
pub fn open(background: &Background, tab: TabId, config: &Config) -> (Panel, JoinHandle<u64>) {
    let (port, remote) = channel(tab.to_string(), None, config.relay.channel_capacity);
    background.on_connect(port);
    let store = Arc::new(Mutex::new(InspectorStore::from_config(config)));
    spawn(remote, store)
}
