//! Per-tab bookkeeping of connected ports and their relay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::port::{Port, Role, TabId};
use super::relay;

/// One registered port. Its `Port` stays here until a relay takes it.
struct Slot {
    port_id: u64,
    name: String,
    token: CancellationToken,
    pending: Option<Port>,
}

struct RelayLink {
    id: u64,
    inspector_port: u64,
    agent_port: u64,
    shutdown: CancellationToken,
}

impl RelayLink {
    fn involves(&self, port_id: u64) -> bool {
        self.inspector_port == port_id || self.agent_port == port_id
    }
}

#[derive(Default)]
struct TabSession {
    inspector: Option<Slot>,
    agent: Option<Slot>,
    relay: Option<RelayLink>,
}

impl TabSession {
    fn slot(&self, role: Role) -> Option<&Slot> {
        match role {
            Role::Inspector => self.inspector.as_ref(),
            Role::Agent => self.agent.as_ref(),
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<Slot> {
        match role {
            Role::Inspector => &mut self.inspector,
            Role::Agent => &mut self.agent,
        }
    }

    fn is_empty(&self) -> bool {
        self.inspector.is_none() && self.agent.is_none() && self.relay.is_none()
    }

    /// Stop the relay, then disconnect and forget the peer of `role`.
    fn tear_down_relay(&mut self, tab: TabId, role: Role) {
        let Some(link) = self.relay.take() else {
            return;
        };
        link.shutdown.cancel();
        if let Some(peer) = self.slot_mut(role.peer()).take() {
            peer.token.cancel();
        }
        tracing::info!(%tab, relay_id = link.id, "Relay torn down");
    }
}

struct Inner {
    sessions: Mutex<HashMap<TabId, TabSession>>,
    next_port_id: AtomicU64,
    next_relay_id: AtomicU64,
}

/// Tracks, per tab, the inspector and agent ports and the relay between them.
///
/// A relay exists for a tab exactly when both roles are registered. Cloning
/// the registry yields another handle to the same state.
#[derive(Clone)]
pub struct PortRegistry {
    inner: Arc<Inner>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                next_port_id: AtomicU64::new(1),
                next_relay_id: AtomicU64::new(1),
            }),
        }
    }

    /// Store `port` as the `role` channel of `tab`.
    ///
    /// A live channel already in that slot is treated as stale: any relay it
    /// takes part in is shut down, both of its ports are disconnected, and only
    /// then is the new port stored. Returns the relay id when this
    /// registration completed a pairing.
    pub fn register(&self, tab: TabId, role: Role, port: Port) -> Option<u64> {
        let port_id = self.inner.next_port_id.fetch_add(1, Ordering::SeqCst);
        let token = port.disconnect_token();

        let relay_id = {
            let mut sessions = self.inner.sessions.lock();
            let session = sessions.entry(tab).or_default();

            if let Some(stale) = session.slot_mut(role).take() {
                tracing::warn!(
                    %tab,
                    role = role.as_str(),
                    stale = %stale.name,
                    "Channel reconnected; dropping stale pairing"
                );
                session.tear_down_relay(tab, role);
                stale.token.cancel();
            }

            *session.slot_mut(role) = Some(Slot {
                port_id,
                name: port.name().to_string(),
                token: token.clone(),
                pending: Some(port),
            });

            self.establish_relay(tab, session)
        };

        self.watch(tab, role, port_id, token);
        relay_id
    }

    /// Pair the two pending ports of `session`, if both are present.
    fn establish_relay(&self, tab: TabId, session: &mut TabSession) -> Option<u64> {
        if session.relay.is_some() {
            return None;
        }
        let (Some(inspector_slot), Some(agent_slot)) =
            (session.inspector.as_mut(), session.agent.as_mut())
        else {
            return None;
        };
        let (inspector, agent) = match (inspector_slot.pending.take(), agent_slot.pending.take())
        {
            (Some(inspector), Some(agent)) => (inspector, agent),
            (inspector, agent) => {
                inspector_slot.pending = inspector;
                agent_slot.pending = agent;
                return None;
            }
        };

        let id = self.inner.next_relay_id.fetch_add(1, Ordering::SeqCst);
        let shutdown = CancellationToken::new();
        session.relay = Some(RelayLink {
            id,
            inspector_port: inspector_slot.port_id,
            agent_port: agent_slot.port_id,
            shutdown: shutdown.clone(),
        });
        relay::spawn(tab, inspector, agent, shutdown);
        tracing::info!(%tab, relay_id = id, "Relay established");
        Some(id)
    }

    /// Clear the slot when its port disconnects, from either end.
    fn watch(&self, tab: TabId, role: Role, port_id: u64, token: CancellationToken) {
        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            token.cancelled().await;
            if let Some(inner) = registry.upgrade() {
                PortRegistry { inner }.release(tab, role, port_id);
            }
        });
    }

    /// Forget port `port_id` of `tab`. A relay it belongs to is stopped and
    /// its peer disconnected. Unknown or already-replaced ports are ignored.
    pub(crate) fn release(&self, tab: TabId, role: Role, port_id: u64) {
        let mut sessions = self.inner.sessions.lock();
        let Some(session) = sessions.get_mut(&tab) else {
            return;
        };
        if session.slot(role).map(|slot| slot.port_id) != Some(port_id) {
            return;
        }

        session.slot_mut(role).take();
        if session
            .relay
            .as_ref()
            .is_some_and(|link| link.involves(port_id))
        {
            session.tear_down_relay(tab, role);
        }
        tracing::debug!(%tab, role = role.as_str(), "Channel released");

        if session.is_empty() {
            sessions.remove(&tab);
        }
    }

    /// Disconnect everything registered for `tab`.
    pub fn disconnect_tab(&self, tab: TabId) {
        let Some(session) = self.inner.sessions.lock().remove(&tab) else {
            return;
        };
        if let Some(link) = &session.relay {
            link.shutdown.cancel();
        }
        for slot in [&session.inspector, &session.agent].into_iter().flatten() {
            slot.token.cancel();
        }
    }

    /// Disconnect every tab. The registry stays usable afterwards.
    pub fn shutdown(&self) {
        let sessions: Vec<TabSession> = self.inner.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            if let Some(link) = &session.relay {
                link.shutdown.cancel();
            }
            for slot in [&session.inspector, &session.agent].into_iter().flatten() {
                slot.token.cancel();
            }
        }
    }

    pub fn is_registered(&self, tab: TabId, role: Role) -> bool {
        self.inner
            .sessions
            .lock()
            .get(&tab)
            .is_some_and(|session| session.slot(role).is_some())
    }

    pub fn has_relay(&self, tab: TabId) -> bool {
        self.inner
            .sessions
            .lock()
            .get(&tab)
            .is_some_and(|session| session.relay.is_some())
    }

    pub fn relay_count(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .values()
            .filter(|session| session.relay.is_some())
            .count()
    }

    /// Tabs with at least one registered port, in ascending order.
    pub fn tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self.inner.sessions.lock().keys().copied().collect();
        tabs.sort();
        tabs
    }
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}
