//! The background controller: classifies incoming ports, pairs them per tab,
//! and keeps the toolbar icon in step with what the page reports.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::chrome::{ActionAppearance, ActionSurface, IconState, TabScripting};
use super::port::{Port, Role, TabId};
use super::registry::PortRegistry;

/// One-shot message a page sends to the background outside any port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeMessage {
    #[serde(default, alias = "hasDetectedReact")]
    pub has_detected_runtime: bool,
}

/// Navigation progress reported for a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabUpdate {
    pub active: bool,
    #[serde(default)]
    pub status: Option<String>,
}

impl TabUpdate {
    fn is_loading(&self) -> bool {
        self.status.as_deref() == Some("loading")
    }
}

/// Result of classifying a newly connected port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub tab: TabId,
    pub role: Role,
    /// Set when this connection completed a pairing.
    pub relay_id: Option<u64>,
}

/// Work out which tab and role a port belongs to.
///
/// A port named with a tab id is the inspector's; any other name is the
/// agent's content script, keyed by the tab that opened it.
pub fn classify(port: &Port) -> Option<(TabId, Role)> {
    if let Some(tab) = TabId::from_port_name(port.name()) {
        return Some((tab, Role::Inspector));
    }
    port.sender_tab().map(|tab| (tab, Role::Agent))
}

pub struct Background {
    registry: PortRegistry,
    scripting: Arc<dyn TabScripting>,
    action: Arc<dyn ActionSurface>,
    suppress_loading_flicker: bool,
}

impl Background {
    pub fn new(
        registry: PortRegistry,
        scripting: Arc<dyn TabScripting>,
        action: Arc<dyn ActionSurface>,
    ) -> Self {
        Self {
            registry,
            scripting,
            action,
            suppress_loading_flicker: false,
        }
    }

    /// Reset the icon to disabled whenever the active tab starts loading.
    /// Some browsers keep a stale enabled icon across navigations otherwise.
    pub fn with_suppress_loading_flicker(mut self, enabled: bool) -> Self {
        self.suppress_loading_flicker = enabled;
        self
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// Accept a new port. Inspector ports trigger agent injection into their
    /// tab. Ports that cannot be attributed to a tab are disconnected.
    pub fn on_connect(&self, port: Port) -> Option<Connection> {
        let Some((tab, role)) = classify(&port) else {
            tracing::warn!(name = port.name(), "Port has no tab; disconnecting");
            port.disconnect();
            return None;
        };

        if role == Role::Inspector {
            self.scripting.inject_agent(tab);
        }

        tracing::debug!(%tab, role = role.as_str(), "Port connected");
        let relay_id = self.registry.register(tab, role, port);
        Some(Connection {
            tab,
            role,
            relay_id,
        })
    }

    pub fn on_runtime_message(&self, message: &RuntimeMessage, sender_tab: Option<TabId>) {
        let Some(tab) = sender_tab else {
            return;
        };
        if message.has_detected_runtime {
            self.set_icon_and_popup(IconState::Enabled, tab);
        }
    }

    pub fn on_tab_updated(&self, tab: TabId, update: &TabUpdate) {
        if self.suppress_loading_flicker && update.active && update.is_loading() {
            self.set_icon_and_popup(IconState::Disabled, tab);
        }
    }

    pub fn set_icon_and_popup(&self, state: IconState, tab: TabId) {
        let appearance = ActionAppearance::for_state(state);
        self.action.set_icon(tab, &appearance.icons);
        self.action.set_popup(tab, &appearance.popup);
    }
}

impl Drop for Background {
    fn drop(&mut self) {
        self.registry.shutdown();
    }
}
