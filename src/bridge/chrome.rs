//! Browser capabilities the background drives but does not implement.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::port::TabId;

/// Icon sizes shipped for each build state.
pub const ICON_SIZES: [u32; 4] = [16, 32, 48, 128];

/// Whether the inspected page runs the target runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconState {
    Enabled,
    Disabled,
}

impl IconState {
    pub fn as_str(self) -> &'static str {
        match self {
            IconState::Enabled => "enabled",
            IconState::Disabled => "disabled",
        }
    }
}

impl fmt::Display for IconState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toolbar icon paths and popup page for one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionAppearance {
    pub icons: Vec<(u32, String)>,
    pub popup: String,
}

impl ActionAppearance {
    pub fn for_state(state: IconState) -> Self {
        Self {
            icons: ICON_SIZES
                .iter()
                .map(|size| (*size, format!("icons/{size}-{state}.png")))
                .collect(),
            popup: format!("popups/{state}.html"),
        }
    }
}

/// Injects the in-page agent into a tab. Fire and forget: the background
/// never observes whether injection succeeded.
pub trait TabScripting: Send + Sync {
    fn inject_agent(&self, tab: TabId);
}

/// The browser action (toolbar button) of the extension.
pub trait ActionSurface: Send + Sync {
    fn set_icon(&self, tab: TabId, icons: &[(u32, String)]);
    fn set_popup(&self, tab: TabId, popup: &str);
}

/// Host-side stand-in that only logs what the browser would have done.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingChrome;

impl TabScripting for TracingChrome {
    fn inject_agent(&self, tab: TabId) {
        tracing::info!(%tab, "Agent injection requested");
    }
}

impl ActionSurface for TracingChrome {
    fn set_icon(&self, tab: TabId, icons: &[(u32, String)]) {
        tracing::debug!(%tab, icons = icons.len(), "Set action icon");
    }

    fn set_popup(&self, tab: TabId, popup: &str) {
        tracing::info!(%tab, popup, "Set action popup");
    }
}

/// Records every call; used by tests and by embedders that poll state.
#[derive(Debug, Default)]
pub struct RecordingChrome {
    injected: Mutex<Vec<TabId>>,
    popups: Mutex<Vec<(TabId, String)>>,
    icons: Mutex<Vec<(TabId, Vec<(u32, String)>)>>,
}

impl RecordingChrome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn injected(&self) -> Vec<TabId> {
        self.injected.lock().clone()
    }

    pub fn popups(&self) -> Vec<(TabId, String)> {
        self.popups.lock().clone()
    }

    pub fn icons(&self) -> Vec<(TabId, Vec<(u32, String)>)> {
        self.icons.lock().clone()
    }
}

impl TabScripting for RecordingChrome {
    fn inject_agent(&self, tab: TabId) {
        self.injected.lock().push(tab);
    }
}

impl ActionSurface for RecordingChrome {
    fn set_icon(&self, tab: TabId, icons: &[(u32, String)]) {
        self.icons.lock().push((tab, icons.to_vec()));
    }

    fn set_popup(&self, tab: TabId, popup: &str) {
        self.popups.lock().push((tab, popup.to_string()));
    }
}
