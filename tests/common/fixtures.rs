use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use relay_bridge::bridge::{channel, Background, PortRegistry, RecordingChrome, RemotePort, TabId};
use serde_json::{json, Value};

pub const CAPACITY: usize = 32;

/// A background with recording chrome, plus the chrome for assertions.
pub fn background() -> (Background, Arc<RecordingChrome>) {
    let chrome = Arc::new(RecordingChrome::new());
    let background = Background::new(PortRegistry::new(), chrome.clone(), chrome.clone());
    (background, chrome)
}

/// Open the inspector's channel for `tab`, the way the devtools page names it.
pub fn connect_inspector(background: &Background, tab: u32) -> RemotePort {
    let (port, remote) = channel(tab.to_string(), None, CAPACITY);
    background.on_connect(port);
    remote
}

/// Open the content script's channel from inside `tab`.
pub fn connect_agent(background: &Background, tab: u32) -> RemotePort {
    let (port, remote) = channel("content-script", Some(TabId(tab)), CAPACITY);
    background.on_connect(port);
    remote
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Await `future` with a two second limit.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}

pub fn wall(event: &str, payload: Value) -> Value {
    json!({ "event": event, "payload": payload })
}

pub fn environment_initialized(id: u64, name: &str) -> Value {
    wall(
        "environmentInitialized",
        json!({ "id": id, "environmentName": name }),
    )
}

/// An `events` wall message carrying `data` for environment `id`.
pub fn events(id: u64, data: Vec<Value>) -> Value {
    let wrapped: Vec<Value> = data
        .into_iter()
        .map(|data| json!({ "id": id, "data": data, "eventType": "relay" }))
        .collect();
    wall("events", Value::Array(wrapped))
}

pub fn user(id: &str, name: &str) -> Value {
    json!({ "__id": id, "__typename": "User", "name": name })
}
