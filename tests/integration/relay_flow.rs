//! Integration tests for the background relay
//!
//! Tests the flow: transport channels -> Background::on_connect -> registry
//! pairing -> relay forwarding -> teardown.

use relay_bridge::bridge::{channel, Role, TabId};
use serde_json::json;

use super::common::{background, connect_agent, connect_inspector, eventually, within, CAPACITY};

/// Numeric inspector channel and content-script channel for the same tab
/// pair into exactly one relay; dropping the inspector clears both slots.
#[tokio::test]
async fn test_pairing_and_teardown_for_tab_42() {
    let (background, chrome) = background();
    let registry = background.registry().clone();

    let inspector = connect_inspector(&background, 42);
    assert!(!registry.has_relay(TabId(42)));
    assert_eq!(chrome.injected(), vec![TabId(42)]);

    let agent = connect_agent(&background, 42);
    assert!(registry.has_relay(TabId(42)));
    assert_eq!(registry.relay_count(), 1);

    inspector.disconnect();
    assert!(
        eventually(|| !registry.is_registered(TabId(42), Role::Inspector)
            && !registry.is_registered(TabId(42), Role::Agent))
        .await
    );
    assert!(!registry.has_relay(TabId(42)));
    within(agent.closed()).await;
    assert!(registry.tabs().is_empty());
}

/// Messages cross the relay unmodified and in send order, both ways.
#[tokio::test]
async fn test_forwarding_preserves_order_and_content() {
    let (background, _) = background();
    let mut inspector = connect_inspector(&background, 7);
    let mut agent = connect_agent(&background, 7);

    for i in 0..20 {
        agent
            .send(json!({"event": "events", "payload": [{"seq": i}]}))
            .await
            .unwrap();
    }
    inspector.send(json!({"event": "refreshStore", "payload": 1})).await.unwrap();

    for i in 0..20 {
        let message = within(inspector.recv()).await.unwrap();
        assert_eq!(message, json!({"event": "events", "payload": [{"seq": i}]}));
    }
    assert_eq!(
        within(agent.recv()).await,
        Some(json!({"event": "refreshStore", "payload": 1}))
    );
}

/// A reconnecting inspector replaces the stale pairing: the old channels
/// close and a fresh agent pairs with the new inspector only once.
#[tokio::test]
async fn test_reconnect_replaces_stale_pairing() {
    let (background, _) = background();
    let registry = background.registry().clone();

    let old_inspector = connect_inspector(&background, 3);
    let old_agent = connect_agent(&background, 3);
    assert!(registry.has_relay(TabId(3)));

    let mut inspector = connect_inspector(&background, 3);
    within(old_inspector.closed()).await;
    within(old_agent.closed()).await;
    assert!(!registry.has_relay(TabId(3)));
    assert!(registry.is_registered(TabId(3), Role::Inspector));

    let agent = connect_agent(&background, 3);
    assert!(eventually(|| registry.relay_count() == 1).await);

    agent.send(json!("once")).await.unwrap();
    assert_eq!(within(inspector.recv()).await, Some(json!("once")));
    assert!(
        tokio::time::timeout(std::time::Duration::from_millis(50), inspector.recv())
            .await
            .is_err()
    );
}

/// A reconnecting agent closes the old inspector; the inspector then
/// re-pairs with the new agent into a single relay.
#[tokio::test]
async fn test_agent_reconnect_replaces_stale_pairing() {
    let (background, _) = background();
    let registry = background.registry().clone();

    let old_inspector = connect_inspector(&background, 5);
    let old_agent = connect_agent(&background, 5);
    assert!(registry.has_relay(TabId(5)));

    let agent = connect_agent(&background, 5);
    within(old_agent.closed()).await;
    within(old_inspector.closed()).await;
    assert!(!registry.has_relay(TabId(5)));
    assert!(registry.is_registered(TabId(5), Role::Agent));
    assert!(!registry.is_registered(TabId(5), Role::Inspector));

    let mut inspector = connect_inspector(&background, 5);
    assert!(eventually(|| registry.relay_count() == 1).await);

    agent.send(json!("once")).await.unwrap();
    assert_eq!(within(inspector.recv()).await, Some(json!("once")));
    assert!(
        tokio::time::timeout(std::time::Duration::from_millis(50), inspector.recv())
            .await
            .is_err()
    );
    assert_eq!(registry.relay_count(), 1);
}

/// Tabs are independent: tearing one down leaves the other forwarding.
#[tokio::test]
async fn test_tabs_are_isolated() {
    let (background, _) = background();
    let registry = background.registry().clone();

    let inspector_a = connect_inspector(&background, 1);
    let _agent_a = connect_agent(&background, 1);
    let mut inspector_b = connect_inspector(&background, 2);
    let agent_b = connect_agent(&background, 2);
    assert_eq!(registry.relay_count(), 2);

    drop(inspector_a);
    assert!(eventually(|| registry.relay_count() == 1).await);
    assert!(registry.has_relay(TabId(2)));

    agent_b.send(json!({"tab": 2})).await.unwrap();
    assert_eq!(within(inspector_b.recv()).await, Some(json!({"tab": 2})));
}

/// A content channel with no sender tab cannot be keyed and is refused.
#[tokio::test]
async fn test_agent_without_tab_is_disconnected() {
    let (background, _) = background();
    let (port, remote) = channel("content-script", None, CAPACITY);

    assert!(background.on_connect(port).is_none());
    assert!(!remote.is_connected());
    assert!(background.registry().tabs().is_empty());
}
