//! Integration tests for the inspector side
//!
//! Tests the flow: agent wall messages -> relay -> panel pump ->
//! InspectorStore projections, plus the snapshot/refresh round trip.

use std::sync::Arc;

use parking_lot::Mutex;
use relay_bridge::bridge::TabId;
use relay_bridge::config::Config;
use relay_bridge::store::{
    panel, wire::refresh_store_message, EventDetails, InspectorStore, RequestStatus, StoreChange,
};
use serde_json::json;

use super::common::{
    background, connect_agent, connect_inspector, environment_initialized, events, eventually, user,
    wall, within,
};

/// Wait until the store reports `expected`, skipping other changes.
async fn wait_for(
    changes: &mut tokio::sync::broadcast::Receiver<StoreChange>,
    expected: StoreChange,
) {
    within(async {
        loop {
            if changes.recv().await.unwrap() == expected {
                return;
            }
        }
    })
    .await
}

#[tokio::test]
async fn test_agent_events_reach_the_inspector_store() {
    let (background, _) = background();
    let inspector = connect_inspector(&background, 11);
    let agent = connect_agent(&background, 11);

    let store = Arc::new(Mutex::new(InspectorStore::new(true)));
    let mut changes = store.lock().subscribe();
    let (_panel, _pump) = panel::spawn(inspector, store.clone());

    agent
        .send(json!([
            environment_initialized(1, "main"),
            events(
                1,
                vec![
                    json!({"name": "store.publish", "source": {"u1": user("u1", "Ada")}, "optimistic": false}),
                    json!({"name": "store.publish", "source": {"tmp": user("tmp", "Draft")}, "optimistic": true}),
                    json!({"name": "execute.start", "transactionID": 1, "params": {"name": "ViewerQuery"}}),
                    json!({"name": "execute.next", "transactionID": 1, "response": "R"}),
                    json!({"name": "execute.complete", "transactionID": 1}),
                ],
            ),
        ]))
        .await
        .unwrap();

    wait_for(&mut changes, StoreChange::EventsReceived(1)).await;

    let store = store.lock();
    assert_eq!(
        store
            .environments()
            .map(|env| env.environment_name.clone())
            .collect::<Vec<_>>(),
        vec!["main".to_string()]
    );

    let records = store.get_records(1).unwrap();
    assert_eq!(records.by_type().bucket("User").unwrap(), ["u1"]);
    assert!(store.get_optimistic_updates(1).unwrap().contains("tmp"));

    let requests = store.requests(1);
    assert_eq!(requests[&1u64].status, RequestStatus::Completed);
    assert_eq!(requests[&1u64].responses, vec![json!("R")]);

    assert_eq!(store.get_events(1).len(), 5);
    assert!(matches!(
        store.event_details(1, 1),
        EventDetails::Records { .. }
    ));
    assert_eq!(store.event_details(1, 5), EventDetails::Missing);
}

#[tokio::test]
async fn test_snapshot_requests_refresh_and_baseline_replaces_records() {
    let (background, _) = background();
    let inspector = connect_inspector(&background, 5);
    let mut agent = connect_agent(&background, 5);

    let store = Arc::new(Mutex::new(InspectorStore::new(false)));
    let mut changes = store.lock().subscribe();
    let (panel, _pump) = panel::spawn(inspector, store.clone());

    agent
        .send(events(
            2,
            vec![json!({"name": "store.publish", "source": {"u1": user("u1", "Ada")}})],
        ))
        .await
        .unwrap();
    wait_for(&mut changes, StoreChange::EventsReceived(2)).await;

    assert_eq!(panel.take_snapshot(2).await.unwrap(), Some(0));
    assert_eq!(within(agent.recv()).await, Some(refresh_store_message(2)));

    agent
        .send(wall(
            "storeRecords",
            json!({"name": "main", "id": 2, "records": {"u2": user("u2", "Grace")}}),
        ))
        .await
        .unwrap();
    wait_for(&mut changes, StoreChange::StoreDataReceived(2)).await;

    let store = store.lock();
    let live = store.get_records(2).unwrap();
    assert!(live.contains("u2"));
    assert!(!live.contains("u1"));

    let snapshot = store.snapshot(2, 0).unwrap();
    assert!(snapshot.index.contains("u1"));
    assert!(!snapshot.index.contains("u2"));
    assert!(store.get_events(2).is_empty());
    assert_eq!(store.log(2).len(), 1);
}

#[tokio::test]
async fn test_panel_stops_when_agent_side_goes_away() {
    let (background, _) = background();
    let inspector = connect_inspector(&background, 8);
    let agent = connect_agent(&background, 8);

    let store = Arc::new(Mutex::new(InspectorStore::default()));
    let mut changes = store.lock().subscribe();
    let (_panel, pump) = panel::spawn(inspector, store);

    agent.send(environment_initialized(4, "worker")).await.unwrap();
    wait_for(&mut changes, StoreChange::EnvironmentAdded(4)).await;
    drop(agent);

    assert_eq!(within(pump).await.unwrap(), 1);
    assert!(eventually(|| background.registry().relay_count() == 0).await);
}

/// A panel opened from config records from the start when asked to.
#[tokio::test]
async fn test_panel_opened_from_config_records_on_start() {
    let (background, chrome) = background();
    let mut config = Config::default();
    config.inspector.record_on_start = true;

    let (panel, _pump) = panel::open(&background, TabId(12), &config);
    assert_eq!(chrome.injected(), vec![TabId(12)]);
    let mut changes = panel.store().lock().subscribe();
    let agent = connect_agent(&background, 12);
    assert!(eventually(|| background.registry().has_relay(TabId(12))).await);

    agent
        .send(events(
            3,
            vec![json!({"name": "store.publish", "source": {"u1": user("u1", "Ada")}})],
        ))
        .await
        .unwrap();
    wait_for(&mut changes, StoreChange::EventsReceived(3)).await;

    let store = panel.store().lock();
    assert!(store.is_recording());
    assert_eq!(store.get_events(3).len(), 1);
}
