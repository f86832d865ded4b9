//! Decoding of agent traffic ("wall" messages) into store inputs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::events::{EnvironmentId, EnvironmentInfo, StoreData};
use crate::bridge::PortMessage;

pub const ENVIRONMENT_INITIALIZED: &str = "environmentInitialized";
pub const EVENTS: &str = "events";
pub const STORE_RECORDS: &str = "storeRecords";
pub const REFRESH_STORE: &str = "refreshStore";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message is neither a wall event nor a batch of them: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One named message on the agent/inspector wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Batch(Vec<WallEvent>),
    Single(WallEvent),
}

/// One runtime log event as wrapped by the agent. `data` stays raw so the
/// received tag survives even when it is not one we know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub id: EnvironmentId,
    pub data: Value,
    #[serde(default)]
    pub event_type: Option<String>,
}

/// A wall event the inspector store understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    EnvironmentInitialized(EnvironmentInfo),
    Events(Vec<EventData>),
    StoreRecords(StoreData),
}

/// Split a port message into wall events. A batch keeps its order.
pub fn decode_message(message: &PortMessage) -> Result<Vec<WallEvent>, DecodeError> {
    match Envelope::deserialize(message).map_err(DecodeError::Envelope)? {
        Envelope::Batch(events) => Ok(events),
        Envelope::Single(event) => Ok(vec![event]),
    }
}

impl WallEvent {
    /// Interpret the payload. `Ok(None)` for events the store has no use for.
    pub fn into_inbound(self) -> Result<Option<Inbound>, DecodeError> {
        let WallEvent { event, payload } = self;
        let inbound = match event.as_str() {
            ENVIRONMENT_INITIALIZED => {
                Inbound::EnvironmentInitialized(parse_payload(&event, payload)?)
            }
            EVENTS => Inbound::Events(parse_payload(&event, payload)?),
            STORE_RECORDS => Inbound::StoreRecords(parse_payload(&event, payload)?),
            _ => return Ok(None),
        };
        Ok(Some(inbound))
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    event: &str,
    payload: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|source| DecodeError::Payload {
        event: event.to_string(),
        source,
    })
}

/// Ask the agent to resend the full record set of an environment.
pub fn refresh_store_message(environment_id: EnvironmentId) -> PortMessage {
    json!({ "event": REFRESH_STORE, "payload": environment_id })
}
