//! Bridges one WebSocket to the transport end of a port.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};

use crate::bridge::{PortMessage, RemotePort};

/// Pump JSON text frames between `socket` and `remote` until either closes.
/// Returns the number of frames forwarded toward the background.
///
/// Outgoing messages are written by their own task, so a background that is
/// slow to accept frames never stops messages flowing back to the socket.
pub async fn serve_port(socket: WebSocket, mut remote: RemotePort) -> u64 {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let sender = remote.sender();

    // Spawn task to forward port messages to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(message) = remote.recv().await {
            if ws_sender
                .send(Message::Text(message.to_string().into()))
                .await
                .is_err()
            {
                return;
            }
        }
        if let Err(e) = ws_sender.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "Failed to send close frame");
        }
    });

    let mut inbound = 0u64;
    loop {
        let incoming = tokio::select! {
            _ = sender.closed() => break,
            incoming = ws_receiver.next() => incoming,
        };
        let text = match incoming {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            // Pings are answered by axum
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket error");
                break;
            }
        };

        let message: PortMessage = match serde_json::from_str(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping non-JSON frame");
                continue;
            }
        };
        if sender.send(message).await.is_err() {
            break;
        }
        inbound += 1;
    }

    sender.disconnect();
    if let Err(e) = send_task.await {
        tracing::debug!(error = %e, "WebSocket send task failed");
    }
    tracing::debug!(inbound, "WebSocket port closed");
    inbound
}
