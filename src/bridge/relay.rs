//! The double pipe: verbatim forwarding between the two ports of a tab.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::port::{Port, PortMessage, PortReader, PortWriter, TabId};

/// Message counts for one relay, reported when it closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub inspector_to_agent: u64,
    pub agent_to_inspector: u64,
}

/// Why a relay stopped forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The registry shut the link down (reconnect or explicit teardown).
    Shutdown,
    /// One of the two ports disconnected.
    Disconnected,
}

/// Start forwarding between `inspector` and `agent`.
///
/// Each direction has its own pipe, so a side that stops reading only holds
/// up the messages addressed to it; each pipe delivers in send order. When
/// either side disconnects, or `shutdown` fires, both pipes stop first and
/// then both ports are disconnected.
pub fn spawn(
    tab: TabId,
    inspector: Port,
    agent: Port,
    shutdown: CancellationToken,
) -> JoinHandle<RelayStats> {
    let (inspector_rx, inspector_tx) = inspector.split();
    let (agent_rx, agent_tx) = agent.split();

    tokio::spawn(async move {
        let stop = shutdown.child_token();
        let (inspector_to_agent, agent_to_inspector) = tokio::join!(
            pipe(inspector_rx, &agent_tx, &stop),
            pipe(agent_rx, &inspector_tx, &stop),
        );

        // Listeners are gone at this point; only now drop the channels.
        inspector_tx.disconnect();
        agent_tx.disconnect();

        let exit = if shutdown.is_cancelled() {
            RelayExit::Shutdown
        } else {
            RelayExit::Disconnected
        };
        let stats = RelayStats {
            inspector_to_agent,
            agent_to_inspector,
        };
        tracing::info!(
            %tab,
            ?exit,
            inspector_to_agent = stats.inspector_to_agent,
            agent_to_inspector = stats.agent_to_inspector,
            "Relay closed"
        );
        stats
    })
}

/// Forward everything `from` receives to `to` until either closes or `stop`
/// fires. Stopping one pipe stops its twin. Returns the forwarded count.
async fn pipe(mut from: PortReader, to: &PortWriter, stop: &CancellationToken) -> u64 {
    let mut forwarded = 0;
    loop {
        let message = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            message = from.recv() => message,
        };
        let Some(message) = message else {
            break;
        };
        if !forward(to, message, stop).await {
            break;
        }
        forwarded += 1;
    }
    stop.cancel();
    forwarded
}

async fn forward(to: &PortWriter, message: PortMessage, stop: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = stop.cancelled() => false,
        sent = to.post_message(message) => match sent {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(port = to.name(), error = %err, "Dropping message for closed port");
                false
            }
        },
    }
}
