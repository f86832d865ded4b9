//! Named bidirectional channels between the background relay and a transport.
//!
//! A [`Port`] is the background's end of one half-connection (the page's
//! content script or an inspector panel). The matching [`RemotePort`] is held
//! by whatever hosts the connection: the WebSocket handler, or a test.
//! Either end may disconnect; both ends observe it through a shared
//! cancellation token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Messages are forwarded verbatim, so the relay only ever sees JSON values.
pub type PortMessage = serde_json::Value;

/// Identity of a browser tab; the multiplexing key of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl TabId {
    /// Parse a port name the way the inspector names its channels: the
    /// decimal tab id with no sign, padding or fraction.
    pub fn from_port_name(name: &str) -> Option<Self> {
        let id: u32 = name.parse().ok()?;
        (id.to_string() == name).then_some(TabId(id))
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TabId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(TabId)
    }
}

/// Which end of a tab session a port belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The inspector panel's channel, named after its tab id.
    Inspector,
    /// The in-page agent's content-script channel.
    Agent,
}

impl Role {
    pub fn peer(self) -> Role {
        match self {
            Role::Inspector => Role::Agent,
            Role::Agent => Role::Inspector,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Inspector => "devtools",
            Role::Agent => "content-script",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Port disconnected")]
    Disconnected,
}

/// Create a connected port pair.
///
/// `capacity` bounds the number of in-flight messages per direction.
pub fn channel(
    name: impl Into<String>,
    sender_tab: Option<TabId>,
    capacity: usize,
) -> (Port, RemotePort) {
    let capacity = capacity.max(1);
    let (to_remote_tx, to_remote_rx) = mpsc::channel(capacity);
    let (to_port_tx, to_port_rx) = mpsc::channel(capacity);
    let token = CancellationToken::new();

    let port = Port {
        name: name.into(),
        sender_tab,
        outbound: to_remote_tx,
        inbound: to_port_rx,
        token: token.clone(),
        guard: token.clone().drop_guard(),
    };
    let remote = RemotePort {
        outbound: to_port_tx,
        inbound: to_remote_rx,
        token,
    };
    (port, remote)
}

/// The background's end of a channel. Dropping it disconnects both ends.
pub struct Port {
    name: String,
    sender_tab: Option<TabId>,
    outbound: mpsc::Sender<PortMessage>,
    inbound: mpsc::Receiver<PortMessage>,
    token: CancellationToken,
    guard: DropGuard,
}

impl Port {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tab of the page that opened this port, when the transport knows it.
    pub fn sender_tab(&self) -> Option<TabId> {
        self.sender_tab
    }

    pub fn is_connected(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Token that fires when either end disconnects.
    pub fn disconnect_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Deliver a message to the remote end.
    pub async fn post_message(&self, message: PortMessage) -> Result<(), PortError> {
        send_until_disconnected(&self.outbound, &self.token, message).await
    }

    /// Next message from the remote end, or `None` once disconnected.
    pub async fn recv(&mut self) -> Option<PortMessage> {
        tokio::select! {
            biased;
            message = self.inbound.recv() => message,
            _ = self.token.cancelled() => None,
        }
    }

    /// Disconnect both ends. Safe to call any number of times.
    pub fn disconnect(&self) {
        self.token.cancel();
    }

    /// Split into a receiving and a sending half that can be driven from
    /// separate tasks. Dropping the receiving half disconnects the channel.
    pub fn split(self) -> (PortReader, PortWriter) {
        let Port {
            name,
            outbound,
            inbound,
            token,
            guard,
            ..
        } = self;
        let reader = PortReader {
            inbound,
            token: token.clone(),
            _guard: guard,
        };
        let writer = PortWriter {
            name,
            outbound,
            token,
        };
        (reader, writer)
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("sender_tab", &self.sender_tab)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Receiving half of a split [`Port`].
pub struct PortReader {
    inbound: mpsc::Receiver<PortMessage>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl PortReader {
    /// Next message from the remote end, or `None` once disconnected.
    pub async fn recv(&mut self) -> Option<PortMessage> {
        tokio::select! {
            biased;
            message = self.inbound.recv() => message,
            _ = self.token.cancelled() => None,
        }
    }

    pub fn disconnect(&self) {
        self.token.cancel();
    }
}

/// Sending half of a split [`Port`].
pub struct PortWriter {
    name: String,
    outbound: mpsc::Sender<PortMessage>,
    token: CancellationToken,
}

impl PortWriter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn post_message(&self, message: PortMessage) -> Result<(), PortError> {
        send_until_disconnected(&self.outbound, &self.token, message).await
    }

    pub fn disconnect(&self) {
        self.token.cancel();
    }
}

/// The transport's end of a channel.
pub struct RemotePort {
    outbound: mpsc::Sender<PortMessage>,
    inbound: mpsc::Receiver<PortMessage>,
    token: CancellationToken,
}

impl RemotePort {
    /// Send a message toward the background.
    pub async fn send(&self, message: PortMessage) -> Result<(), PortError> {
        send_until_disconnected(&self.outbound, &self.token, message).await
    }

    /// A cloneable sending half, for callers that send from another task.
    pub fn sender(&self) -> RemoteSender {
        RemoteSender {
            outbound: self.outbound.clone(),
            token: self.token.clone(),
        }
    }

    /// Next message from the background. Messages already delivered are
    /// drained before the disconnect is reported.
    pub async fn recv(&mut self) -> Option<PortMessage> {
        tokio::select! {
            biased;
            message = self.inbound.recv() => message,
            _ = self.token.cancelled() => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves once either end has disconnected.
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }

    pub fn disconnect(&self) {
        self.token.cancel();
    }
}

impl Drop for RemotePort {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Cloneable sending half of a [`RemotePort`].
#[derive(Clone)]
pub struct RemoteSender {
    outbound: mpsc::Sender<PortMessage>,
    token: CancellationToken,
}

impl RemoteSender {
    pub async fn send(&self, message: PortMessage) -> Result<(), PortError> {
        send_until_disconnected(&self.outbound, &self.token, message).await
    }

    /// Resolves once either end has disconnected.
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }

    pub fn disconnect(&self) {
        self.token.cancel();
    }
}

async fn send_until_disconnected(
    outbound: &mpsc::Sender<PortMessage>,
    token: &CancellationToken,
    message: PortMessage,
) -> Result<(), PortError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PortError::Disconnected),
        sent = outbound.send(message) => sent.map_err(|_| PortError::Disconnected),
    }
}
