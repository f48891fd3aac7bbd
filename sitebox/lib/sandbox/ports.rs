use tokio::sync::broadcast;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// How many port events a slow subscriber may fall behind before it starts missing events.
const PORT_EVENT_CAPACITY: usize = 64;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Whether a port was opened or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortEventKind {
    /// The sandbox started listening on the port.
    Open,

    /// The sandbox stopped listening on the port.
    Close,
}

/// A port change reported by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortEvent {
    /// The port number inside the sandbox.
    pub port: u16,

    /// Open or close.
    pub kind: PortEventKind,

    /// The externally reachable address of the port.
    pub url: String,
}

/// Fan-out channel that a sandbox uses to publish [`PortEvent`]s.
#[derive(Debug, Clone)]
pub struct PortEvents {
    sender: broadcast::Sender<PortEvent>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PortEvent {
    /// An open event for `port` reachable at `url`.
    pub fn open(port: u16, url: impl Into<String>) -> Self {
        Self {
            port,
            kind: PortEventKind::Open,
            url: url.into(),
        }
    }

    /// A close event for `port`.
    pub fn close(port: u16, url: impl Into<String>) -> Self {
        Self {
            port,
            kind: PortEventKind::Close,
            url: url.into(),
        }
    }
}

impl PortEvents {
    /// Creates a channel with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(PORT_EVENT_CAPACITY);
        Self { sender }
    }

    /// Publishes an event to every current subscriber.
    ///
    /// Returns how many subscribers received it. Events published with no subscribers are dropped.
    pub fn announce(&self, event: PortEvent) -> usize {
        tracing::debug!(port = event.port, kind = ?event.kind, url = %event.url, "port event");
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns a new receiver that sees every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PortEvent> {
        self.sender.subscribe()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for PortEvents {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
