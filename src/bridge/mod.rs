//! Background relay between in-page agents and inspector panels, keyed by tab.

pub mod background;
pub mod chrome;
pub mod port;
pub mod registry;
pub mod relay;

pub use background::{classify, Background, Connection, RuntimeMessage, TabUpdate};
pub use chrome::{
    ActionAppearance, ActionSurface, IconState, RecordingChrome, TabScripting, TracingChrome,
};
pub use port::{
    channel, Port, PortError, PortMessage, PortReader, PortWriter, RemotePort, RemoteSender, Role,
    TabId,
};
pub use registry::PortRegistry;
pub use relay::{RelayExit, RelayStats};
