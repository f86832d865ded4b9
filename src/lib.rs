pub mod bridge;
pub mod config;
pub mod store;
pub mod util;
pub mod web;

pub use bridge::{Background, Port, PortRegistry, RemotePort, Role, TabId};
pub use config::Config;
pub use store::{InspectorStore, LogEvent, Panel, RecordIndex};
pub use web::{build_router, run_server, AppState};
