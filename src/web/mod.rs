//! HTTP and WebSocket host for the background relay.

pub mod error;
pub mod server;
pub mod socket;

pub use error::WebError;
pub use server::{build_router, run_server, AppState};
pub use socket::serve_port;
