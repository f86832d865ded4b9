//! Shared test utilities for relay-bridge
//!
//! - A background wired to recording browser stand-ins
//! - Polling for state that settles on another task
//! - Builders for agent wall messages

pub mod fixtures;

pub use fixtures::*;
