//! Integration tests for relay-bridge
//!
//! These tests verify that multiple components work together correctly.

#[path = "../common/mod.rs"]
pub mod common;

pub mod inspector_flow;
pub mod relay_flow;
pub mod socket_flow;
