// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for Toolgate system-tests.
// Purpose: Provide gateway harnesses, HTTP clients, and upstream stubs.
// Dependencies: system-tests, toolgate-core, toolgate-config, toolgate-gateway
// ============================================================================

//! ## Overview
//! Shared helpers for Toolgate system-tests.
//! Purpose: Provide gateway harnesses, HTTP clients, and upstream stubs.
//! Invariants:
//! - Every harness binds loopback-only listeners on ephemeral ports.
//! - Suites tear gateways down explicitly; nothing outlives its test.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod client;
pub mod harness;
pub mod readiness;
pub mod timeouts;
pub mod upstream;
