// system-tests/src/lib.rs
// ============================================================================
// Module: Toolgate System Tests Library
// Description: Shared request-building utilities for system test scenarios.
// Purpose: Provide common JSON-RPC payload builders for Toolgate system-tests.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! This crate hosts shared utilities used by the Toolgate system-test
//! binaries in `system-tests/tests`. The suites drive a real gateway over
//! loopback HTTP, so everything here is about producing well-formed wire
//! payloads rather than touching gateway internals.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod rpc;
