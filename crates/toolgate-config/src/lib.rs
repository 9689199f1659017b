// crates/toolgate-config/src/lib.rs
// ============================================================================
// Module: Toolgate Config Library
// Description: Canonical config model and validation for the gateway.
// Purpose: Single source of truth for toolgate.toml semantics.
// Dependencies: serde, thiserror, toml, url
// ============================================================================

//! ## Overview
//! `toolgate-config` defines the canonical configuration model for the
//! Toolgate gateway. Loading is strict and fail-closed: hard path and size
//! limits, UTF-8 enforcement, and full validation before a config is handed
//! to the runtime. Remote server entries are validated here so the registry
//! never sees an unparseable URL or an empty credential.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
