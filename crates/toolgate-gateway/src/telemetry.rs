// crates/toolgate-gateway/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Observability hooks for gateway routing and dispatch.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for gateway request counters
//! and latency histograms. It is intentionally dependency-light so downstream
//! deployments can plug in Prometheus or OpenTelemetry without redesign.
//! Security posture: telemetry must avoid leaking request payloads or
//! upstream credentials; labels come from closed enums only.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for gateway request histograms.
pub const GATEWAY_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Gateway request routing classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMethod {
    /// Request handled by an in-process session handler.
    LocalDispatch,
    /// Request forwarded to a remote server.
    RemoteProxy,
    /// Registry status read.
    Status,
    /// Invalid or malformed request.
    Invalid,
}

impl GatewayMethod {
    /// Returns a stable label for the routing class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalDispatch => "local_dispatch",
            Self::RemoteProxy => "remote_proxy",
            Self::Status => "status",
            Self::Invalid => "invalid",
        }
    }
}

/// Gateway request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

impl GatewayOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Gateway request metric event payload.
///
/// # Invariants
/// - `elapsed_ms` measures wall time from request receipt to response build.
#[derive(Debug, Clone)]
pub struct MetricEvent {
    /// Request routing classification.
    pub method: GatewayMethod,
    /// Request outcome.
    pub outcome: GatewayOutcome,
    /// Elapsed wall time in milliseconds.
    pub elapsed_ms: u128,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gateway requests and latencies.
pub trait GatewayMetrics: Send + Sync {
    /// Records one request observation.
    fn record(&self, event: &MetricEvent);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record(&self, _event: &MetricEvent) {}
}
