// system-tests/tests/helpers/timeouts.rs
// ============================================================================
// Module: System Test Timeouts
// Description: Centralized timeout configuration with env overrides.
// Purpose: Keep system-test timeouts consistent and configurable across suites.
// Dependencies: std
// ============================================================================

use std::cmp;
use std::env;
use std::time::Duration;

/// Environment variable that stretches every suite timeout, in whole seconds.
const ENV_TIMEOUT_SECS: &str = "TOOLGATE_SYSTEM_TEST_TIMEOUT_SEC";

/// Default deadline for gateway readiness polling.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the effective timeout, honoring `TOOLGATE_SYSTEM_TEST_TIMEOUT_SEC` when set.
/// The override acts as a minimum to avoid shortening explicitly longer test timeouts.
#[must_use]
pub fn resolve_timeout(requested: Duration) -> Duration {
    match env::var(ENV_TIMEOUT_SECS).ok().and_then(|raw| parse_timeout_secs(&raw)) {
        Some(override_timeout) => cmp::max(requested, override_timeout),
        None => requested,
    }
}

/// Parses a positive whole-second override; unusable values disable the override.
fn parse_timeout_secs(raw: &str) -> Option<Duration> {
    let secs: u64 = raw.trim().parse().ok()?;
    if secs == 0 {
        return None;
    }
    Some(Duration::from_secs(secs))
}
