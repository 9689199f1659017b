// system-tests/tests/helpers/readiness.rs
// ============================================================================
// Module: Gateway Readiness
// Description: Polls a spawned gateway until its status endpoint answers.
// Purpose: Keep suites from racing the accept loop on startup.
// Dependencies: tokio
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use tokio::time::sleep;

use super::client::GatewayClient;
use super::timeouts;

/// Interval between readiness probes.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Polls the status endpoint until it answers with HTTP 200 or `timeout` passes.
///
/// # Errors
///
/// Returns an error naming the attempt count and the last failure when the
/// gateway never becomes ready within the resolved timeout.
pub async fn wait_for_gateway_ready(
    client: &GatewayClient,
    timeout: Duration,
) -> Result<(), String> {
    let deadline = Instant::now() + timeouts::resolve_timeout(timeout);
    let mut attempts: u32 = 0;
    let mut last_error = String::from("no status attempt completed");
    loop {
        attempts += 1;
        match client.status().await {
            Ok((200, _)) => return Ok(()),
            Ok((status, _)) => last_error = format!("status endpoint returned http {status}"),
            Err(err) => last_error = err,
        }
        if Instant::now() >= deadline {
            return Err(format!(
                "gateway readiness timeout after {attempts} attempts: {last_error}"
            ));
        }
        sleep(POLL_INTERVAL).await;
    }
}
