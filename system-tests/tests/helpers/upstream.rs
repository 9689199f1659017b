// system-tests/tests/helpers/upstream.rs
// ============================================================================
// Module: Upstream Stubs
// Description: Minimal HTTP upstreams for exercising the remote proxy path.
// Purpose: Give the remote suites controllable servers behind real sockets.
// Dependencies: tiny_http
// ============================================================================

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Name of the marker header every stub attaches to its responses.
pub const UPSTREAM_MARKER_HEADER: &str = "x-upstream";

/// Starts a stub upstream answering every request with `status` and `body`.
///
/// The server runs on a detached thread for the life of the test process and
/// tags each response with an `x-upstream: ready` marker so suites can prove
/// the relay path was taken.
///
/// # Errors
///
/// Fails when no loopback socket can be bound.
pub fn spawn_upstream(status: u16, body: &'static str) -> Result<String, String> {
    spawn_with_delay(status, body, None)
}

/// Starts a stub upstream that sleeps for `delay` before answering.
///
/// # Errors
///
/// Fails when no loopback socket can be bound.
pub fn spawn_slow_upstream(delay: Duration, body: &'static str) -> Result<String, String> {
    spawn_with_delay(200, body, Some(delay))
}

/// Shared stub runner behind the public spawn helpers.
fn spawn_with_delay(
    status: u16,
    body: &'static str,
    delay: Option<Duration>,
) -> Result<String, String> {
    let server = Server::http("127.0.0.1:0")
        .map_err(|err| format!("failed to start upstream stub: {err}"))?;
    let addr = upstream_addr(&server)?;
    let marker = Header::from_bytes(&b"x-upstream"[..], &b"ready"[..])
        .map_err(|()| "failed to build upstream marker header".to_string())?;
    thread::spawn(move || {
        for request in server.incoming_requests() {
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            let response =
                Response::from_string(body).with_status_code(status).with_header(marker.clone());
            let _ = request.respond(response);
        }
    });
    Ok(format!("http://{addr}/rpc"))
}

/// Resolves the bound socket address of a stub server.
fn upstream_addr(server: &Server) -> Result<SocketAddr, String> {
    server.server_addr().to_ip().ok_or_else(|| "upstream stub has no ip address".to_string())
}
