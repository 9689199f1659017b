// crates/toolgate-gateway/src/correlation.rs
// ============================================================================
// Module: Correlation And Session Identifiers
// Description: Sanitization for client correlation headers and generation of
//              server-issued correlation and session identifiers.
// Purpose: Provide fail-closed identifier handling for gateway requests.
// Dependencies: toolgate-core, rand
// ============================================================================

//! ## Overview
//! Client-provided correlation identifiers arrive over HTTP headers and are
//! untrusted: they are sanitized under strict token rules before they reach
//! audit records, and invalid values are rejected with a structured reason.
//! Server-side identifiers are generated from a boot-scoped random seed plus
//! a monotonic counter, so every dispatched tool call and every created
//! session carries an identifier that is unique within the process lifetime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rand::RngCore;
use rand::rngs::OsRng;
use toolgate_core::CorrelationId;
use toolgate_core::SessionId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header name for client-provided correlation identifiers.
pub const CLIENT_CORRELATION_HEADER: &str = "x-correlation-id";
/// Maximum allowed length for client correlation identifiers.
pub const MAX_CLIENT_CORRELATION_ID_LENGTH: usize = 128;
/// Prefix applied to every server-issued correlation identifier.
const CORRELATION_ID_PREFIX: &str = "tg";
/// Prefix applied to every gateway-issued session identifier.
const SESSION_ID_PREFIX: &str = "sess";

// ============================================================================
// SECTION: Client Correlation Sanitization
// ============================================================================

/// Typed rejection reason for invalid client correlation identifiers.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationIdRejection {
    /// Input was empty after trimming.
    EmptyAfterTrim,
    /// Input exceeded the maximum length.
    TooLong,
    /// Input contained whitespace after trimming.
    ContainsWhitespace,
    /// Input contained control characters after trimming.
    ContainsControlChar,
    /// Input contained non-ASCII characters.
    NonAscii,
    /// Input contained disallowed ASCII characters.
    ContainsDisallowedChar,
}

impl CorrelationIdRejection {
    /// Returns a stable label for this rejection reason.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::EmptyAfterTrim => "empty_after_trim",
            Self::TooLong => "too_long",
            Self::ContainsWhitespace => "contains_whitespace",
            Self::ContainsControlChar => "contains_control_char",
            Self::NonAscii => "non_ascii",
            Self::ContainsDisallowedChar => "contains_disallowed_char",
        }
    }
}

impl fmt::Display for CorrelationIdRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sanitizes a client correlation identifier using strict token rules.
///
/// Returns `Ok(None)` when no header value is provided. Any invalid value
/// returns a structured rejection reason instead of a partially cleaned
/// identifier.
///
/// # Errors
/// Returns [`CorrelationIdRejection`] when the value is empty, too long,
/// or contains disallowed characters.
pub fn sanitize_client_correlation_id(
    value: Option<&str>,
) -> Result<Option<CorrelationId>, CorrelationIdRejection> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CorrelationIdRejection::EmptyAfterTrim);
    }
    if trimmed.len() > MAX_CLIENT_CORRELATION_ID_LENGTH {
        return Err(CorrelationIdRejection::TooLong);
    }
    for ch in trimmed.chars() {
        if !ch.is_ascii() {
            return Err(CorrelationIdRejection::NonAscii);
        }
        if ch.is_ascii_whitespace() {
            return Err(CorrelationIdRejection::ContainsWhitespace);
        }
        if ch.is_control() {
            return Err(CorrelationIdRejection::ContainsControlChar);
        }
        if !is_tchar(ch) {
            return Err(CorrelationIdRejection::ContainsDisallowedChar);
        }
    }
    Ok(Some(CorrelationId::new(trimmed)))
}

/// Returns true when the character is a valid HTTP token character.
const fn is_tchar(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '.'
                | '^'
                | '_'
                | '`'
                | '|'
                | '~'
        )
}

// ============================================================================
// SECTION: Server-Issued Identifiers
// ============================================================================

/// Boot-scoped correlation identifier generator.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    /// Boot-scoped random identifier for entropy.
    boot_id: u64,
    /// Monotonic counter for identifiers issued in this process.
    counter: AtomicU64,
}

impl CorrelationIdGenerator {
    /// Creates a new generator seeded from the OS random source.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues a fresh correlation identifier.
    #[must_use]
    pub fn issue(&self) -> CorrelationId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        CorrelationId::new(format!(
            "{CORRELATION_ID_PREFIX}-{:016x}-{seq:016x}",
            self.boot_id
        ))
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Boot-scoped session identifier generator.
///
/// Session identifiers embed a creation timestamp in addition to the random
/// seed so operators can read creation order from logs without joining on
/// audit records.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct SessionIdGenerator {
    /// Boot-scoped random identifier for entropy.
    seed: u32,
    /// Monotonic counter for identifiers issued in this process.
    counter: AtomicU64,
}

impl SessionIdGenerator {
    /// Creates a new generator seeded from the OS random source.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; 4];
        OsRng.fill_bytes(&mut bytes);
        Self {
            seed: u32::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues a fresh session identifier.
    #[must_use]
    pub fn issue(&self) -> SessionId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        SessionId::new(format!(
            "{SESSION_ID_PREFIX}-{millis:012x}-{:08x}{seq:08x}",
            self.seed
        ))
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
