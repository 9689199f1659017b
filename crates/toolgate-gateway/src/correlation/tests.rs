// crates/toolgate-gateway/src/correlation/tests.rs
// ============================================================================
// Module: Correlation Identifier Tests
// Description: Unit tests for correlation sanitization and identifier issuance.
// Purpose: Validate rejection reasons and generator formatting guarantees.
// Dependencies: toolgate-gateway
// ============================================================================

//! ## Overview
//! Validates that client correlation sanitization rejects malformed inputs
//! and that server-issued correlation and session identifiers follow stable
//! formatting rules.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use super::CorrelationIdGenerator;
use super::CorrelationIdRejection;
use super::MAX_CLIENT_CORRELATION_ID_LENGTH;
use super::SessionIdGenerator;
use super::sanitize_client_correlation_id;

// ============================================================================
// SECTION: Sanitization Tests
// ============================================================================

#[test]
fn sanitize_passes_missing_header_through() {
    let cleaned = sanitize_client_correlation_id(None).expect("missing header is not an error");
    assert!(cleaned.is_none());
}

#[test]
fn sanitize_trims_and_accepts_token_values() {
    let cleaned = sanitize_client_correlation_id(Some("  req-42.a  "))
        .expect("token value should be accepted")
        .expect("value should be present");
    assert_eq!(cleaned.as_str(), "req-42.a");
}

#[test]
fn sanitize_rejects_empty_after_trim() {
    let err = sanitize_client_correlation_id(Some("   ")).expect_err("expected empty rejection");
    assert_eq!(err, CorrelationIdRejection::EmptyAfterTrim);
}

#[test]
fn sanitize_rejects_too_long() {
    let value = "a".repeat(MAX_CLIENT_CORRELATION_ID_LENGTH + 1);
    let err = sanitize_client_correlation_id(Some(&value)).expect_err("expected length rejection");
    assert_eq!(err, CorrelationIdRejection::TooLong);
}

#[test]
fn sanitize_rejects_whitespace() {
    let err =
        sanitize_client_correlation_id(Some("bad value")).expect_err("expected whitespace reject");
    assert_eq!(err, CorrelationIdRejection::ContainsWhitespace);
}

#[test]
fn sanitize_rejects_control_chars() {
    let err =
        sanitize_client_correlation_id(Some("bad\u{0007}")).expect_err("expected control reject");
    assert_eq!(err, CorrelationIdRejection::ContainsControlChar);
}

#[test]
fn sanitize_rejects_non_ascii() {
    let err = sanitize_client_correlation_id(Some("bad\u{00e9}")).expect_err("expected non-ascii");
    assert_eq!(err, CorrelationIdRejection::NonAscii);
}

#[test]
fn sanitize_rejects_disallowed_chars() {
    let err = sanitize_client_correlation_id(Some("bad@")).expect_err("expected tchar reject");
    assert_eq!(err, CorrelationIdRejection::ContainsDisallowedChar);
}

#[test]
fn rejection_labels_are_stable() {
    assert_eq!(CorrelationIdRejection::EmptyAfterTrim.label(), "empty_after_trim");
    assert_eq!(CorrelationIdRejection::TooLong.label(), "too_long");
    assert_eq!(CorrelationIdRejection::NonAscii.label(), "non_ascii");
}

// ============================================================================
// SECTION: Generator Tests
// ============================================================================

#[test]
fn correlation_generator_issues_formatted_ids() {
    let generator = CorrelationIdGenerator::new();
    let first = generator.issue();
    let second = generator.issue();
    assert_ne!(first, second);
    let parts: Vec<&str> = first.as_str().split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "tg");
    assert_eq!(parts[1].len(), 16);
    assert_eq!(parts[2].len(), 16);
    assert!(parts[1].chars().all(|ch| ch.is_ascii_hexdigit()));
    assert!(parts[2].chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn session_generator_issues_formatted_ids() {
    let generator = SessionIdGenerator::new();
    let first = generator.issue();
    let second = generator.issue();
    assert_ne!(first, second);
    let parts: Vec<&str> = first.as_str().split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "sess");
    assert_eq!(parts[1].len(), 12);
    assert_eq!(parts[2].len(), 16);
    assert!(parts[1].chars().all(|ch| ch.is_ascii_hexdigit()));
    assert!(parts[2].chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn session_generator_counter_is_monotonic() {
    let generator = SessionIdGenerator::new();
    let ids: Vec<String> = (0..4).map(|_| generator.issue().as_str().to_string()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}
