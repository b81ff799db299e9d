//! Errors the analysis engine can raise on its own (§7).
//!
//! Everything here is a defensive check against a bug, not a response to
//! malformed probe input — malformed input is handled by dropping or
//! ignoring at the router/transport layer, never by raising `CoreError`.

use thiserror::Error;

/// An invariant the stats collector or chain analyzer detected as
/// violated. Per §7, "the orchestrator never panics on malformed probe
/// input; it may only panic on detected invariant violations... and such
/// a panic is considered a bug" — callers that want the panic behavior
/// the spec describes should `.expect()` on this error at the boundary
/// where they trust their own inputs; library code itself always returns
/// `Result` so tests can assert on the failure instead of catching a panic.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("render event for {component:?} had a negative duration ({duration_ms} ms)")]
    NegativeDuration { component: String, duration_ms: f64 },
}
