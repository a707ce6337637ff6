//! Port for the structured audit log.
//!
//! Defines the [`AuditLog`] trait for recording job lifecycle and billing
//! events (submissions, phase results, charges, period resets) to a
//! machine-readable log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port keeps a durable record of
//! what was run and what was charged.

use serde_json::Value;

/// A structured audit event.
pub struct AuditEvent {
    /// Event type identifier (e.g., "job_submitted", "usage_consumed").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl AuditEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for writing audit events.
///
/// `log` is synchronous and non-fallible; write failures are the adapter's
/// problem and never abort a job.
pub trait AuditLog: Send + Sync {
    fn log(&self, event: AuditEvent);
}

/// No-op implementation for tests and when auditing is disabled.
pub struct NoAuditLog;

impl AuditLog for NoAuditLog {
    fn log(&self, _event: AuditEvent) {}
}
