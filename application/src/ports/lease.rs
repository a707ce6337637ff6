//! Lease port
//!
//! Scheduler triggers take a lease keyed by (trigger kind, scope) before
//! touching an account. A held lease makes the next invocation skip rather
//! than queue, and the TTL bounds how long a crashed holder blocks others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey {
    pub kind: &'static str,
    pub scope: String,
}

impl LeaseKey {
    pub fn new(kind: &'static str, scope: impl Into<String>) -> Self {
        Self {
            kind,
            scope: scope.into(),
        }
    }
}

impl std::fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.scope)
    }
}

/// Proof of holding a lease; required to release it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseToken(pub u64);

#[async_trait]
pub trait LeaseManager: Send + Sync {
    /// Take the lease unless someone holds an unexpired one.
    async fn try_acquire(&self, key: &LeaseKey, ttl: Duration, now: DateTime<Utc>)
    -> Option<LeaseToken>;

    /// Release a lease; a stale token (expired and re-acquired) is ignored.
    async fn release(&self, key: &LeaseKey, token: LeaseToken);
}
