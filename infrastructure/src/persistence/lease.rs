//! Expiring leases for the scheduler triggers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consensus_application::{LeaseKey, LeaseManager, LeaseToken};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

struct Held {
    token: LeaseToken,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryLeaseManager {
    leases: DashMap<LeaseKey, Held>,
    next_token: AtomicU64,
}

impl MemoryLeaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&self) -> LeaseToken {
        LeaseToken(self.next_token.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl LeaseManager for MemoryLeaseManager {
    async fn try_acquire(
        &self,
        key: &LeaseKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<LeaseToken> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        match self.leases.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().expires_at > now {
                    debug!(lease = %key, "Lease held elsewhere");
                    return None;
                }
                let token = self.issue();
                slot.insert(Held { token, expires_at });
                Some(token)
            }
            Entry::Vacant(slot) => {
                let token = self.issue();
                slot.insert(Held { token, expires_at });
                Some(token)
            }
        }
    }

    async fn release(&self, key: &LeaseKey, token: LeaseToken) {
        self.leases.remove_if(key, |_, held| held.token == token);
    }
}
