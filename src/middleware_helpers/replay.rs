use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Remembers recently processed webhook message ids so a redelivery inside the
/// retention window is acknowledged without being applied twice.
#[derive(Clone)]
pub struct ReplayGuard {
    seen: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl ReplayGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Records `message_id`; returns `false` if it was already seen within the TTL.
    pub fn first_delivery(&self, message_id: &str) -> bool {
        self.cleanup();
        let now = Instant::now();
        match self.seen.entry(message_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) >= self.ttl {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Forgets `message_id`, so a failed delivery can be retried by the sender.
    pub fn forget(&self, message_id: &str) {
        self.seen.remove(message_id);
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_delivery_is_detected() {
        let guard = ReplayGuard::default();
        assert!(guard.first_delivery("msg_1"));
        assert!(!guard.first_delivery("msg_1"));
        assert!(guard.first_delivery("msg_2"));
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn forgotten_message_can_be_redelivered() {
        let guard = ReplayGuard::default();
        assert!(guard.first_delivery("msg_1"));
        guard.forget("msg_1");
        assert!(guard.first_delivery("msg_1"));
    }

    #[test]
    fn expired_entries_are_dropped() {
        let guard = ReplayGuard::new(Duration::from_millis(0));
        assert!(guard.first_delivery("msg_1"));
        assert!(guard.first_delivery("msg_1"));
        guard.cleanup();
        assert!(guard.is_empty());
    }
}
