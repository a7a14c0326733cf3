//! Deduplicating work queue with per-key exponential backoff.

use pkg_types::meta::ObjectKey;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Retry delay policy: `base * 2^(failures - 1)`, never above `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

pub struct WorkQueue {
    ready: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    delayed: HashMap<ObjectKey, Instant>,
    failures: HashMap<ObjectKey, u32>,
    backoff: Backoff,
}

impl WorkQueue {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            ready: VecDeque::new(),
            queued: HashSet::new(),
            delayed: HashMap::new(),
            failures: HashMap::new(),
            backoff,
        }
    }

    /// Queue `key` for immediate processing. A pending retry is superseded.
    pub fn add(&mut self, key: ObjectKey) {
        self.delayed.remove(&key);
        if self.queued.insert(key.clone()) {
            self.ready.push_back(key);
        }
    }

    /// Next key due at `now`, promoting expired retries first.
    pub fn pop(&mut self, now: Instant) -> Option<ObjectKey> {
        let mut due: Vec<(ObjectKey, Instant)> = self
            .delayed
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (k.clone(), *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);
        for (key, _) in due {
            self.add(key);
        }

        let key = self.ready.pop_front()?;
        self.queued.remove(&key);
        Some(key)
    }

    /// Schedule `key` again after its backoff delay. Returns the delay.
    pub fn retry_later(&mut self, key: ObjectKey, now: Instant) -> Duration {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        *failures += 1;
        let delay = self.backoff.delay(*failures);
        if !self.queued.contains(&key) {
            self.delayed.insert(key, now + delay);
        }
        delay
    }

    /// Reset the failure count of `key` after a success.
    pub fn forget(&mut self, key: &ObjectKey) {
        self.failures.remove(key);
    }

    /// Earliest pending retry, if any.
    pub fn next_retry(&self) -> Option<Instant> {
        self.delayed.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
        }
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let b = backoff();
        assert_eq!(b.delay(1), Duration::from_millis(100));
        assert_eq!(b.delay(2), Duration::from_millis(200));
        assert_eq!(b.delay(4), Duration::from_millis(800));
        assert_eq!(b.delay(5), Duration::from_secs(1));
        assert_eq!(b.delay(200), Duration::from_secs(1));
    }

    #[test]
    fn test_add_deduplicates() {
        let mut q = WorkQueue::new(backoff());
        q.add(key("a"));
        q.add(key("b"));
        q.add(key("a"));
        assert_eq!(q.len(), 2);

        let now = Instant::now();
        assert_eq!(q.pop(now), Some(key("a")));
        assert_eq!(q.pop(now), Some(key("b")));
        assert_eq!(q.pop(now), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_retry_waits_for_delay() {
        let mut q = WorkQueue::new(backoff());
        let now = Instant::now();
        let delay = q.retry_later(key("a"), now);
        assert_eq!(delay, Duration::from_millis(100));
        assert_eq!(q.next_retry(), Some(now + delay));

        assert_eq!(q.pop(now), None);
        assert_eq!(q.pop(now + delay), Some(key("a")));
        assert!(q.next_retry().is_none());
    }

    #[test]
    fn test_failures_accumulate_until_forgotten() {
        let mut q = WorkQueue::new(backoff());
        let now = Instant::now();
        q.retry_later(key("a"), now);
        assert_eq!(q.retry_later(key("a"), now), Duration::from_millis(200));

        q.forget(&key("a"));
        assert_eq!(q.retry_later(key("a"), now), Duration::from_millis(100));
    }

    #[test]
    fn test_event_supersedes_pending_retry() {
        let mut q = WorkQueue::new(backoff());
        let now = Instant::now();
        q.retry_later(key("a"), now);
        q.add(key("a"));
        assert!(q.next_retry().is_none());
        assert_eq!(q.pop(now), Some(key("a")));
    }
}
