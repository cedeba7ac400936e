use super::registry::Preferences;
use super::ConnectionId;
use crate::models::SupportedLanguage;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};

/// How waiting connections are paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Mirror matches only, wait forever
    #[default]
    Strict,
    /// After `relax_after`, any two distinct waiters may be paired
    Relaxed,
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub connection_id: ConnectionId,
    pub preferences: Preferences,
    pub enqueued_at: DateTime<Utc>,
    /// Partner this entry just left; only chosen again when nobody else fits
    pub avoid: Option<ConnectionId>,
    seq: u64,
}

impl QueueEntry {
    fn is_avoiding(&self, other: &QueueEntry) -> bool {
        self.avoid == Some(other.connection_id) || other.avoid == Some(self.connection_id)
    }

    fn waited(&self, now: DateTime<Utc>) -> Duration {
        now - self.enqueued_at
    }
}

/// Two entries removed from the queue together. `first` was enqueued earlier.
#[derive(Debug, Clone)]
pub struct Pairing {
    pub first: QueueEntry,
    pub second: QueueEntry,
}

type Bucket = (SupportedLanguage, SupportedLanguage);

/// Waiting connections, FIFO within each (native, target) bucket
pub struct MatchmakingQueue {
    policy: MatchPolicy,
    relax_after: Duration,
    buckets: HashMap<Bucket, VecDeque<QueueEntry>>,
    index: HashMap<ConnectionId, Bucket>,
    next_seq: u64,
}

impl MatchmakingQueue {
    pub fn new(policy: MatchPolicy, relax_after: Duration) -> Self {
        Self {
            policy,
            relax_after,
            buckets: HashMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Add a connection, or pair it immediately if a partner is waiting.
    ///
    /// A connection that is already queued is left where it is.
    pub fn enqueue(
        &mut self,
        connection_id: ConnectionId,
        preferences: Preferences,
        avoid: Option<ConnectionId>,
        now: DateTime<Utc>,
    ) -> Option<Pairing> {
        if self.index.contains_key(&connection_id) {
            tracing::warn!("Connection {} is already queued", connection_id);
            return None;
        }

        let entry = QueueEntry {
            connection_id,
            preferences,
            enqueued_at: now,
            avoid,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let relax_after = self.relax_after;
        let mut partner = self.take_mirror(&entry);
        if partner.is_none() && self.policy == MatchPolicy::Relaxed {
            partner = self.take_oldest(&entry, |other| other.waited(now) >= relax_after);
        }

        if let Some(first) = partner {
            return Some(Pairing {
                first,
                second: entry,
            });
        }

        let bucket = (preferences.native, preferences.target);
        self.index.insert(connection_id, bucket);
        self.buckets.entry(bucket).or_default().push_back(entry);
        None
    }

    /// Withdraw a waiting connection. Idempotent.
    pub fn dequeue(&mut self, connection_id: ConnectionId) -> Option<QueueEntry> {
        let bucket = self.index.remove(&connection_id)?;
        let entries = self.buckets.get_mut(&bucket)?;
        let pos = entries
            .iter()
            .position(|e| e.connection_id == connection_id)?;
        let entry = entries.remove(pos);
        if entries.is_empty() {
            self.buckets.remove(&bucket);
        }
        entry
    }

    /// Pair entries that have waited past the relax threshold.
    ///
    /// A stale entry still prefers a mirror partner; failing that it takes
    /// the oldest other waiter. Does nothing under the strict policy.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Pairing> {
        let mut pairings = Vec::new();
        if self.policy == MatchPolicy::Strict {
            return pairings;
        }

        let mut stale: Vec<(u64, ConnectionId)> = self
            .entries()
            .filter(|e| e.waited(now) >= self.relax_after)
            .map(|e| (e.seq, e.connection_id))
            .collect();
        stale.sort_unstable();

        for (_, connection_id) in stale {
            // May already have been taken as someone else's partner
            let Some(entry) = self.dequeue(connection_id) else {
                continue;
            };

            let partner = self
                .take_mirror(&entry)
                .or_else(|| self.take_oldest(&entry, |_| true));

            match partner {
                Some(other) => pairings.push(if other.seq < entry.seq {
                    Pairing {
                        first: other,
                        second: entry,
                    }
                } else {
                    Pairing {
                        first: entry,
                        second: other,
                    }
                }),
                None => self.reinsert(entry),
            }
        }

        pairings
    }

    /// Remove every entry that has waited at least `timeout`
    pub fn expire(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<QueueEntry> {
        let mut expired: Vec<(u64, ConnectionId)> = self
            .entries()
            .filter(|e| e.waited(now) >= timeout)
            .map(|e| (e.seq, e.connection_id))
            .collect();
        expired.sort_unstable();

        expired
            .into_iter()
            .filter_map(|(_, id)| self.dequeue(id))
            .collect()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.index.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.buckets.values().flatten()
    }

    /// Pop the earliest mirror-compatible entry for `entry`.
    ///
    /// An avoided partner is passed over while any other mirror waits, but is
    /// still taken when it is the only one.
    fn take_mirror(&mut self, entry: &QueueEntry) -> Option<QueueEntry> {
        let bucket = (entry.preferences.target, entry.preferences.native);
        let id = self
            .buckets
            .get(&bucket)?
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.connection_id != entry.connection_id && c.preferences.mirrors(&entry.preferences)
            })
            .min_by_key(|(pos, c)| (c.is_avoiding(entry), *pos))
            .map(|(_, c)| c.connection_id)?;
        self.dequeue(id)
    }

    /// Pop the entry with the lowest sequence number across all buckets,
    /// preferring anyone `entry` is not avoiding
    fn take_oldest<F>(&mut self, entry: &QueueEntry, eligible: F) -> Option<QueueEntry>
    where
        F: Fn(&QueueEntry) -> bool,
    {
        let id = self
            .entries()
            .filter(|c| c.connection_id != entry.connection_id && eligible(*c))
            .min_by_key(|c| (c.is_avoiding(entry), c.seq))
            .map(|c| c.connection_id)?;
        self.dequeue(id)
    }

    /// Put an entry back keeping its original position in the bucket
    fn reinsert(&mut self, entry: QueueEntry) {
        let bucket = (entry.preferences.native, entry.preferences.target);
        let entries = self.buckets.entry(bucket).or_default();
        let pos = entries.partition_point(|e| e.seq < entry.seq);
        self.index.insert(entry.connection_id, bucket);
        entries.insert(pos, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn prefs(native: &str, target: &str) -> Preferences {
        Preferences::parse(Some(native), Some(target)).unwrap()
    }

    fn strict() -> MatchmakingQueue {
        MatchmakingQueue::new(MatchPolicy::Strict, Duration::seconds(30))
    }

    #[test]
    fn test_mirror_pair_removes_both() {
        let mut queue = strict();
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(queue.enqueue(a, prefs("en", "pt"), None, now).is_none());
        assert!(queue.contains(a));

        let pairing = queue.enqueue(b, prefs("pt", "en"), None, now).unwrap();
        assert_eq!(pairing.first.connection_id, a);
        assert_eq!(pairing.second.connection_id, b);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_within_bucket() {
        let mut queue = strict();
        let now = Utc::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        queue.enqueue(first, prefs("en", "pt"), None, now);
        queue.enqueue(second, prefs("en", "pt"), None, now);

        let pairing = queue
            .enqueue(Uuid::new_v4(), prefs("pt", "en"), None, now)
            .unwrap();
        assert_eq!(pairing.first.connection_id, first);
        assert!(queue.contains(second));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_same_preferences_never_pair() {
        let mut queue = strict();
        let now = Utc::now();

        assert!(queue.enqueue(Uuid::new_v4(), prefs("en", "pt"), None, now).is_none());
        assert!(queue.enqueue(Uuid::new_v4(), prefs("en", "pt"), None, now).is_none());
        assert!(queue.enqueue(Uuid::new_v4(), prefs("es", "pt"), None, now).is_none());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_double_enqueue_is_ignored() {
        let mut queue = strict();
        let now = Utc::now();
        let a = Uuid::new_v4();

        queue.enqueue(a, prefs("en", "pt"), None, now);
        assert!(queue.enqueue(a, prefs("pt", "en"), None, now).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_dequeue_is_idempotent() {
        let mut queue = strict();
        let a = Uuid::new_v4();

        queue.enqueue(a, prefs("en", "pt"), None, Utc::now());
        assert!(queue.dequeue(a).is_some());
        assert!(queue.dequeue(a).is_none());
        assert!(queue.is_empty());
        assert!(queue.buckets.is_empty());
    }

    #[test]
    fn test_avoided_partner_is_skipped() {
        let mut queue = strict();
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        queue.enqueue(b, prefs("pt", "en"), None, now);
        queue.enqueue(c, prefs("pt", "en"), None, now);

        let pairing = queue.enqueue(a, prefs("en", "pt"), Some(b), now).unwrap();
        assert_eq!(pairing.first.connection_id, c);
        assert!(queue.contains(b));
    }

    #[test]
    fn test_avoided_partner_taken_when_alone() {
        let mut queue = strict();
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(queue.enqueue(a, prefs("en", "pt"), Some(b), now).is_none());

        let pairing = queue.enqueue(b, prefs("pt", "en"), None, now).unwrap();
        assert_eq!(pairing.first.connection_id, a);
        assert_eq!(pairing.second.connection_id, b);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_strict_sweep_does_nothing() {
        let mut queue = strict();
        let now = Utc::now();
        queue.enqueue(Uuid::new_v4(), prefs("en", "pt"), None, now);
        queue.enqueue(Uuid::new_v4(), prefs("es", "fr"), None, now);

        assert!(queue.sweep(now + Duration::hours(1)).is_empty());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_relaxed_sweep_pairs_after_threshold() {
        let mut queue = MatchmakingQueue::new(MatchPolicy::Relaxed, Duration::seconds(30));
        let start = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        queue.enqueue(a, prefs("en", "pt"), None, start);
        queue.enqueue(b, prefs("es", "fr"), None, start + Duration::seconds(5));

        assert!(queue.sweep(start + Duration::seconds(10)).is_empty());

        let pairings = queue.sweep(start + Duration::seconds(31));
        assert_eq!(pairings.len(), 1);
        assert_eq!(pairings[0].first.connection_id, a);
        assert_eq!(pairings[0].second.connection_id, b);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_relaxed_enqueue_takes_stale_waiter() {
        let mut queue = MatchmakingQueue::new(MatchPolicy::Relaxed, Duration::seconds(30));
        let start = Utc::now();
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();

        queue.enqueue(stale, prefs("en", "pt"), None, start);
        queue.enqueue(fresh, prefs("en", "de"), None, start + Duration::seconds(29));

        // Fresh waiter is not eligible yet, the stale one is
        let newcomer = Uuid::new_v4();
        let pairing = queue
            .enqueue(newcomer, prefs("ja", "zh"), None, start + Duration::seconds(31))
            .unwrap();
        assert_eq!(pairing.first.connection_id, stale);
        assert_eq!(pairing.second.connection_id, newcomer);
        assert!(queue.contains(fresh));
    }

    #[test]
    fn test_relaxed_sweep_leaves_lone_waiter() {
        let mut queue = MatchmakingQueue::new(MatchPolicy::Relaxed, Duration::seconds(1));
        let start = Utc::now();
        let a = Uuid::new_v4();

        queue.enqueue(a, prefs("en", "pt"), None, start);
        assert!(queue.sweep(start + Duration::seconds(5)).is_empty());
        assert!(queue.contains(a));
    }

    #[test]
    fn test_expire_removes_only_old_entries() {
        let mut queue = strict();
        let start = Utc::now();
        let old = Uuid::new_v4();
        let young = Uuid::new_v4();

        queue.enqueue(old, prefs("en", "pt"), None, start);
        queue.enqueue(young, prefs("en", "pt"), None, start + Duration::seconds(50));

        let expired = queue.expire(start + Duration::seconds(60), Duration::seconds(60));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].connection_id, old);
        assert!(queue.contains(young));
    }
}
