use crate::common::model::DedupKey;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};
use metrics::counter;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Short-lived memory of "this rider was just sent to this destination".
///
/// A reservation lives for `window` from the moment it is created. Lookups
/// that find a live reservation do not extend it. Entries are dropped lazily
/// when the same key is reserved again after expiry, or by the sweeper.
///
/// When the cache cannot record a reservation it allows the call instead of
/// suppressing it. A full cache purges expired entries at most once per window.
#[derive(Clone)]
pub struct CallDeduplicator {
    // key -> expires_at
    entries: Arc<DashMap<DedupKey, Instant>>,
    window: Duration,
    max_entries: usize,
    last_full_purge: Arc<Mutex<Option<Instant>>>,
}

impl CallDeduplicator {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            window,
            max_entries: max_entries.max(1),
            last_full_purge: Arc::new(Mutex::new(None)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Atomically reserves `key`. Returns false when a live reservation exists.
    pub fn try_reserve(&self, key: &DedupKey) -> bool {
        let now = Instant::now();
        let expires_at = now + self.window;

        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            let purged = if self.full_purge_due(now) {
                self.purge_expired()
            } else {
                0
            };
            if self.entries.len() >= self.max_entries {
                warn!(
                    "Dedup cache full ({} entries, {} purged), allowing {} without reservation",
                    self.entries.len(),
                    purged,
                    key
                );
                counter!("dedup_reservations_total", "result" => "unrecorded").increment(1);
                return true;
            }
        }

        let reserved = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if now < *occupied.get() {
                    false
                } else {
                    occupied.insert(expires_at);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(expires_at);
                true
            }
        };

        let result = if reserved { "reserved" } else { "duplicate" };
        counter!("dedup_reservations_total", "result" => result).increment(1);
        reserved
    }

    fn full_purge_due(&self, now: Instant) -> bool {
        let mut last = self
            .last_full_purge
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match *last {
            Some(at) if now.duration_since(at) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Whether `key` currently holds a live reservation. Never modifies the entry.
    pub fn is_reserved(&self, key: &DedupKey) -> bool {
        self.entries
            .get(key)
            .map(|expires_at| Instant::now() < *expires_at)
            .unwrap_or(false)
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Spawns the background cleaner. Abort the handle to stop it.
    pub fn start_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let dedup = self.clone();
        info!(
            "Call deduplicator sweeper started: window={}ms, interval={}ms",
            dedup.window.as_millis(),
            interval.as_millis()
        );
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = dedup.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired dedup reservations", purged);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::model::{DestinationArea, RiderKey};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(rider: &str, area: i32) -> DedupKey {
        DedupKey::new(RiderKey::new(rider), DestinationArea(area))
    }

    #[test]
    fn concurrent_reservations_admit_exactly_one() {
        for threads in [2usize, 8, 32] {
            let dedup = CallDeduplicator::new(Duration::from_secs(8), 1_000);
            let barrier = Arc::new(Barrier::new(threads));
            let admitted = Arc::new(AtomicUsize::new(0));

            std::thread::scope(|s| {
                for _ in 0..threads {
                    let dedup = dedup.clone();
                    let barrier = barrier.clone();
                    let admitted = admitted.clone();
                    s.spawn(move || {
                        barrier.wait();
                        if dedup.try_reserve(&key("R1", 42)) {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });

            assert_eq!(admitted.load(Ordering::SeqCst), 1, "threads = {threads}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reservation_expires_after_window() {
        let dedup = CallDeduplicator::new(Duration::from_secs(8), 1_000);
        assert!(dedup.try_reserve(&key("R1", 42)));

        time::advance(Duration::from_secs(7)).await;
        assert!(!dedup.try_reserve(&key("R1", 42)));

        time::advance(Duration::from_millis(1_001)).await;
        assert!(dedup.try_reserve(&key("R1", 42)));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_lookups_do_not_renew_reservation() {
        let dedup = CallDeduplicator::new(Duration::from_secs(8), 1_000);
        assert!(dedup.try_reserve(&key("R1", 42)));

        for _ in 0..7 {
            time::advance(Duration::from_secs(1)).await;
            assert!(!dedup.try_reserve(&key("R1", 42)));
        }

        time::advance(Duration::from_millis(1_001)).await;
        assert!(dedup.try_reserve(&key("R1", 42)));
    }

    #[test]
    fn keys_are_independent_per_rider_and_area() {
        let dedup = CallDeduplicator::new(Duration::from_secs(8), 1_000);
        assert!(dedup.try_reserve(&key("R1", 42)));
        assert!(dedup.try_reserve(&key("R1", 43)));
        assert!(dedup.try_reserve(&key("R2", 42)));
        assert!(!dedup.try_reserve(&key("R2", 42)));
        assert!(dedup.is_reserved(&key("R1", 43)));
        assert!(!dedup.is_reserved(&key("R3", 42)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_purges_expired_then_degrades_to_allow() {
        let dedup = CallDeduplicator::new(Duration::from_secs(1), 2);
        assert!(dedup.try_reserve(&key("R1", 1)));
        assert!(dedup.try_reserve(&key("R2", 1)));

        // full with live entries: allowed but not recorded
        assert!(dedup.try_reserve(&key("R3", 1)));
        assert!(dedup.try_reserve(&key("R3", 1)));
        assert!(!dedup.is_reserved(&key("R3", 1)));

        // existing keys are still deduplicated while full
        assert!(!dedup.try_reserve(&key("R1", 1)));

        time::advance(Duration::from_millis(1_500)).await;
        assert!(dedup.try_reserve(&key("R3", 1)));
        assert!(dedup.is_reserved(&key("R3", 1)));
        assert_eq!(dedup.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_purges_at_most_once_per_window() {
        let dedup = CallDeduplicator::new(Duration::from_secs(10), 2);
        assert!(dedup.try_reserve(&key("R1", 1)));
        time::advance(Duration::from_secs(6)).await;
        assert!(dedup.try_reserve(&key("R2", 1)));

        // full and nothing expired yet: this attempt spends the purge
        assert!(dedup.try_reserve(&key("R3", 1)));
        assert!(!dedup.is_reserved(&key("R3", 1)));

        // R1 has expired, but the last purge is too recent to scan again
        time::advance(Duration::from_millis(4_500)).await;
        assert!(dedup.try_reserve(&key("R4", 1)));
        assert!(!dedup.is_reserved(&key("R4", 1)));
        assert_eq!(dedup.len(), 2);

        time::advance(Duration::from_secs(6)).await;
        assert!(dedup.try_reserve(&key("R4", 1)));
        assert!(dedup.is_reserved(&key("R4", 1)));
        assert_eq!(dedup.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_entries() {
        let dedup = CallDeduplicator::new(Duration::from_secs(1), 1_000);
        for rider in ["R1", "R2", "R3"] {
            assert!(dedup.try_reserve(&key(rider, 7)));
        }
        let sweeper = dedup.start_sweeper(Duration::from_secs(5));

        time::sleep(Duration::from_secs(6)).await;
        assert!(dedup.is_empty());
        sweeper.abort();
    }
}
