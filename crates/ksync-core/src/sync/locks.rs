//! Mutual exclusion per content hash
//!
//! The purge → upload → attach sequence for one content hash must not
//! interleave with another for the same hash, or one worker's upload can
//! recreate the record the other just purged.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

use ksync_fs::ContentHash;

/// Registry of content hashes currently being synced.
#[derive(Debug, Default)]
pub struct ContentLocks {
    held: Mutex<HashSet<ContentHash>>,
    released: Condvar,
}

impl ContentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other holder has `hash`, then hold it until the
    /// guard drops.
    pub fn acquire(&self, hash: &ContentHash) -> ContentGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(hash) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(hash.clone());
        ContentGuard {
            locks: self,
            hash: hash.clone(),
        }
    }

    pub fn is_held(&self, hash: &ContentHash) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(hash)
    }
}

/// Holds one content hash; releases it on drop.
#[derive(Debug)]
pub struct ContentGuard<'a> {
    locks: &'a ContentLocks,
    hash: ContentHash,
}

impl Drop for ContentGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.hash);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksync_fs::hash_bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let locks = ContentLocks::new();
        let hash = hash_bytes(b"a");

        let guard = locks.acquire(&hash);
        assert!(locks.is_held(&hash));
        drop(guard);
        assert!(!locks.is_held(&hash));
    }

    #[test]
    fn different_hashes_do_not_block() {
        let locks = ContentLocks::new();
        let _a = locks.acquire(&hash_bytes(b"a"));
        let _b = locks.acquire(&hash_bytes(b"b"));
    }

    #[test]
    fn same_hash_is_serialized() {
        let locks = ContentLocks::new();
        let hash = hash_bytes(b"shared");
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let _guard = locks.acquire(&hash);
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
