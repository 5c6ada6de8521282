use std::sync::Arc;
use flurry::HashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use crate::domain::AnnouncementId;

type LockMap = HashMap<AnnouncementId, Arc<Mutex<()>>>;

/// Owners of a mutex nobody else waits for: the map, the inner guard and the guard's own handle.
const IDLE_OWNERS: usize = 3;

/// Async mutexes keyed by announcement. Acknowledgments of the same announcement are processed
/// one at a time while different announcements don't block each other.
#[derive(Clone, Debug, Default)]
pub struct AnnouncementLocks {
    inner: Arc<LockMap>,
}

/// Holds the lock of an announcement. When the last holder leaves, the mutex is evicted from
/// the map, so the map only contains announcements that are being processed right now.
pub struct AnnouncementGuard {
    announcement_id: AnnouncementId,
    locks: Arc<LockMap>,
    mutex: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl AnnouncementLocks {
    pub async fn lock(&self, announcement_id: AnnouncementId) -> AnnouncementGuard {
        loop {
            let mutex = {
                let map = self.inner.pin();
                match map.try_insert(announcement_id, Arc::default()) {
                    Ok(inserted) => Arc::clone(inserted),
                    Err(err) => Arc::clone(err.current),
                }
            };
            log::debug!("taking the lock of the announcement {announcement_id}");
            let guard = Arc::clone(&mutex).lock_owned().await;

            // the mutex might have been evicted while we were waiting for it
            let is_current = self.inner.pin()
                .get(&announcement_id)
                .is_some_and(|current| Arc::ptr_eq(current, &mutex));
            if is_current {
                return AnnouncementGuard {
                    announcement_id,
                    locks: Arc::clone(&self.inner),
                    mutex,
                    guard: Some(guard),
                }
            }
            log::debug!("the lock of the announcement {announcement_id} was evicted, retrying");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Drop for AnnouncementGuard {
    fn drop(&mut self) {
        // evict before unlocking, so a waiter for the old mutex sees it's stale
        if Arc::strong_count(&self.mutex) == IDLE_OWNERS && self.locks.pin().remove(&self.announcement_id).is_some() {
            log::debug!("the lock of the announcement {} was released", self.announcement_id);
        }
        self.guard.take();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use super::*;

    #[tokio::test]
    async fn same_announcement_is_serialized() {
        let locks = AnnouncementLocks::default();
        let id = AnnouncementId::from(1);
        let guard = locks.lock(id).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock(id).await; })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // another announcement isn't blocked
        let other = tokio::time::timeout(Duration::from_secs(1), locks.lock(AnnouncementId::from(2)))
            .await
            .expect("the lock of another announcement is blocked");
        assert_eq!(locks.len(), 2);
        drop(other);
        assert_eq!(locks.len(), 1);

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("the contender is still blocked")
            .unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn idle_locks_are_evicted() {
        let locks = AnnouncementLocks::default();
        for i in 0..10 {
            let _guard = locks.lock(AnnouncementId::from(i % 2)).await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn eviction_keeps_mutual_exclusion() {
        let locks = AnnouncementLocks::default();
        let id = AnnouncementId::from(1);
        let inside = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let tasks = (0..50).map(|_| {
            let locks = locks.clone();
            let inside = inside.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
                assert_eq!(inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            })
        });
        for res in futures::future::join_all(tasks).await {
            res.unwrap();
        }
        assert_eq!(locks.len(), 0);
    }
}
