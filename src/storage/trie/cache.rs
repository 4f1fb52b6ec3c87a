use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, warn};
use lru::LruCache;

/// Strategies plugged into an [`OnEvictCache`]
///
/// The handler is owned by the cache and is only ever called with the
/// cache's write lock held, through the cache's locked state. It has no way
/// to reach the cache it belongs to, so it cannot re-enter it.
pub trait EvictionHandler<K, V> {
    /// Error returned by the callbacks
    type Error;

    /// Size charged against the cache budget for an entry
    ///
    /// Must return the same size for an entry for as long as it is resident.
    fn size_of(&self, key: &K, value: &V) -> usize;

    /// Called with each entry removed from the cache
    fn on_eviction(&mut self, key: K, value: V) -> Result<(), Self::Error>;

    /// Called once after every eviction pass
    fn on_eviction_batch_finished(&mut self) -> Result<(), Self::Error>;
}

struct CacheState<K: Hash + Eq, V, H> {
    /// Entries from least to most recently written
    fifo: LruCache<K, V>,
    current_size: usize,
    handler: H,
}

impl<K: Hash + Eq, V, H: EvictionHandler<K, V>> CacheState<K, V, H> {
    /// Evict least recently written entries until at least `batch_size`
    /// bytes were removed and the cache fits in `max_size`, or until the
    /// cache is empty. Every callback runs even after a failure; the last
    /// error is returned.
    fn evict_batch(&mut self, max_size: usize, batch_size: usize) -> Result<(), H::Error> {
        let mut last_err = None;
        let mut evicted_count = 0;
        let mut evicted_size = 0;

        while let Some((key, value)) = self.fifo.pop_lru() {
            let size = self.handler.size_of(&key, &value);
            self.current_size = self.current_size.saturating_sub(size);
            evicted_size += size;
            evicted_count += 1;

            if let Err(e) = self.handler.on_eviction(key, value) {
                last_err = Some(e);
            }

            if evicted_size >= batch_size && self.current_size <= max_size {
                break;
            }
        }

        if let Err(e) = self.handler.on_eviction_batch_finished() {
            last_err = Some(e);
        }

        debug!(
            "Evicted {} entries ({} bytes), {} entries ({} bytes) remain",
            evicted_count,
            evicted_size,
            self.fifo.len(),
            self.current_size
        );

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A size-bounded write-behind cache
///
/// Entries are ordered by when they were last written; reads never change
/// the order. When a `put` pushes the total size past `max_size`, the oldest
/// entries are handed to the [`EvictionHandler`] in a batch of at least
/// `eviction_batch_size` bytes, followed by one batch-finished callback.
///
/// Errors from the handler are returned to the caller, but the evicted
/// entries are already gone from the cache. Callers should treat such an
/// error as fatal for whatever the handler writes to.
pub struct OnEvictCache<K: Hash + Eq, V, H> {
    max_size: usize,
    eviction_batch_size: usize,
    state: RwLock<CacheState<K, V, H>>,
}

impl<K, V, H> OnEvictCache<K, V, H>
where
    K: Hash + Eq,
    V: Clone,
    H: EvictionHandler<K, V>,
{
    /// Create a new empty cache
    pub fn new(max_size: usize, eviction_batch_size: usize, handler: H) -> Self {
        if eviction_batch_size > max_size {
            warn!(
                "Eviction batch size {} exceeds cache size {}, every eviction will empty the cache",
                eviction_batch_size, max_size
            );
        }
        Self {
            max_size,
            eviction_batch_size,
            state: RwLock::new(CacheState {
                fifo: LruCache::unbounded(),
                current_size: 0,
                handler,
            }),
        }
    }

    /// Get the value stored under `key`, without changing its position
    pub fn get(&self, key: &K) -> Option<V> {
        self.read().fifo.peek(key).cloned()
    }

    /// Insert or replace the value under `key` and mark it most recently written
    ///
    /// Runs an eviction pass if the cache grows past its maximum size and
    /// returns the last error from that pass.
    pub fn put(&self, key: K, value: V) -> Result<(), H::Error> {
        let mut guard = self.write();
        let state = &mut *guard;

        if let Some(old_value) = state.fifo.peek(&key) {
            state.current_size -= state.handler.size_of(&key, old_value);
        }
        state.current_size += state.handler.size_of(&key, &value);
        state.fifo.put(key, value);

        if state.current_size > self.max_size {
            return state.evict_batch(self.max_size, self.eviction_batch_size);
        }
        Ok(())
    }

    /// Evict every entry, in batches of the configured size
    ///
    /// Every entry is evicted even if callbacks fail, and the cache is empty
    /// afterwards. Returns the last error, if any.
    pub fn flush(&self) -> Result<(), H::Error> {
        let mut state = self.write();
        let mut last_err = None;

        while !state.fifo.is_empty() {
            if let Err(e) = state.evict_batch(self.max_size, self.eviction_batch_size) {
                last_err = Some(e);
            }
        }
        state.current_size = 0;

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.read().fifo.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.read().fifo.is_empty()
    }

    /// Total size of the resident entries
    pub fn current_size(&self) -> usize {
        self.read().current_size
    }

    /// Size above which a put triggers an eviction pass
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Minimum total size removed by one eviction pass
    pub fn eviction_batch_size(&self) -> usize {
        self.eviction_batch_size
    }

    /// The least recently written entry, without changing its position
    pub fn oldest(&self) -> Option<(K, V)>
    where
        K: Clone,
    {
        self.read()
            .fifo
            .peek_lru()
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState<K, V, H>> {
        self.state.read().unwrap()
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState<K, V, H>> {
        self.state.write().unwrap()
    }
}
