use lru::LruCache;
use std::{borrow::Borrow, hash::Hash, num::NonZeroUsize};

/// Default number of entries each platform handler remembers.
pub const DEFAULT_CAPACITY: usize = 5000;

/// Bounded key -> value map that forgets the least recently touched entry
/// once it grows past its capacity.
///
/// Only [`RecencyCache::touch_and_store`] changes recency; lookups are
/// read-only. The type does no locking of its own.
#[derive(Debug)]
pub struct RecencyCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
}

impl<K: Hash + Eq, V> RecencyCache<K, V> {
    /// Create an empty cache. A capacity of zero is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    #[must_use]
    pub fn lookup<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek(key)
    }

    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains(key)
    }

    /// Insert `key` at the most recent end, replacing any previous value.
    ///
    /// Returns the entry evicted to stay within capacity, if any.
    pub fn touch_and_store(&mut self, key: K, value: V) -> Option<(K, V)> {
        // drop first so a refreshed key never counts as an overflow
        self.inner.pop(&key);
        self.inner.push(key, value)
    }

    /// Forget `key`, returning its value.
    pub fn evict<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.pop(key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// Keys ordered from least to most recently touched.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.iter().rev().map(|(k, _)| k)
    }
}

impl<K: Hash + Eq, V> Default for RecencyCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
