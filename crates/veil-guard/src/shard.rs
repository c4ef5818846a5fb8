//! Lock-striped hash map with a store-wide entry cap.
//!
//! Keys are routed to one of a fixed number of shards, each behind its own
//! `Mutex`. Operations on a key lock only that key's shard; maintenance
//! passes walk the shards one at a time. The cap is a single atomic count of
//! live entries shared by all shards, so an unlucky hash spread never
//! refuses inserts while the store as a whole has room.
//!
//! A poisoned shard is recovered rather than propagated: the contents are
//! plain data with no cross-entry invariants, so the request path never
//! panics on a lock.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{GuardError, GuardResult};

pub const DEFAULT_SHARDS: usize = 64;

pub struct ShardedMap<K, V> {
    shards: Box<[Mutex<HashMap<K, V>>]>,
    hasher: RandomState,
    capacity: usize,
    live: AtomicUsize,
}

/// Exclusive access to one shard. Every insert and removal goes through here
/// so the live count stays exact.
pub struct Shard<'a, K, V> {
    map: MutexGuard<'a, HashMap<K, V>>,
    capacity: usize,
    live: &'a AtomicUsize,
}

impl<K: Hash + Eq, V> Shard<'_, K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Insert `value` under `key`. Overwriting an existing key always
    /// succeeds; a new key needs a free slot in the store, otherwise the
    /// value is handed back.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(), V> {
        if let Some(slot) = self.map.get_mut(&key) {
            *slot = value;
            return Ok(());
        }
        let reserved = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            return Err(value);
        }
        self.map.insert(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.map.remove(key);
        if removed.is_some() {
            self.live.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// Remove the entry of this shard with the smallest `f(value)`.
    pub fn remove_min_by_key<B: Ord>(&mut self, mut f: impl FnMut(&V) -> B) -> Option<(K, V)>
    where
        K: Clone,
    {
        let key = self
            .map
            .iter()
            .min_by_key(|&(_, v)| f(v))
            .map(|(k, _)| k.clone())?;
        self.remove(&key).map(|v| (key, v))
    }
}

impl<K: Hash + Eq, V> ShardedMap<K, V> {
    /// A map holding at most `capacity` entries in total. When `capacity` is
    /// smaller than `shard_count` the shard count shrinks to match.
    pub fn new(capacity: usize, shard_count: usize) -> GuardResult<Self> {
        if capacity == 0 {
            return Err(GuardError::ZeroCapacity);
        }
        if shard_count == 0 {
            return Err(GuardError::ZeroShards);
        }
        let shards = (0..shard_count.min(capacity))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            shards,
            hasher: RandomState::new(),
            capacity,
            live: AtomicUsize::new(0),
        })
    }

    pub fn with_capacity(capacity: usize) -> GuardResult<Self> {
        Self::new(capacity, DEFAULT_SHARDS)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn shard_for(&self, key: &K) -> &Mutex<HashMap<K, V>> {
        let idx = (self.hasher.hash_one(key) % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    fn lock(shard: &Mutex<HashMap<K, V>>) -> MutexGuard<'_, HashMap<K, V>> {
        shard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the shard owning `key`.
    pub fn with_shard<R>(&self, key: &K, f: impl FnOnce(&mut Shard<'_, K, V>) -> R) -> R {
        let mut shard = Shard {
            map: Self::lock(self.shard_for(key)),
            capacity: self.capacity,
            live: &self.live,
        };
        f(&mut shard)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.with_shard(key, |shard| shard.remove(key))
    }

    /// Keep only entries for which `keep` returns true. Returns how many were
    /// removed. Locks one shard at a time.
    pub fn retain(&self, mut keep: impl FnMut(&K, &mut V) -> bool) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut guard = Self::lock(shard);
            let before = guard.len();
            guard.retain(|k, v| keep(k, v));
            let dropped = before - guard.len();
            self.live.fetch_sub(dropped, Ordering::AcqRel);
            removed += dropped;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> std::fmt::Debug for ShardedMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedMap")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity)
            .field("live", &self.live.load(Ordering::Relaxed))
            .finish()
    }
}
