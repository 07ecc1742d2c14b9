//! Keyed state backing the rate limiter and the CSRF guard.
//!
//! Both components receive an `Arc<dyn Store<V>>` instead of reaching for a
//! process-wide map, so tests get isolated state and a deployment can swap in
//! a shared backend without touching the admission logic.

use dashmap::{mapref::entry::Entry, DashMap};

/// A keyed store with an atomic read-modify-write primitive.
pub trait Store<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;

    fn set(&self, key: &str, value: V);

    fn delete(&self, key: &str) -> Option<V>;

    /// Atomically replaces the value under `key` with `f(current)` and returns the new value.
    ///
    /// No other update to the same key can interleave between the read and the write.
    fn update(&self, key: &str, f: &mut dyn FnMut(Option<&V>) -> V) -> V;

    /// Drops every entry for which `keep` returns `false`. Returns the number removed.
    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store on a sharded map.
///
/// `update` holds only the shard lock of its key and `retain` walks the map one
/// shard at a time, so a sweep never stalls updates to keys in other shards.
pub struct MemoryStore<V> {
    map: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Store<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.map.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: V) {
        self.map.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> Option<V> {
        self.map.remove(key).map(|(_, v)| v)
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<&V>) -> V) -> V {
        match self.map.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = f(Some(occupied.get()));
                occupied.insert(next.clone());
                next
            }
            Entry::Vacant(vacant) => {
                let next = f(None);
                vacant.insert(next.clone());
                next
            }
        }
    }

    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool) -> usize {
        let mut removed = 0usize;
        self.map.retain(|k, v| {
            let kept = keep(k.as_str(), v);
            if !kept {
                removed += 1;
            }
            kept
        });
        removed
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_delete() {
        let store: MemoryStore<u32> = MemoryStore::new();
        assert!(store.get("a").is_none());
        store.set("a", 1);
        assert_eq!(store.get("a"), Some(1));
        store.set("a", 2);
        assert_eq!(store.get("a"), Some(2));
        assert_eq!(store.delete("a"), Some(2));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_sees_previous_value() {
        let store: MemoryStore<u32> = MemoryStore::new();
        assert_eq!(store.update("k", &mut |cur| cur.copied().unwrap_or(0) + 1), 1);
        assert_eq!(store.update("k", &mut |cur| cur.copied().unwrap_or(0) + 1), 2);
        assert_eq!(store.get("k"), Some(2));
    }

    #[test]
    fn test_retain_counts_removed() {
        let store: MemoryStore<u32> = MemoryStore::new();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            store.set(key, i as u32);
        }
        let removed = store.retain(&mut |_, v| v % 2 == 0);
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        use std::sync::Arc;

        let store: Arc<MemoryStore<u64>> = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        store.update("hot", &mut |cur| cur.copied().unwrap_or(0) + 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get("hot"), Some(8000));
    }
}
