use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// A concurrent memoizing map.
///
/// Each key is computed at most once: concurrent misses on the same key share
/// one slot and all but one of them block until the value is ready.
pub struct ComputingCache<K, V> {
    slots: RwLock<HashMap<K, Arc<OnceLock<V>>>>,
}

impl<K, V> ComputingCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_compute<F>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        let slot = self.slot(key);
        slot.get_or_init(|| compute(key)).clone()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.read();
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn clear(&self) {
        self.slots.write().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    fn slot(&self, key: &K) -> Arc<OnceLock<V>> {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}
