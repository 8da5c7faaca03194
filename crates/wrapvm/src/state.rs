//! Host state handles: the key-value region a call may touch.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Key-value store handle supplied by the host runtime.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&self, key: &[u8], value: &[u8]);
    fn delete(&self, key: &[u8]);
}

/// The region bound into the host bridge for one invocation.
pub type StateScope = Arc<dyn KvStore>;

/// In-memory store; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_vec(), value.to_vec());
    }

    fn delete(&self, key: &[u8]) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Namespaces every key under `prefix`, like a per-contract store prefix.
pub struct PrefixStore {
    inner: StateScope,
    prefix: Vec<u8>,
}

impl PrefixStore {
    pub fn new(inner: StateScope, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &[u8]) -> Vec<u8> {
        let mut k = Vec::with_capacity(self.prefix.len() + key.len());
        k.extend_from_slice(&self.prefix);
        k.extend_from_slice(key);
        k
    }
}

impl KvStore for PrefixStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        self.inner.set(&self.key(key), value)
    }

    fn delete(&self, key: &[u8]) {
        self.inner.delete(&self.key(key))
    }
}

/// Write buffer over a scope. Reads see buffered writes first; nothing
/// reaches the scope until [`StateOverlay::commit`].
pub struct StateOverlay {
    scope: StateScope,
    // None marks a delete
    writes: Mutex<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl StateOverlay {
    pub fn new(scope: StateScope) -> Self {
        Self {
            scope,
            writes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Flush buffered writes to the scope in key order. Returns how many
    /// keys were written or deleted.
    pub fn commit(&self) -> usize {
        let writes =
            std::mem::take(&mut *self.writes.lock().unwrap_or_else(PoisonError::into_inner));
        let n = writes.len();
        for (key, value) in writes {
            match value {
                Some(v) => self.scope.set(&key, &v),
                None => self.scope.delete(&key),
            }
        }
        n
    }
}

impl KvStore for StateOverlay {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(buffered) = self
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return buffered.clone();
        }
        self.scope.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&self, key: &[u8]) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_vec(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_store_namespaces_keys() {
        let mem = MemoryStore::new();
        let a = PrefixStore::new(Arc::new(mem.clone()), b"a/".to_vec());
        let b = PrefixStore::new(Arc::new(mem.clone()), b"b/".to_vec());
        a.set(b"k", b"1");
        b.set(b"k", b"2");
        assert_eq!(a.get(b"k").unwrap(), b"1");
        assert_eq!(b.get(b"k").unwrap(), b"2");
        assert_eq!(mem.get(b"a/k").unwrap(), b"1");
        a.delete(b"k");
        assert!(a.get(b"k").is_none());
        assert_eq!(b.get(b"k").unwrap(), b"2");
    }

    #[test]
    fn overlay_buffers_until_commit() {
        let mem = MemoryStore::new();
        mem.set(b"old", b"x");
        let overlay = StateOverlay::new(Arc::new(mem.clone()));
        overlay.set(b"new", b"y");
        overlay.delete(b"old");

        assert_eq!(overlay.get(b"new").unwrap(), b"y");
        assert!(overlay.get(b"old").is_none());
        assert!(mem.get(b"new").is_none());
        assert_eq!(mem.get(b"old").unwrap(), b"x");

        assert_eq!(overlay.commit(), 2);
        assert_eq!(mem.get(b"new").unwrap(), b"y");
        assert!(mem.get(b"old").is_none());
        assert_eq!(overlay.pending(), 0);
    }

    #[test]
    fn dropped_overlay_discards_writes() {
        let mem = MemoryStore::new();
        {
            let overlay = StateOverlay::new(Arc::new(mem.clone()));
            overlay.set(b"k", b"v");
        }
        assert!(mem.is_empty());
    }
}
