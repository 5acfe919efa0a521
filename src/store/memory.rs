use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{KvStore, StoreError};

/// Process-local store. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            inner: Mutex::new(Inner { entries, writes: 0 }),
        }
    }

    /// Copy of every entry currently held.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock().entries.clone()
    }

    /// Number of successful mutations (set, created set-if-absent, delete).
    #[must_use]
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.entries.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if inner.entries.contains_key(key) {
            return Ok(false);
        }
        inner.entries.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.entries.remove(key).is_some() {
            inner.writes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_only_first_caller_wins() {
        let store = MemoryStore::new();

        let first = store.set_if_absent("lock", "a").await.unwrap();
        let second = store.set_if_absent("lock", "b").await.unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_delete_frees_key_for_next_writer() {
        let store = MemoryStore::with_entries([("lock", "a")]);

        store.delete("lock").await.unwrap();

        assert!(store.set_if_absent("lock", "b").await.unwrap());
    }
}
