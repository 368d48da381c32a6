use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use devportal_core::{AggregateRoot, DomainError, DomainResult};

use super::poisoned;

/// Keyed store abstraction for portal state (applications, credential slots).
///
/// Every method is atomic with respect to the others. `update` works on a
/// copy and only commits when the closure succeeds, so a failed update
/// leaves the stored value untouched.
pub trait KeyedStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> DomainResult<Option<V>>;

    /// Insert a value that must not exist yet (`Conflict` otherwise).
    fn insert_new(&self, key: K, value: V) -> DomainResult<()>;

    /// Insert a new aggregate under its own id.
    fn insert_root(&self, root: V) -> DomainResult<()>
    where
        K: Clone,
        V: AggregateRoot<Id = K>,
    {
        self.insert_new(root.id().clone(), root)
    }

    fn upsert(&self, key: K, value: V) -> DomainResult<()>;

    /// Read-modify-write of one value. Returns `None` when the key is absent.
    fn update<R>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> DomainResult<R>,
    ) -> DomainResult<Option<R>>;

    fn remove(&self, key: &K) -> DomainResult<Option<V>>;

    fn list(&self) -> DomainResult<Vec<V>>;

    fn len(&self) -> DomainResult<usize>;
}

impl<K, V, S> KeyedStore<K, V> for Arc<S>
where
    S: KeyedStore<K, V>,
{
    fn get(&self, key: &K) -> DomainResult<Option<V>> {
        (**self).get(key)
    }

    fn insert_new(&self, key: K, value: V) -> DomainResult<()> {
        (**self).insert_new(key, value)
    }

    fn upsert(&self, key: K, value: V) -> DomainResult<()> {
        (**self).upsert(key, value)
    }

    fn update<R>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> DomainResult<R>,
    ) -> DomainResult<Option<R>> {
        (**self).update(key, f)
    }

    fn remove(&self, key: &K) -> DomainResult<Option<V>> {
        (**self).remove(key)
    }

    fn list(&self) -> DomainResult<Vec<V>> {
        (**self).list()
    }

    fn len(&self) -> DomainResult<usize> {
        (**self).len()
    }
}

/// In-memory keyed store, empty at start-up.
#[derive(Debug)]
pub struct InMemoryKeyedStore<K, V> {
    name: &'static str,
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryKeyedStore<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> KeyedStore<K, V> for InMemoryKeyedStore<K, V>
where
    K: Clone + Eq + Hash + core::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> DomainResult<Option<V>> {
        let map = self.inner.read().map_err(poisoned(self.name))?;
        Ok(map.get(key).cloned())
    }

    fn insert_new(&self, key: K, value: V) -> DomainResult<()> {
        let mut map = self.inner.write().map_err(poisoned(self.name))?;
        if map.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "{} already contains {key:?}",
                self.name
            )));
        }
        map.insert(key, value);
        Ok(())
    }

    fn upsert(&self, key: K, value: V) -> DomainResult<()> {
        let mut map = self.inner.write().map_err(poisoned(self.name))?;
        map.insert(key, value);
        Ok(())
    }

    fn update<R>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> DomainResult<R>,
    ) -> DomainResult<Option<R>> {
        let mut map = self.inner.write().map_err(poisoned(self.name))?;
        let Some(current) = map.get(key) else {
            return Ok(None);
        };

        let mut draft = current.clone();
        let out = f(&mut draft)?;
        map.insert(key.clone(), draft);
        Ok(Some(out))
    }

    fn remove(&self, key: &K) -> DomainResult<Option<V>> {
        let mut map = self.inner.write().map_err(poisoned(self.name))?;
        Ok(map.remove(key))
    }

    fn list(&self) -> DomainResult<Vec<V>> {
        let map = self.inner.read().map_err(poisoned(self.name))?;
        Ok(map.values().cloned().collect())
    }

    fn len(&self) -> DomainResult<usize> {
        let map = self.inner.read().map_err(poisoned(self.name))?;
        Ok(map.len())
    }
}
