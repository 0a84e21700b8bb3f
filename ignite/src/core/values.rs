use std::any::Any;
use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::RwLock;

pub type Value = Arc<dyn Any + Send + Sync>;

///
/// Request scoped key/value storage. The map is only allocated on the first write,
/// so requests that never touch it pay for nothing but the lock.
///
/// The store is handed out as `Arc<ValueStore>` through `Context::values`, which is
/// why every access goes through the lock.
///
#[derive(Default)]
pub struct ValueStore {
    inner: RwLock<Option<FnvHashMap<String, Value>>>,
}

impl ValueStore {
    pub fn new() -> ValueStore {
        ValueStore::default()
    }

    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.set_value(key, Arc::new(value));
    }

    pub fn set_value(&self, key: impl Into<String>, value: Value) {
        self.inner
            .write()
            .get_or_insert_with(FnvHashMap::default)
            .insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner
            .read()
            .as_ref()
            .and_then(|map| map.get(key).cloned())
    }

    pub fn get_as<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        self.get(key).and_then(|value| value.downcast::<V>().ok())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().as_mut().and_then(|map| map.remove(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .read()
            .as_ref()
            .map_or(false, |map| map.contains_key(key))
    }

    pub fn len(&self) -> usize {
        self.inner.read().as_ref().map_or(0, |map| map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry but keeps the allocated map around for the next request.
    pub fn clear(&self) {
        if let Some(map) = self.inner.write().as_mut() {
            map.clear();
        }
    }
}
