// The object map shared by every catalog kind: id-keyed with a by-name
// index, safe for concurrent readers.

use dashmap::DashMap;
use std::sync::Arc;

use crate::common::ObjectId;

use super::cache::ObjectCachePressure;
use super::object::CatalogObject;

pub struct ObjectMap<T: CatalogObject> {
    by_id: DashMap<ObjectId, Arc<T>>,
    by_name: DashMap<String, ObjectId>,
    pressure: Option<Arc<ObjectCachePressure>>,
}

impl<T: CatalogObject> ObjectMap<T> {
    pub fn new() -> ObjectMap<T> {
        ObjectMap {
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            pressure: None,
        }
    }

    /// Account entries against the given cache-pressure counter.
    pub fn with_pressure(pressure: Arc<ObjectCachePressure>) -> ObjectMap<T> {
        ObjectMap {
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            pressure: Some(pressure),
        }
    }

    pub fn insert(&self, value: Arc<T>) {
        self.by_name.insert(value.name().to_string(), value.id());
        if let Some(previous) = self.by_id.insert(value.id(), value) {
            drop(previous);
        } else if let Some(pressure) = &self.pressure {
            pressure.add(1);
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<Arc<T>> {
        self.by_id.get(&id).map(|entry| entry.clone())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<T>> {
        let id = *self.by_name.get(name)?;
        self.get(id)
    }

    pub fn erase(&self, id: ObjectId) -> Option<Arc<T>> {
        let (_, removed) = self.by_id.remove(&id)?;
        self.by_name.remove(removed.name());
        if let Some(pressure) = &self.pressure {
            pressure.sub(1);
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.by_id.iter().map(|entry| *entry.key()).collect()
    }

    pub fn clear(&self) {
        let count = self.by_id.len();
        self.by_id.clear();
        self.by_name.clear();
        if let Some(pressure) = &self.pressure {
            pressure.sub(count);
        }
    }
}

impl<T: CatalogObject> Default for ObjectMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
