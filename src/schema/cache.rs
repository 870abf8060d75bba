use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::core::{Schema, ToSchema};

/// Concurrent memo of synthesized schemas keyed by shape identity.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct SchemaCache {
    entries: Arc<DashMap<TypeId, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for `T`, synthesizing it on first use.
    pub fn get_or_insert<T: ToSchema + ?Sized + 'static>(&self) -> Arc<Schema> {
        let key = TypeId::of::<T>();
        if let Some(hit) = self.entries.get(&key) {
            return Arc::clone(hit.value());
        }
        let schema = Arc::new(T::schema());
        debug!(
            schema_name = T::schema_name().unwrap_or("<inline>"),
            "Schema synthesized"
        );
        Arc::clone(self.entries.entry(key).or_insert(schema).value())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_shape_is_shared() {
        let cache = SchemaCache::new();
        let first = cache.get_or_insert::<Vec<String>>();
        let second = cache.get_or_insert::<Vec<String>>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.get_or_insert::<bool>();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = SchemaCache::new();
        let other = cache.clone();
        let a = cache.get_or_insert::<i64>();
        let b = other.get_or_insert::<i64>();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
