//! Code → projection cache.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Projection;

#[derive(Clone, Debug, Default)]
pub struct ProjectionRegistry {
    cache: HashMap<String, Arc<Projection>>,
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created empty on first use.
    pub fn global() -> &'static RwLock<ProjectionRegistry> {
        static GLOBAL: OnceLock<RwLock<ProjectionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(ProjectionRegistry::new()))
    }

    pub fn read_global() -> RwLockReadGuard<'static, ProjectionRegistry> {
        Self::global()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_global() -> RwLockWriteGuard<'static, ProjectionRegistry> {
        Self::global()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Cache `projection` under its code, replacing any previous entry.
    pub fn add(&mut self, projection: Projection) -> Arc<Projection> {
        let projection = Arc::new(projection);
        self.add_shared(Arc::clone(&projection));
        projection
    }

    /// Cache an already shared projection under its code.
    pub fn add_shared(&mut self, projection: Arc<Projection>) {
        self.cache.insert(projection.code().to_string(), projection);
    }

    pub fn get(&self, code: &str) -> Option<Arc<Projection>> {
        self.cache.get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj::Units;

    #[test]
    fn test_add_and_get() {
        let mut registry = ProjectionRegistry::new();
        let added = registry.add(Projection::new("EPSG:9999", Units::Meters));
        let got = registry.get("EPSG:9999").unwrap();
        assert!(Arc::ptr_eq(&added, &got));
        assert!(registry.get("EPSG:1").is_none());
    }

    #[test]
    fn test_clear() {
        let mut registry = ProjectionRegistry::new();
        registry.add(Projection::new("EPSG:9999", Units::Meters));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get("EPSG:9999").is_none());
    }
}
