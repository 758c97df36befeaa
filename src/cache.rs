//! Compiled-template cache.

use crate::compiler::CompiledTemplate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Path-keyed store of compiled templates. The engine consults it only
/// in production mode; development renders recompile on every call so
/// template edits show up immediately.
///
/// Compilation is pure, so a lost race between two writers of the same
/// key is harmless: both values are equivalent.
#[derive(Clone, Default)]
pub struct TemplateCache {
    entries: Arc<RwLock<HashMap<String, Arc<CompiledTemplate>>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CompiledTemplate>> {
        match self.entries.read() {
            Ok(map) => map.get(key).cloned(),
            Err(_) => None,
        }
    }

    pub fn put(&self, key: &str, compiled: Arc<CompiledTemplate>) {
        if let Ok(mut map) = self.entries.write() {
            log::trace!("caching compiled template for {}", key);
            map.insert(key.to_string(), compiled);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.entries.write() {
            map.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    #[test]
    fn get_put_and_clear() {
        let cache = TemplateCache::new();
        assert!(cache.get("a").is_none());
        let compiled = Arc::new(compile("<p>x</p>").unwrap());
        cache.put("a", Arc::clone(&compiled));
        assert!(cache.get("a").is_some());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let cache = TemplateCache::new();
        let other = cache.clone();
        cache.put("k", Arc::new(compile("x").unwrap()));
        assert!(other.get("k").is_some());
    }
}
