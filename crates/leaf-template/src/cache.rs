/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled-template caching.
//!
//! [`crate::Renderer`] asks its [`TemplateCache`] for every named template it
//! renders or embeds. [`MemoryCache`] compiles each name once, even when
//! several threads ask for it at the same time; [`NoCache`] compiles on
//! every request.

use crate::error::LeafResult;
use crate::parser::Template;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Store of compiled templates keyed by resolved name.
pub trait TemplateCache: Send + Sync {
    /// Return the cached template for `name`, compiling it with `compile`
    /// on a miss. Compile failures are returned and not cached.
    fn get_or_compile(
        &self,
        name: &str,
        compile: &dyn Fn() -> LeafResult<Template>,
    ) -> LeafResult<Arc<Template>>;
}

type Entry = Arc<OnceCell<Arc<Template>>>;

/// In-memory cache with compile-once semantics per name.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> Entry {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.entry(name.to_string()).or_default().clone()
    }

    /// Remove `cell` from the map if it is still the uninitialized entry for
    /// `name`, so failed lookups do not accumulate.
    fn discard_failed(&self, name: &str, cell: &Entry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = entries
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && current.get().is_none());
        if stale {
            entries.remove(name);
        }
    }

    /// Drop the compiled template for `name`; the next request recompiles it.
    pub fn invalidate(&self, name: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(name);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    /// Whether a compiled template is stored for `name`.
    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).is_some_and(|cell| cell.get().is_some())
    }

    /// Number of compiled templates stored.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TemplateCache for MemoryCache {
    fn get_or_compile(
        &self,
        name: &str,
        compile: &dyn Fn() -> LeafResult<Template>,
    ) -> LeafResult<Arc<Template>> {
        // The map lock is released before compiling so that other names are
        // not blocked; the per-name cell serializes compiles of this name.
        let cell = self.entry(name);
        let mut compiled = false;
        let template = match cell.get_or_try_init(|| {
            compiled = true;
            compile().map(Arc::new)
        }) {
            Ok(template) => template,
            Err(err) => {
                self.discard_failed(name, &cell);
                return Err(err);
            }
        };
        if compiled {
            tracing::debug!(template = %name, "cache miss; compiled template");
        } else {
            tracing::trace!(template = %name, "cache hit");
        }
        Ok(Arc::clone(template))
    }
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl TemplateCache for NoCache {
    fn get_or_compile(
        &self,
        _name: &str,
        compile: &dyn Fn() -> LeafResult<Template>,
    ) -> LeafResult<Arc<Template>> {
        compile().map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LeafError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_compile<'a>(
        counter: &'a AtomicUsize,
        source: &'a str,
    ) -> impl Fn() -> LeafResult<Template> + 'a {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Template::compile(source)
        }
    }

    #[test]
    fn test_memory_cache_compiles_once() {
        let cache = MemoryCache::new();
        let counter = AtomicUsize::new(0);
        let compile = counting_compile(&counter, "Hello #(name)");

        let first = cache.get_or_compile("greeting.leaf", &compile).unwrap();
        let second = cache.get_or_compile("greeting.leaf", &compile).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.contains("greeting.leaf"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_memory_cache_does_not_cache_failures() {
        let cache = MemoryCache::new();
        let counter = AtomicUsize::new(0);
        let broken = counting_compile(&counter, "#if() {}");

        assert!(cache.get_or_compile("broken.leaf", &broken).is_err());
        assert!(cache.get_or_compile("broken.leaf", &broken).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!cache.contains("broken.leaf"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_memory_cache_drops_failed_entries() {
        let cache = MemoryCache::new();
        let missing = |name: String| {
            move || -> LeafResult<Template> {
                Err(LeafError::TemplateNotFound { name: name.clone() })
            }
        };

        for i in 0..100 {
            let name = format!("missing-{}.leaf", i);
            assert!(cache.get_or_compile(&name, &missing(name.clone())).is_err());
        }
        let counter = AtomicUsize::new(0);
        cache
            .get_or_compile("ok.leaf", &counting_compile(&counter, "x"))
            .unwrap();

        let entries = cache.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("ok.leaf"));
    }

    #[test]
    fn test_memory_cache_invalidate_and_clear() {
        let cache = MemoryCache::new();
        let counter = AtomicUsize::new(0);
        let compile = counting_compile(&counter, "x");

        cache.get_or_compile("a.leaf", &compile).unwrap();
        cache.invalidate("a.leaf");
        cache.get_or_compile("a.leaf", &compile).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        cache.get_or_compile("b.leaf", &compile).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_cache_always_compiles() {
        let counter = AtomicUsize::new(0);
        let compile = counting_compile(&counter, "x");
        NoCache.get_or_compile("a.leaf", &compile).unwrap();
        NoCache.get_or_compile("a.leaf", &compile).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_error_passes_through() {
        let err = NoCache
            .get_or_compile("x.leaf", &|| Err(LeafError::TemplateNotFound { name: "x.leaf".into() }))
            .unwrap_err();
        assert!(matches!(err, LeafError::TemplateNotFound { .. }));
    }
}
