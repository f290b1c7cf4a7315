// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module cache for require()
//!
//! This is the runtime-wide `require.cache`. Besides the module's own exports,
//! every entry carries one patched-exports slot per hook, so removing an entry
//! invalidates every hook's view of that module at once.

use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier of an installed hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl HookId {
    /// Allocate the next id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Cached module entry
#[derive(Debug, Clone)]
pub struct CachedModule<V> {
    /// The module's exports
    pub exports: V,
    /// The module's filename
    pub filename: PathBuf,
    /// Whether the module has finished loading
    pub loaded: bool,
    /// Parent module that required this one
    pub parent: Option<PathBuf>,
    /// Exports as returned by each hook that intercepted this module
    pub patched: HashMap<HookId, V>,
}

impl<V> CachedModule<V> {
    /// Create an entry for a module that is about to be evaluated
    pub fn new(filename: PathBuf, exports: V, parent: Option<PathBuf>) -> Self {
        Self {
            exports,
            filename,
            loaded: false,
            parent,
            patched: HashMap::new(),
        }
    }
}

/// Thread-safe module cache
pub struct ModuleCache<V> {
    /// Cache mapping absolute paths to cached modules
    cache: DashMap<PathBuf, CachedModule<V>>,
}

impl<V: Clone> ModuleCache<V> {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a cached module by path
    pub fn get(&self, path: &Path) -> Option<CachedModule<V>> {
        self.cache.get(path).map(|entry| entry.clone())
    }

    /// Get only the exports of a cached module
    pub fn exports(&self, path: &Path) -> Option<V> {
        self.cache.get(path).map(|entry| entry.exports.clone())
    }

    /// Check if a module is cached
    pub fn has(&self, path: &Path) -> bool {
        self.cache.contains_key(path)
    }

    /// Add a module to the cache, replacing any previous entry
    pub fn insert(&self, path: PathBuf, module: CachedModule<V>) {
        self.cache.insert(path, module);
    }

    /// Replace the exports of a cached module (`module.exports = ...`)
    pub fn set_exports(&self, path: &Path, exports: V) -> bool {
        match self.cache.get_mut(path) {
            Some(mut entry) => {
                entry.exports = exports;
                true
            }
            None => false,
        }
    }

    /// Mark a cached module as fully evaluated
    pub fn mark_loaded(&self, path: &Path) {
        if let Some(mut entry) = self.cache.get_mut(path) {
            entry.loaded = true;
        }
    }

    /// Remove a module from the cache, forcing the next require to reload it
    pub fn delete(&self, path: &Path) -> Option<CachedModule<V>> {
        self.cache.remove(path).map(|(_, v)| v)
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get all cached module paths
    pub fn keys(&self) -> Vec<PathBuf> {
        self.cache.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Whether `hook` has stored exports on the entry for `path`
    pub fn has_patched(&self, path: &Path, hook: HookId) -> bool {
        self.cache
            .get(path)
            .is_some_and(|entry| entry.patched.contains_key(&hook))
    }

    /// Exports stored by `hook` on the entry for `path`
    pub fn patched(&self, path: &Path, hook: HookId) -> Option<V> {
        self.cache
            .get(path)
            .and_then(|entry| entry.patched.get(&hook).cloned())
    }

    /// Store exports for `hook` on the entry for `path`.
    ///
    /// Returns `false` when the runtime has no entry for `path`.
    pub fn set_patched(&self, path: &Path, hook: HookId, exports: V) -> bool {
        match self.cache.get_mut(path) {
            Some(mut entry) => {
                entry.patched.insert(hook, exports);
                true
            }
            None => false,
        }
    }

    /// Drop the exports stored by `hook` on the entry for `path`
    pub fn remove_patched(&self, path: &Path, hook: HookId) -> Option<V> {
        self.cache
            .get_mut(path)
            .and_then(|mut entry| entry.patched.remove(&hook))
    }
}

impl<V: Clone> Default for ModuleCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
