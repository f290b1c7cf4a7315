// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-hook cache of patched exports
//!
//! Built-in exports live in a map owned by the hook. Exports of file modules
//! live on the runtime's [`ModuleCache`] entry for that file, so deleting the
//! entry from the module cache makes the next require reload the file and run
//! the hook again. When the runtime has no entry for a file (some loaders swap
//! the module cache out) the hook-local map is used instead.

use crate::module_system::{HookId, ModuleCache, ModuleIdentity};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Exports patched by one hook, keyed by module identity
pub struct ExportsCache<V> {
    hook: HookId,
    local: DashMap<ModuleIdentity, V>,
    modules: Arc<ModuleCache<V>>,
}

impl<V: Clone> ExportsCache<V> {
    /// Cache for `hook`, storing file exports on `modules`
    pub fn new(hook: HookId, modules: Arc<ModuleCache<V>>) -> Self {
        Self {
            hook,
            local: DashMap::new(),
            modules,
        }
    }

    /// Whether exports for `identity` are cached
    pub fn has(&self, identity: &ModuleIdentity) -> bool {
        if self.local.contains_key(identity) {
            return true;
        }
        match identity {
            ModuleIdentity::File(path) => self.modules.has_patched(path, self.hook),
            ModuleIdentity::Builtin(_) => false,
        }
    }

    /// Cached exports for `identity`
    pub fn get(&self, identity: &ModuleIdentity) -> Option<V> {
        if let Some(exports) = self.local.get(identity) {
            return Some(exports.clone());
        }
        match identity {
            ModuleIdentity::File(path) => self.modules.patched(path, self.hook),
            ModuleIdentity::Builtin(_) => None,
        }
    }

    /// Store exports for `identity`, overwriting any previous value
    pub fn set(&self, identity: &ModuleIdentity, exports: V) {
        match identity {
            ModuleIdentity::Builtin(_) => {
                self.local.insert(identity.clone(), exports);
            }
            ModuleIdentity::File(path) => {
                if !self.modules.set_patched(path, self.hook, exports.clone()) {
                    debug!(
                        "non-core module is unexpectedly not in the module cache: {}",
                        path.display()
                    );
                    self.local.insert(identity.clone(), exports);
                }
            }
        }
    }

    /// Forget the exports for `identity`, starting a new generation
    pub fn delete(&self, identity: &ModuleIdentity) -> Option<V> {
        let local = self.local.remove(identity).map(|(_, v)| v);
        let shared = match identity {
            ModuleIdentity::File(path) => self.modules.remove_patched(path, self.hook),
            ModuleIdentity::Builtin(_) => None,
        };
        local.or(shared)
    }
}
