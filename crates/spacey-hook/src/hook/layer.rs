// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The interception layer and the handle returned to hook owners

use crate::config::{HookConfig, Modules};
use crate::error::Result;
use crate::hook::exports::ExportsCache;
use crate::hook::filter::{Decision, FilterMatcher};
use crate::hook::pending::ReentrancyTracker;
use crate::module_system::{
    EntryPointResolver, HookId, Load, LoadBuiltin, ModuleHost, ModuleIdentity, PackageLocator,
    Resolver,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// Transform applied to selected modules: `(exports, name, basedir) -> exports`.
///
/// It may mutate and return the exports it was given, or return an unrelated
/// replacement value. `basedir` is `None` for built-in modules.
///
/// Exports are cloned into the hook's cache before and after the transform
/// runs, so `V` should be a cheap shared handle such as an `Arc`.
pub type Transform<V> = dyn Fn(V, &str, Option<&Path>) -> V + Send + Sync;

/// One installed hook: a loader that decorates the loader below it
struct HookLayer<V> {
    id: HookId,
    disabled: AtomicBool,
    previous: Arc<dyn Load<V>>,
    previous_builtin: Option<Arc<dyn LoadBuiltin<V>>>,
    resolver: Arc<dyn Resolver>,
    packages: Arc<dyn PackageLocator>,
    entry_points: Arc<dyn EntryPointResolver>,
    filter: FilterMatcher,
    cache: ExportsCache<V>,
    pending: ReentrancyTracker,
    transform: Arc<Transform<V>>,
}

impl<V: Clone + Send + Sync + 'static> HookLayer<V> {
    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    fn builtin_identity(&self, id: &str) -> ModuleIdentity {
        ModuleIdentity::builtin(id, |name| self.resolver.is_builtin(name))
    }

    /// Run one load of `identity` through the cache, the delegate and the transform
    fn intercept<E>(
        &self,
        identity: ModuleIdentity,
        delegate: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E> {
        debug!(
            "processing {} module require: {}",
            if identity.is_builtin() { "core" } else { "non-core" },
            identity
        );

        // return known patched modules immediately
        if let Some(exports) = self.cache.get(&identity) {
            debug!("returning already patched cached module: {}", identity);
            return Ok(exports);
        }

        let pending = self.pending.begin(&identity);
        let exports = delegate()?;

        // a circular require of a module that is still loading gets the
        // partial exports; the outermost load patches the finished module
        if !pending.is_outermost() {
            debug!(
                "module is in the process of being patched already - ignoring: {}",
                identity
            );
            return Ok(exports);
        }
        drop(pending);

        let target = match self.filter.decide(&identity, &*self.packages, &*self.entry_points) {
            Decision::Ignore => return Ok(exports),
            Decision::Passthrough => {
                self.cache.set(&identity, exports.clone());
                return Ok(exports);
            }
            Decision::Intercept(target) => target,
        };

        // the transform may require this same module again
        self.cache.set(&identity, exports.clone());
        debug!("calling require hook: {}", target.name);
        let patched = (self.transform)(exports, &target.name, target.basedir.as_deref());
        self.cache.set(&identity, patched.clone());

        debug!("returning module: {}", target.name);
        Ok(patched)
    }
}

impl<V: Clone + Send + Sync + 'static> Load<V> for HookLayer<V> {
    fn load(&self, specifier: &str, parent: &Path) -> Result<V> {
        if self.is_disabled() {
            // someone installed on top of this hook, so it could not be
            // removed; pass everything on
            debug!("ignoring require call - module is soft-unhooked");
            return self.previous.load(specifier, parent);
        }

        let identity = if self.resolver.is_builtin(specifier) {
            self.builtin_identity(specifier)
        } else {
            match self.resolver.resolve_filename(specifier, parent) {
                Ok(filename) => ModuleIdentity::File(filename),
                Err(err) => {
                    // a loader further down may still serve this specifier
                    debug!(
                        "resolving '{}' failed ({}), calling previous loader",
                        specifier, err
                    );
                    return self.previous.load(specifier, parent);
                }
            }
        };

        self.intercept(identity, || self.previous.load(specifier, parent))
    }
}

impl<V: Clone + Send + Sync + 'static> LoadBuiltin<V> for HookLayer<V> {
    fn get_builtin_module(&self, id: &str) -> Option<V> {
        let previous = self.previous_builtin.as_ref()?;

        if self.is_disabled() {
            debug!("ignoring getBuiltinModule call - module is soft-unhooked");
            return previous.get_builtin_module(id);
        }

        if !self.resolver.is_builtin(id) {
            return previous.get_builtin_module(id);
        }

        self.intercept(self.builtin_identity(id), || {
            previous.get_builtin_module(id).ok_or(())
        })
        .ok()
    }
}

/// Handle to an installed hook.
///
/// Dropping the handle leaves the hook installed; call [`Hook::disable`] to
/// remove it.
pub struct Hook<V> {
    id: HookId,
    host: Arc<ModuleHost<V>>,
    /// `None` when the host could not be hooked
    layer: Option<Arc<HookLayer<V>>>,
}

impl<V: Clone + Send + Sync + 'static> Hook<V> {
    /// Install a hook on `host`.
    ///
    /// The hook wraps whatever loader is active on the host right now, so
    /// hooks created later see the exports produced by this one.
    pub fn new<F>(host: &Arc<ModuleHost<V>>, config: HookConfig, transform: F) -> Self
    where
        F: Fn(V, &str, Option<&Path>) -> V + Send + Sync + 'static,
    {
        let id = HookId::next();

        let Some(resolver) = host.resolver().cloned() else {
            error!("Expected the module host to provide a module resolver - aborting!");
            error!("{} will not intercept any module", id);
            return Self {
                id,
                host: host.clone(),
                layer: None,
            };
        };

        debug!("registering require hook {}", id);

        // both chains are locked (require first) while the layer is built, so
        // concurrent installs stack instead of wrapping the same delegates
        let layer = host.require_chain().install_with(|previous| {
            let build = |previous_builtin: Option<Arc<dyn LoadBuiltin<V>>>| {
                Arc::new(HookLayer {
                    id,
                    disabled: AtomicBool::new(false),
                    previous,
                    previous_builtin,
                    resolver,
                    packages: host.package_locator().clone(),
                    entry_points: host.entry_points().clone(),
                    filter: FilterMatcher::new(config.modules, config.internals),
                    cache: ExportsCache::new(id, host.cache().clone()),
                    pending: ReentrancyTracker::new(),
                    transform: Arc::new(transform),
                })
            };

            let layer = match host.builtin_chain() {
                Some(chain) => chain.install_with(|previous_builtin| {
                    let layer = build(Some(previous_builtin));
                    (layer.clone() as Arc<dyn LoadBuiltin<V>>, layer)
                }),
                None => build(None),
            };
            (layer.clone() as Arc<dyn Load<V>>, layer)
        });

        Self {
            id,
            host: host.clone(),
            layer: Some(layer),
        }
    }

    /// Install a hook that sees every module
    pub fn all<F>(host: &Arc<ModuleHost<V>>, transform: F) -> Self
    where
        F: Fn(V, &str, Option<&Path>) -> V + Send + Sync + 'static,
    {
        Self::new(host, HookConfig::all(), transform)
    }

    /// Start configuring a hook on `host`
    pub fn builder(host: &Arc<ModuleHost<V>>) -> HookBuilder<V> {
        HookBuilder {
            host: host.clone(),
            config: HookConfig::default(),
        }
    }

    /// Stop intercepting. Safe to call any number of times.
    ///
    /// If another loader was installed on top of this hook since, the hook
    /// cannot be taken out of the chain; it becomes a permanent passthrough
    /// instead.
    pub fn disable(&self) {
        let Some(layer) = &self.layer else {
            return;
        };
        layer.disabled.store(true, Ordering::Release);

        let as_loader: Arc<dyn Load<V>> = layer.clone();
        if self
            .host
            .require_chain()
            .restore(&as_loader, layer.previous.clone())
        {
            debug!("unhook successful: {}", layer.id);
        } else {
            debug!("unhook unsuccessful: {}", layer.id);
        }

        if let (Some(chain), Some(previous)) =
            (self.host.builtin_chain(), layer.previous_builtin.as_ref())
        {
            let as_builtin: Arc<dyn LoadBuiltin<V>> = layer.clone();
            chain.restore(&as_builtin, previous.clone());
        }
    }

    /// Process-unique id of this hook
    pub fn id(&self) -> HookId {
        self.id
    }

    /// Whether the hook was installed on its host at construction
    pub fn is_installed(&self) -> bool {
        self.layer.is_some()
    }

    /// Whether [`Hook::disable`] has been called
    pub fn is_disabled(&self) -> bool {
        self.layer.as_ref().is_none_or(|layer| layer.is_disabled())
    }
}

/// Builder for [`Hook`]
pub struct HookBuilder<V> {
    host: Arc<ModuleHost<V>>,
    config: HookConfig,
}

impl<V: Clone + Send + Sync + 'static> HookBuilder<V> {
    /// Only act on `names`: built-in names, package names, package subpaths
    /// or absolute file paths
    pub fn modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.modules = Modules::only(names);
        self
    }

    /// Also act on files inside selected packages other than the main entry
    pub fn internals(mut self, internals: bool) -> Self {
        self.config.internals = internals;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: HookConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the hook
    pub fn install<F>(self, transform: F) -> Hook<V>
    where
        F: Fn(V, &str, Option<&Path>) -> V + Send + Sync + 'static,
    {
        Hook::new(&self.host, self.config, transform)
    }
}
