// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader chains and the module host
//!
//! A [`LoaderChain`] holds the loader that the runtime's `require()` entry
//! point currently calls. Hooks install themselves on top of whatever is active
//! and keep the previous loader as their delegate, which turns successive
//! installs into a LIFO stack of decorators.

use crate::error::Result;
use crate::module_system::cache::ModuleCache;
use crate::module_system::package::{NodeModulesLocator, PackageLocator};
use crate::module_system::resolver::{EntryPointResolver, NodeResolver, Resolver};
use parking_lot::RwLock;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

/// A module load function: `require(specifier)` issued from `parent`
pub trait Load<V>: Send + Sync {
    /// Load a module and return its exports
    fn load(&self, specifier: &str, parent: &Path) -> Result<V>;
}

/// The runtime's built-in-only entry point (`process.getBuiltinModule`)
pub trait LoadBuiltin<V>: Send + Sync {
    /// Return the exports of a built-in module, or `None` for anything else
    fn get_builtin_module(&self, id: &str) -> Option<V>;
}

/// [`Load`] implementation backed by a closure
pub struct FnLoader<F, V> {
    f: F,
    _value: PhantomData<fn() -> V>,
}

impl<F, V> Load<V> for FnLoader<F, V>
where
    F: Fn(&str, &Path) -> Result<V> + Send + Sync,
{
    fn load(&self, specifier: &str, parent: &Path) -> Result<V> {
        (self.f)(specifier, parent)
    }
}

/// Wrap a closure as a loader that can be installed on a [`LoaderChain`]
pub fn loader_fn<V, F>(f: F) -> Arc<dyn Load<V>>
where
    V: 'static,
    F: Fn(&str, &Path) -> Result<V> + Send + Sync + 'static,
{
    Arc::new(FnLoader {
        f,
        _value: PhantomData,
    })
}

/// The currently active loader of one runtime entry point
pub struct LoaderChain<T: ?Sized> {
    active: RwLock<Arc<T>>,
}

impl<T: ?Sized> LoaderChain<T> {
    /// Create a chain whose only loader is `base`
    pub fn new(base: Arc<T>) -> Self {
        Self {
            active: RwLock::new(base),
        }
    }

    /// The loader the entry point calls right now.
    ///
    /// The lock is released before the caller uses the loader, so loads may
    /// re-enter the chain.
    pub fn current(&self) -> Arc<T> {
        self.active.read().clone()
    }

    /// Make `loader` the active loader and return the one it replaces
    pub fn install(&self, loader: Arc<T>) -> Arc<T> {
        self.install_with(|previous| (loader, previous))
    }

    /// Build the next loader from the active one and install it atomically.
    ///
    /// `build` runs under the write lock, so two concurrent installs never
    /// wrap the same loader. It must not touch this chain.
    pub fn install_with<R>(&self, build: impl FnOnce(Arc<T>) -> (Arc<T>, R)) -> R {
        let mut active = self.active.write();
        let (next, out) = build(active.clone());
        *active = next;
        out
    }

    /// Put `previous` back, but only if `expected` is still the active loader.
    ///
    /// Returns `false` when someone installed on top of `expected` since.
    pub fn restore(&self, expected: &Arc<T>, previous: Arc<T>) -> bool {
        let mut active = self.active.write();
        if Arc::ptr_eq(&*active, expected) {
            *active = previous;
            true
        } else {
            false
        }
    }

    /// Whether `loader` is the active loader
    pub fn is_active(&self, loader: &Arc<T>) -> bool {
        Arc::ptr_eq(&*self.active.read(), loader)
    }
}

impl<T: ?Sized> fmt::Debug for LoaderChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderChain").finish_non_exhaustive()
    }
}

/// Everything a hook needs from the runtime it is installed into
pub struct ModuleHost<V> {
    /// `None` means the runtime exposes no resolution primitive and cannot be hooked
    resolver: Option<Arc<dyn Resolver>>,
    packages: Arc<dyn PackageLocator>,
    entry_points: Arc<dyn EntryPointResolver>,
    cache: Arc<ModuleCache<V>>,
    require: LoaderChain<dyn Load<V>>,
    builtin: Option<LoaderChain<dyn LoadBuiltin<V>>>,
}

impl<V: Clone + Send + Sync + 'static> ModuleHost<V> {
    /// Start building a host around the runtime's own loader
    pub fn builder(loader: Arc<dyn Load<V>>) -> ModuleHostBuilder<V> {
        ModuleHostBuilder {
            loader,
            resolver: None,
            packages: None,
            entry_points: None,
            builtin: None,
            cache: None,
        }
    }

    /// Host using the Node.js resolution algorithm for every collaborator
    pub fn node(loader: Arc<dyn Load<V>>) -> Arc<Self> {
        let resolver = Arc::new(NodeResolver::new());
        Self::builder(loader)
            .resolver(resolver.clone())
            .entry_points(resolver)
            .build()
    }

    /// `require(specifier)` from `parent`, through every installed hook
    pub fn require(&self, specifier: &str, parent: &Path) -> Result<V> {
        self.require.current().load(specifier, parent)
    }

    /// `getBuiltinModule(id)`, through every installed hook.
    ///
    /// Always `None` when the runtime has no built-in entry point.
    pub fn get_builtin_module(&self, id: &str) -> Option<V> {
        self.builtin
            .as_ref()
            .and_then(|chain| chain.current().get_builtin_module(id))
    }

    /// The chain behind [`ModuleHost::require`]
    pub fn require_chain(&self) -> &LoaderChain<dyn Load<V>> {
        &self.require
    }

    /// The chain behind [`ModuleHost::get_builtin_module`], if the runtime has one
    pub fn builtin_chain(&self) -> Option<&LoaderChain<dyn LoadBuiltin<V>>> {
        self.builtin.as_ref()
    }

    /// The runtime-wide module cache
    pub fn cache(&self) -> &Arc<ModuleCache<V>> {
        &self.cache
    }

    /// The identifier resolver, if the runtime exposes one
    pub fn resolver(&self) -> Option<&Arc<dyn Resolver>> {
        self.resolver.as_ref()
    }

    /// The package locator
    pub fn package_locator(&self) -> &Arc<dyn PackageLocator> {
        &self.packages
    }

    /// The package main-entry resolver
    pub fn entry_points(&self) -> &Arc<dyn EntryPointResolver> {
        &self.entry_points
    }
}

/// Builder for [`ModuleHost`]
pub struct ModuleHostBuilder<V> {
    loader: Arc<dyn Load<V>>,
    resolver: Option<Arc<dyn Resolver>>,
    packages: Option<Arc<dyn PackageLocator>>,
    entry_points: Option<Arc<dyn EntryPointResolver>>,
    builtin: Option<Arc<dyn LoadBuiltin<V>>>,
    cache: Option<Arc<ModuleCache<V>>>,
}

impl<V: Clone + Send + Sync + 'static> ModuleHostBuilder<V> {
    /// Identifier resolver and built-in predicate
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Package locator (defaults to [`NodeModulesLocator`])
    pub fn package_locator(mut self, packages: Arc<dyn PackageLocator>) -> Self {
        self.packages = Some(packages);
        self
    }

    /// Main-entry resolver (defaults to [`NodeResolver`])
    pub fn entry_points(mut self, entry_points: Arc<dyn EntryPointResolver>) -> Self {
        self.entry_points = Some(entry_points);
        self
    }

    /// The runtime's built-in-only entry point
    pub fn builtin_loader(mut self, loader: Arc<dyn LoadBuiltin<V>>) -> Self {
        self.builtin = Some(loader);
        self
    }

    /// Share an existing module cache with the runtime's loader
    pub fn cache(mut self, cache: Arc<ModuleCache<V>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Finish the host
    pub fn build(self) -> Arc<ModuleHost<V>> {
        Arc::new(ModuleHost {
            resolver: self.resolver,
            packages: self.packages.unwrap_or_else(|| Arc::new(NodeModulesLocator)),
            entry_points: self
                .entry_points
                .unwrap_or_else(|| Arc::new(NodeResolver::new())),
            cache: self.cache.unwrap_or_default(),
            require: LoaderChain::new(self.loader),
            builtin: self.builtin.map(LoaderChain::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;

    fn constant(value: u32) -> Arc<dyn Load<u32>> {
        loader_fn(move |_: &str, _: &Path| Ok(value))
    }

    #[test]
    fn test_install_is_lifo() {
        let base = constant(0);
        let chain = LoaderChain::new(base.clone());
        let first = constant(1);
        let second = constant(2);

        assert!(Arc::ptr_eq(&chain.install(first.clone()), &base));
        assert!(Arc::ptr_eq(&chain.install(second.clone()), &first));
        assert_eq!(chain.current().load("x", Path::new("/")).unwrap(), 2);

        assert!(chain.restore(&second, first.clone()));
        assert!(chain.restore(&first, base.clone()));
        assert!(chain.is_active(&base));
    }

    #[test]
    fn test_restore_refuses_when_not_outermost() {
        let base = constant(0);
        let chain = LoaderChain::new(base.clone());
        let first = constant(1);
        let second = constant(2);
        chain.install(first.clone());
        chain.install(second.clone());

        assert!(!chain.restore(&first, base));
        assert!(chain.is_active(&second));
    }

    #[test]
    fn test_install_with_wraps_active_loader() {
        let chain: LoaderChain<dyn Load<u32>> = LoaderChain::new(constant(1));

        let doubled = chain.install_with(|previous| {
            let next = loader_fn(move |spec: &str, parent: &Path| {
                Ok(previous.load(spec, parent)? * 2)
            });
            (next.clone(), next)
        });

        assert!(chain.is_active(&doubled));
        assert_eq!(chain.current().load("x", Path::new("/")).unwrap(), 2);
    }

    #[test]
    fn test_concurrent_installs_keep_every_loader() {
        let chain: LoaderChain<dyn Load<u32>> = LoaderChain::new(constant(0));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    chain.install_with(|previous| {
                        let next = loader_fn(move |spec: &str, parent: &Path| {
                            Ok(previous.load(spec, parent)? + 1)
                        });
                        (next, ())
                    })
                });
            }
        });

        assert_eq!(chain.current().load("x", Path::new("/")).unwrap(), 8);
    }

    #[test]
    fn test_host_entry_points() {
        let loader = loader_fn(|specifier: &str, _: &Path| {
            if specifier == "answer" {
                Ok(42u32)
            } else {
                Err(HookError::module_not_found(specifier))
            }
        });
        let host = ModuleHost::node(loader);

        assert_eq!(host.require("answer", Path::new("/app/main.js")).unwrap(), 42);
        assert!(host.require("nope", Path::new("/app/main.js")).is_err());
        assert!(host.builtin_chain().is_none());
        assert_eq!(host.get_builtin_module("http"), None);
        assert!(host.resolver().is_some());
    }
}
