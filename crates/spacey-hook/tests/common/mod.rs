// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A small CommonJS runtime for exercising hooks.
//!
//! Files live in a temporary directory so the real resolver and package
//! lookup run against them; what a file "does" when evaluated is a Rust
//! closure registered for its path.

#![allow(dead_code)]

use dashmap::DashMap;
use parking_lot::Mutex;
use spacey_hook::module_system::{
    CachedModule, Load, LoadBuiltin, ModuleCache, ModuleHost, Resolver,
};
use spacey_hook::{HookError, NodeResolver, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once, OnceLock, Weak};
use tempfile::TempDir;

/// Install a log subscriber once, honouring RUST_LOG
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A mutable exports object shared by reference, like a JS object
#[derive(Clone, Default)]
pub struct Exports(Arc<Mutex<BTreeMap<String, String>>>);

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.0.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.0.lock().insert(key.to_string(), value.to_string());
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.lock().keys().cloned().collect()
    }

    /// Reference identity, like `===` on objects
    pub fn same(&self, other: &Exports) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.lock().iter()).finish()
    }
}

/// What evaluating a module file does
pub type Body = Arc<dyn Fn(&Module) -> Result<()> + Send + Sync>;

/// The `module` object handed to a module body
pub struct Module {
    pub exports: Exports,
    pub filename: PathBuf,
    host: Arc<ModuleHost<Exports>>,
    cache: Arc<ModuleCache<Exports>>,
}

impl Module {
    /// `require()` from inside this module
    pub fn require(&self, specifier: &str) -> Result<Exports> {
        self.host.require(specifier, &self.filename)
    }

    /// `module.exports = value`
    pub fn set_exports(&self, exports: Exports) {
        self.cache.set_exports(&self.filename, exports);
    }
}

struct RuntimeState {
    resolver: NodeResolver,
    bodies: DashMap<PathBuf, Body>,
    builtins: DashMap<String, Exports>,
    cache: Arc<ModuleCache<Exports>>,
    host: OnceLock<Weak<ModuleHost<Exports>>>,
    evaluations: DashMap<PathBuf, usize>,
    builtin_loads: AtomicUsize,
}

impl RuntimeState {
    fn builtin(&self, id: &str) -> Exports {
        let name = match id.strip_prefix("node:") {
            Some(bare) if self.resolver.is_builtin(bare) => bare,
            _ => id,
        };
        self.builtin_loads.fetch_add(1, Ordering::SeqCst);
        self.builtins
            .entry(name.to_string())
            .or_insert_with(|| Exports::new().with("builtin", name))
            .clone()
    }

    fn host(&self) -> Result<Arc<ModuleHost<Exports>>> {
        self.host
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| HookError::Generic("runtime was torn down".to_string()))
    }
}

/// The runtime's own loader, at the bottom of every chain
struct BaseLoader(Arc<RuntimeState>);

impl Load<Exports> for BaseLoader {
    fn load(&self, specifier: &str, parent: &Path) -> Result<Exports> {
        let state = &self.0;
        if state.resolver.is_builtin(specifier) {
            return Ok(state.builtin(specifier));
        }

        let filename = state.resolver.resolve_filename(specifier, parent)?;
        if let Some(exports) = state.cache.exports(&filename) {
            // finished, or still loading in a cycle
            return Ok(exports);
        }

        let exports = Exports::new();
        state.cache.insert(
            filename.clone(),
            CachedModule::new(filename.clone(), exports.clone(), Some(parent.to_path_buf())),
        );
        *state.evaluations.entry(filename.clone()).or_insert(0) += 1;

        let body = state.bodies.get(&filename).map(|b| b.value().clone());
        if let Some(body) = body {
            let module = Module {
                exports: exports.clone(),
                filename: filename.clone(),
                host: state.host()?,
                cache: state.cache.clone(),
            };
            if let Err(err) = body(&module) {
                state.cache.delete(&filename);
                return Err(err);
            }
        }

        state.cache.mark_loaded(&filename);
        Ok(state.cache.exports(&filename).unwrap_or(exports))
    }
}

impl LoadBuiltin<Exports> for BaseLoader {
    fn get_builtin_module(&self, id: &str) -> Option<Exports> {
        self.0
            .resolver
            .is_builtin(id)
            .then(|| self.0.builtin(id))
    }
}

/// A runtime rooted in a fresh temporary directory
pub struct TestRuntime {
    _dir: TempDir,
    pub root: PathBuf,
    pub host: Arc<ModuleHost<Exports>>,
    state: Arc<RuntimeState>,
}

impl TestRuntime {
    pub fn new() -> Self {
        init_tracing();

        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().canonicalize().expect("canonical temp dir");
        let cache = Arc::new(ModuleCache::new());
        let state = Arc::new(RuntimeState {
            resolver: NodeResolver::new(),
            bodies: DashMap::new(),
            builtins: DashMap::new(),
            cache: cache.clone(),
            host: OnceLock::new(),
            evaluations: DashMap::new(),
            builtin_loads: AtomicUsize::new(0),
        });

        let loader = Arc::new(BaseLoader(state.clone()));
        let resolver = Arc::new(NodeResolver::new());
        let host = ModuleHost::builder(loader.clone())
            .resolver(resolver.clone())
            .entry_points(resolver)
            .builtin_loader(loader)
            .cache(cache)
            .build();
        let _ = state.host.set(Arc::downgrade(&host));

        Self {
            _dir: dir,
            root,
            host,
            state,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write a file, creating parent directories
    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(&path, contents).expect("write fixture file");
        path.canonicalize().expect("canonical fixture path")
    }

    /// Write `node_modules/<name>/package.json`
    pub fn package(&self, name: &str, main: Option<&str>) {
        let json = match main {
            Some(main) => format!(r#"{{ "name": "{}", "main": "{}" }}"#, name, main),
            None => format!(r#"{{ "name": "{}" }}"#, name),
        };
        self.file(&format!("node_modules/{}/package.json", name), &json);
    }

    /// Create a module file whose evaluation runs `body`
    pub fn module<F>(&self, rel: &str, body: F) -> PathBuf
    where
        F: Fn(&Module) -> Result<()> + Send + Sync + 'static,
    {
        let path = self.file(rel, "");
        self.state.bodies.insert(path.clone(), Arc::new(body));
        path
    }

    /// Create a module file that exports `{ id: <rel> }`
    pub fn leaf(&self, rel: &str) -> PathBuf {
        let id = rel.to_string();
        self.module(rel, move |m| {
            m.exports.set("id", &id);
            Ok(())
        })
    }

    /// `require()` from a script at the root of the runtime directory
    pub fn require(&self, specifier: &str) -> Result<Exports> {
        self.host.require(specifier, &self.path("main.js"))
    }

    /// How many times the runtime evaluated the file at `rel`
    pub fn evaluations(&self, rel: &str) -> usize {
        let path = self.path(rel).canonicalize().unwrap_or_else(|_| self.path(rel));
        self.state.evaluations.get(&path).map(|n| *n.value()).unwrap_or(0)
    }

    /// How many built-in loads reached the runtime's own loader
    pub fn builtin_loads(&self) -> usize {
        self.state.builtin_loads.load(Ordering::SeqCst)
    }
}

/// Counts transform invocations across clones
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn record(&self, name: &str) {
        self.0.lock().push(name.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().len()
    }
}
