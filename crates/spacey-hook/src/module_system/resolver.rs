// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (Node.js algorithm)

use crate::error::{HookError, Result};
use crate::module_system::identity::BUILTIN_PREFIX;
use crate::module_system::package::PackageJson;
use std::path::{Path, PathBuf};

/// Built-in modules reachable with or without the `node:` prefix
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "stream/promises",
    "string_decoder",
    "sys",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Built-in modules that only exist under the `node:` prefix
pub const PREFIX_ONLY_MODULES: &[&str] =
    &["node:sea", "node:sqlite", "node:test", "node:test/reporters"];

/// Resolves module specifiers to canonical file paths
pub trait Resolver: Send + Sync {
    /// Check if a specifier names a built-in module
    fn is_builtin(&self, name: &str) -> bool;

    /// Resolve a non-built-in specifier required from `parent`
    fn resolve_filename(&self, specifier: &str, parent: &Path) -> Result<PathBuf>;
}

/// Finds the main entry file of an installed package
pub trait EntryPointResolver: Send + Sync {
    /// Resolve `name` as a bare specifier starting from `basedir`
    fn resolve_entry_point(&self, name: &str, basedir: &Path) -> Result<PathBuf>;
}

/// Module resolver implementing Node.js resolution algorithm
#[derive(Debug, Clone)]
pub struct NodeResolver {
    /// File extensions to try
    extensions: Vec<String>,
}

impl NodeResolver {
    /// Create a new module resolver
    pub fn new() -> Self {
        Self {
            extensions: vec![".js".to_string(), ".json".to_string(), ".node".to_string()],
        }
    }

    /// Resolve a relative or absolute file specifier
    fn resolve_file(&self, specifier: &str, parent_dir: &Path) -> Result<PathBuf> {
        let path = parent_dir.join(specifier);
        self.resolve_as_file(&path)
            .or_else(|| self.resolve_directory(&path))
            .ok_or_else(|| HookError::module_not_found(specifier))
    }

    /// Try the exact path, then the path with each extension appended
    fn resolve_as_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(canonical(path));
        }
        self.extensions.iter().find_map(|ext| {
            let mut with_ext = path.as_os_str().to_os_string();
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            with_ext.is_file().then(|| canonical(&with_ext))
        })
    }

    /// Resolve a directory (package.json main, then index files)
    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }

        // A broken package.json falls through to the index files, as Node does
        if let Ok(Some(pkg)) = PackageJson::read_from_dir(dir) {
            if let Some(main) = pkg.main {
                let main_path = dir.join(&main);
                let found = self.resolve_as_file(&main_path).or_else(|| {
                    // `"main": "lib"` pointing at a directory
                    main_path.is_dir().then(|| self.resolve_index(&main_path)).flatten()
                });
                if found.is_some() {
                    return found;
                }
            }
        }

        self.resolve_index(dir)
    }

    fn resolve_index(&self, dir: &Path) -> Option<PathBuf> {
        self.extensions.iter().find_map(|ext| {
            let index = dir.join(format!("index{}", ext));
            index.is_file().then(|| canonical(&index))
        })
    }

    /// Resolve a package specifier by walking up `node_modules` directories
    fn resolve_node_modules(&self, specifier: &str, start_dir: &Path) -> Result<PathBuf> {
        let (package_name, subpath) = self.parse_package_specifier(specifier);

        let mut current = Some(start_dir);
        while let Some(dir) = current {
            // Never look for node_modules/node_modules/<pkg>
            if dir.file_name().is_some_and(|n| n == "node_modules") {
                current = dir.parent();
                continue;
            }

            let package_dir = dir.join("node_modules").join(package_name);
            if package_dir.is_dir() {
                if let Some(found) = self.resolve_in_package(&package_dir, subpath)? {
                    return Ok(found);
                }
            }

            current = dir.parent();
        }

        Err(HookError::module_not_found(specifier))
    }

    /// Resolve the main entry or a subpath inside one package directory
    fn resolve_in_package(
        &self,
        package_dir: &Path,
        subpath: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let pkg = PackageJson::read_from_dir(package_dir)?;

        if let Some(pkg) = pkg.as_ref().filter(|p| p.exports.is_some()) {
            let key = subpath.map_or_else(|| ".".to_string(), |s| format!("./{}", s));
            return match pkg.export_target(&key) {
                // an exported target that is missing ends the lookup
                Some(target) => {
                    let target = package_dir.join(target);
                    self.resolve_as_file(&target).map(Some).ok_or_else(|| {
                        HookError::module_not_found(target.display().to_string())
                    })
                }
                None => Err(HookError::ModuleResolution {
                    module: key,
                    reason: format!(
                        "subpath is not defined by \"exports\" in {}",
                        package_dir.join("package.json").display()
                    ),
                }),
            };
        }

        Ok(match subpath {
            Some(sub) => {
                let full = package_dir.join(sub);
                self.resolve_as_file(&full).or_else(|| self.resolve_directory(&full))
            }
            None => self.resolve_directory(package_dir),
        })
    }

    /// Parse a package specifier into name and optional subpath
    fn parse_package_specifier<'a>(&self, specifier: &'a str) -> (&'a str, Option<&'a str>) {
        if specifier.starts_with('@') {
            // Scoped package: @scope/name or @scope/name/subpath
            if let Some(slash_pos) = specifier[1..].find('/') {
                let after_scope = &specifier[slash_pos + 2..];
                if let Some(subpath_pos) = after_scope.find('/') {
                    let name_end = slash_pos + 2 + subpath_pos;
                    return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
                }
            }
            (specifier, None)
        } else if let Some(slash_pos) = specifier.find('/') {
            (&specifier[..slash_pos], Some(&specifier[slash_pos + 1..]))
        } else {
            (specifier, None)
        }
    }
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for NodeResolver {
    fn is_builtin(&self, name: &str) -> bool {
        if PREFIX_ONLY_MODULES.contains(&name) {
            return true;
        }
        let name = name.strip_prefix(BUILTIN_PREFIX).unwrap_or(name);
        BUILTIN_MODULES.contains(&name)
    }

    fn resolve_filename(&self, specifier: &str, parent: &Path) -> Result<PathBuf> {
        let parent_dir = parent.parent().unwrap_or(Path::new("."));

        if is_path_specifier(specifier) {
            return self.resolve_file(specifier, parent_dir);
        }

        self.resolve_node_modules(specifier, parent_dir)
    }
}

impl EntryPointResolver for NodeResolver {
    fn resolve_entry_point(&self, name: &str, basedir: &Path) -> Result<PathBuf> {
        self.resolve_node_modules(name, basedir)
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
