// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Deciding whether a loaded module is handed to the hook's transform

use crate::config::Modules;
use crate::module_system::{full_module_name, EntryPointResolver, ModuleIdentity, PackageLocator};
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};
use tracing::debug;

/// Name and base directory passed to the transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Display name (`http`, `express`, `express/lib/router`, `pkg/lib/a.js`)
    pub name: String,
    /// Package root, or the directory of an absolute-path match. `None` for built-ins.
    pub basedir: Option<PathBuf>,
}

/// Outcome of matching one loaded module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not selected: return the raw exports and remember nothing
    Ignore,
    /// Selected package, but this file cannot be intercepted: cache raw exports
    Passthrough,
    /// Run the transform
    Intercept(Target),
}

/// Allow-list and internals matching
#[derive(Debug, Clone)]
pub struct FilterMatcher {
    modules: Modules,
    internals: bool,
}

impl FilterMatcher {
    /// Create a matcher
    pub fn new(modules: Modules, internals: bool) -> Self {
        Self { modules, internals }
    }

    /// Decide what to do with a module that just finished loading
    pub fn decide(
        &self,
        identity: &ModuleIdentity,
        packages: &dyn PackageLocator,
        entry_points: &dyn EntryPointResolver,
    ) -> Decision {
        match identity {
            ModuleIdentity::Builtin(name) => self.decide_builtin(name),
            ModuleIdentity::File(path) => self.decide_file(path, packages, entry_points),
        }
    }

    fn decide_builtin(&self, name: &str) -> Decision {
        if !self.modules.is_all() && !self.modules.contains(name) {
            debug!("ignoring core module not on allow-list: {}", name);
            return Decision::Ignore;
        }
        Decision::Intercept(Target {
            name: name.to_string(),
            basedir: None,
        })
    }

    fn decide_file(
        &self,
        path: &Path,
        packages: &dyn PackageLocator,
        entry_points: &dyn EntryPointResolver,
    ) -> Decision {
        // allow-list holds the absolute path of the file, extension included
        if self.modules.contains(&path.to_string_lossy()) {
            return Decision::Intercept(Target {
                name: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                basedir: path.parent().map(Path::to_path_buf),
            });
        }

        let Some(details) = packages.locate(path) else {
            debug!("could not parse filename: {}", path.display());
            return Decision::Ignore;
        };
        let full_name = full_module_name(&details);

        debug!(
            "resolved filename to module: {} (resolved: {}, basedir: {})",
            details.name,
            full_name,
            details.basedir.display()
        );

        // require('foo/lib/../bar.js') => name 'foo', full name 'foo/bar'
        if !self.modules.is_all() && !self.modules.contains(&details.name) {
            if !self.modules.contains(&full_name) {
                return Decision::Ignore;
            }
            return Decision::Intercept(Target {
                name: full_name,
                basedir: Some(details.basedir),
            });
        }

        // main module file, or a file inside the module?
        let main = match entry_points.resolve_entry_point(&details.name, &details.basedir) {
            Ok(main) => main,
            Err(err) => {
                debug!("could not resolve module {}: {}", details.name, err);
                return Decision::Passthrough;
            }
        };

        if main.as_path() == path {
            return Decision::Intercept(Target {
                name: details.name,
                basedir: Some(details.basedir),
            });
        }

        if !self.internals {
            debug!("ignoring require of non-main module file: {}", path.display());
            return Decision::Passthrough;
        }

        let relative = pathdiff::diff_paths(path, &details.basedir)
            .unwrap_or_else(|| PathBuf::from(&details.path));
        let name = format!("{}{}{}", details.name, MAIN_SEPARATOR_STR, relative.display());
        debug!("preparing to process require of internal file: {}", name);
        Decision::Intercept(Target {
            name,
            basedir: Some(details.basedir),
        })
    }
}
