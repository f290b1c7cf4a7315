// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package metadata: which package owns a file, and what its package.json says

use crate::error::{HookError, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Location of a file inside an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDetails {
    /// Package name (`lodash`, `@babel/core`)
    pub name: String,
    /// Package root directory (`/app/node_modules/lodash`)
    pub basedir: PathBuf,
    /// Path of the file relative to `basedir`, using the platform separator
    pub path: String,
}

/// Maps a canonical file path to the package that owns it
pub trait PackageLocator: Send + Sync {
    /// Find the owning package, or `None` when the file is not inside one
    fn locate(&self, filename: &Path) -> Option<PackageDetails>;
}

/// Locates packages by the innermost `node_modules` segment of a path
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeModulesLocator;

impl PackageLocator for NodeModulesLocator {
    fn locate(&self, filename: &Path) -> Option<PackageDetails> {
        module_details_from_path(filename)
    }
}

/// Split a path below `node_modules` into package name, root and relative path.
///
/// `/app/node_modules/@scope/pkg/lib/a.js` gives name `@scope/pkg`, basedir
/// `/app/node_modules/@scope/pkg` and path `lib/a.js`.
pub fn module_details_from_path(filename: &Path) -> Option<PackageDetails> {
    let components: Vec<Component<'_>> = filename.components().collect();
    let index = components
        .iter()
        .rposition(|c| c.as_os_str() == "node_modules")?;

    let first = components.get(index + 1)?.as_os_str().to_str()?;
    let (name, offset) = if first.starts_with('@') {
        let second = components.get(index + 2)?.as_os_str().to_str()?;
        (format!("{}/{}", first, second), 3)
    } else {
        (first.to_string(), 2)
    };

    let basedir: PathBuf = components[..index + offset].iter().collect();
    let path = components[index + offset..]
        .iter()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join(std::path::MAIN_SEPARATOR_STR);

    Some(PackageDetails {
        name,
        basedir,
        path,
    })
}

/// The parts of package.json that module resolution reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
    /// Package name
    pub name: Option<String>,
    /// Main entry point
    pub main: Option<String>,
    /// Conditional exports map
    #[serde(default)]
    pub exports: Option<serde_json::Value>,
}

impl PackageJson {
    /// Read `package.json` from a package directory, if there is one
    pub fn read_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join("package.json");
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| HookError::InvalidPackageJson {
                path,
                reason: e.to_string(),
            })
    }

    /// Look up the target of a subpath (`"."` or `"./foo"`) in the exports map
    pub fn export_target(&self, subpath: &str) -> Option<String> {
        let exports = self.exports.as_ref()?;
        match exports {
            serde_json::Value::String(target) if subpath == "." => Some(target.clone()),
            serde_json::Value::Object(map) => {
                let is_subpath_map = map.keys().any(|k| k.starts_with('.'));
                if is_subpath_map {
                    map.get(subpath).and_then(conditional_target)
                } else if subpath == "." {
                    conditional_target(exports)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Conditions honoured when picking an export target, in priority order
const EXPORT_CONDITIONS: &[&str] = &["require", "node", "default"];

fn conditional_target(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(target) => Some(target.clone()),
        serde_json::Value::Object(conditions) => EXPORT_CONDITIONS
            .iter()
            .find_map(|c| conditions.get(*c))
            .and_then(conditional_target),
        _ => None,
    }
}
