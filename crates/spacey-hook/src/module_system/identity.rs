// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Canonical module identities

use crate::module_system::package::PackageDetails;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Scheme prefix accepted in front of built-in module names
pub const BUILTIN_PREFIX: &str = "node:";

// 'foo/bar.js' or 'foo/bar/index.js' => 'foo/bar'
static NORMALIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([/\\]index)?(\.js)?$").expect("valid normalize regex"));

/// Canonical key for a loadable module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleIdentity {
    /// Module provided by the runtime itself, keyed by name
    Builtin(String),
    /// Module backed by a file, keyed by its canonical absolute path
    File(PathBuf),
}

impl ModuleIdentity {
    /// Build the identity of a built-in request.
    ///
    /// `node:foo` collapses to `foo` when `foo` is itself a built-in, so both
    /// spellings share one cache entry. Prefix-only modules such as
    /// `node:test` keep their prefix.
    pub fn builtin(id: &str, is_builtin: impl Fn(&str) -> bool) -> Self {
        match id.strip_prefix(BUILTIN_PREFIX) {
            Some(bare) if is_builtin(bare) => Self::Builtin(bare.to_string()),
            _ => Self::Builtin(id.to_string()),
        }
    }

    /// Whether this identity names a built-in module
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin(_))
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(name) => f.write_str(name),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Compute the normalized name of a file inside a package.
///
/// Joins the package name with the POSIX form of the package-relative path and
/// strips one trailing `index` segment and one `.js` extension. Other
/// extensions are kept, so `pkg/foo.cjs` stays `pkg/foo.cjs`.
pub fn full_module_name(details: &PackageDetails) -> String {
    let relative = details.path.replace('\\', "/");
    let joined = posix_join(&details.name, &relative);
    NORMALIZE.replace(&joined, "").into_owned()
}

/// Join two POSIX paths and collapse `.` / `..` segments
fn posix_join(base: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str, path: &str) -> PackageDetails {
        PackageDetails {
            name: name.to_string(),
            basedir: PathBuf::from("/app/node_modules").join(name),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_builtin_prefix_collapses() {
        let is_builtin = |name: &str| matches!(name, "http" | "fs" | "node:test");

        assert_eq!(
            ModuleIdentity::builtin("node:http", is_builtin),
            ModuleIdentity::Builtin("http".to_string())
        );
        assert_eq!(
            ModuleIdentity::builtin("fs", is_builtin),
            ModuleIdentity::Builtin("fs".to_string())
        );
        // "test" on its own is not a built-in, so the prefix stays
        assert_eq!(
            ModuleIdentity::builtin("node:test", is_builtin),
            ModuleIdentity::Builtin("node:test".to_string())
        );
    }

    #[test]
    fn test_full_module_name() {
        assert_eq!(full_module_name(&details("sub-module", "foo.js")), "sub-module/foo");
        assert_eq!(full_module_name(&details("sub-module", "bar/index.js")), "sub-module/bar");
        assert_eq!(full_module_name(&details("sub-module", "index.js")), "sub-module");
        assert_eq!(full_module_name(&details("@scope/pkg", "lib/x.js")), "@scope/pkg/lib/x");
        assert_eq!(
            full_module_name(&details("sub-module", "lib\\win.js")),
            "sub-module/lib/win"
        );
    }

    #[test]
    fn test_full_module_name_keeps_other_extensions() {
        assert_eq!(
            full_module_name(&details("cjs-sub-module", "foo.cjs")),
            "cjs-sub-module/foo.cjs"
        );
        assert_eq!(
            full_module_name(&details("cjs-sub-module", "bar/index.cjs")),
            "cjs-sub-module/bar/index.cjs"
        );
    }

    #[test]
    fn test_posix_join() {
        assert_eq!(posix_join("foo", "lib/../bar.js"), "foo/bar.js");
        assert_eq!(posix_join("foo", "./a/b"), "foo/a/b");
    }
}
