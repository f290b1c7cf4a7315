// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Hook configuration
//!
//! A hook is configured by an allow-list of modules and the `internals` flag.
//! Configuration can be built in code, parsed from JSON, and overridden from
//! the environment:
//!
//! ```json
//! { "modules": ["http", "express", "express/lib/router"], "internals": true }
//! ```
//!
//! `"modules": "*"` (or no `modules` key) selects every module.

use crate::error::{HookError, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Environment variable overriding [`HookConfig::modules`]
pub const ENV_MODULES: &str = "SPACEY_HOOK_MODULES";

/// Environment variable overriding [`HookConfig::internals`]
pub const ENV_INTERNALS: &str = "SPACEY_HOOK_INTERNALS";

/// Which modules a hook acts on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Modules {
    /// Every module
    #[default]
    All,
    /// Only the listed built-in names, package names, package subpaths or
    /// absolute file paths
    Only(Vec<String>),
}

impl Modules {
    /// Allow-list from any collection of names
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    /// Whether this selects every module
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether `name` is literally on the allow-list. Always `false` for [`Modules::All`].
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::All => false,
            Self::Only(names) => names.iter().any(|n| n == name),
        }
    }

    fn parse_list(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return Self::All;
        }
        Self::only(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }
}

impl<'de> Deserialize<'de> for Modules {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ModulesField {
            List(Vec<String>),
            Single(String),
        }

        Ok(match Option::<ModulesField>::deserialize(deserializer)? {
            None => Modules::All,
            Some(ModulesField::Single(s)) if s == "*" => Modules::All,
            Some(ModulesField::Single(s)) => Modules::Only(vec![s]),
            Some(ModulesField::List(list)) => Modules::Only(list),
        })
    }
}

/// Configuration of one hook
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Modules the hook acts on
    pub modules: Modules,

    /// Also intercept files inside a selected package other than its main entry
    pub internals: bool,
}

impl HookConfig {
    /// Configuration that selects every module
    pub fn all() -> Self {
        Self::default()
    }

    /// Configuration selecting only `names`
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: Modules::only(names),
            internals: false,
        }
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HookError::config(e.to_string()))
    }

    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&content)?;
        config.load_from_env()?;
        Ok(config)
    }

    /// Apply [`ENV_MODULES`] and [`ENV_INTERNALS`] from the process environment
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(modules) = lookup(ENV_MODULES) {
            self.modules = Modules::parse_list(&modules);
        }

        if let Some(internals) = lookup(ENV_INTERNALS) {
            self.internals = match internals.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(HookError::config(format!(
                        "{} must be a boolean, got '{}'",
                        ENV_INTERNALS, other
                    )));
                }
            };
        }

        Ok(())
    }
}
