// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module loading and hook configuration

use std::path::PathBuf;
use thiserror::Error;

/// Result type for hook and loader operations
pub type Result<T> = std::result::Result<T, HookError>;

/// Errors surfaced by loaders, resolvers and hook configuration
#[derive(Debug, Error)]
pub enum HookError {
    /// Module not found
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// Module resolution error
    #[error("Error resolving module '{module}': {reason}")]
    ModuleResolution {
        /// Module specifier
        module: String,
        /// Reason for failure
        reason: String,
    },

    /// A package.json that exists but cannot be used
    #[error("Invalid package.json at {path}: {reason}")]
    InvalidPackageJson {
        /// Path of the offending package.json
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// File system error
    #[error("File system error: {0}")]
    Fs(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Hook configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The module was found but evaluating it failed
    #[error("Error loading module '{module}': {reason}")]
    Load {
        /// Module specifier or filename
        module: String,
        /// Reason for failure
        reason: String,
    },

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

impl HookError {
    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound(module.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a load error for a module whose evaluation failed
    pub fn load(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error reports a module that could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound(_))
    }
}
