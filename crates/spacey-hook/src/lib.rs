// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-hook
//!
//! Intercept `require()` in the Spacey module system.
//!
//! A hook observes, and may replace, the exports of selected modules the first
//! time they are loaded:
//!
//! - allow-list by built-in name, package name, package subpath or absolute path
//! - optional interception of files inside a package (`internals`)
//! - exactly one transform call per module until the module cache entry is deleted
//! - safe with circular requires: the transform sees the finished exports
//! - hooks stack; a later hook sees what earlier hooks returned
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_hook::{Hook, ModuleHost};
//!
//! let host = ModuleHost::node(runtime_loader);
//!
//! let hook = Hook::builder(&host)
//!     .modules(["http", "express"])
//!     .install(|exports, name, basedir| {
//!         tracing::info!("loaded {} from {:?}", name, basedir);
//!         exports
//!     });
//!
//! let http = host.require("http", Path::new("/app/server.js"))?;
//! hook.disable();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod hook;
pub mod module_system;

// Re-exports
pub use config::{HookConfig, Modules};
pub use error::{HookError, Result};
pub use hook::{Hook, HookBuilder, Transform};
pub use module_system::{
    loader_fn, CachedModule, HookId, Load, LoadBuiltin, LoaderChain, ModuleCache, ModuleHost,
    ModuleIdentity, NodeResolver,
};

/// Version of the spacey-hook crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
