// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The parts of the CommonJS module system that hooks plug into
//!
//! - identifier resolution and the built-in predicate ([`Resolver`])
//! - package lookup ([`PackageLocator`], [`EntryPointResolver`])
//! - the runtime-wide `require.cache` ([`ModuleCache`])
//! - the active loader of each entry point ([`LoaderChain`], [`ModuleHost`])

mod cache;
mod identity;
mod loader;
mod package;
mod resolver;

pub use cache::{CachedModule, HookId, ModuleCache};
pub use identity::{full_module_name, ModuleIdentity, BUILTIN_PREFIX};
pub use loader::{
    loader_fn, FnLoader, Load, LoadBuiltin, LoaderChain, ModuleHost, ModuleHostBuilder,
};
pub use package::{
    module_details_from_path, NodeModulesLocator, PackageDetails, PackageJson, PackageLocator,
};
pub use resolver::{
    EntryPointResolver, NodeResolver, Resolver, BUILTIN_MODULES, PREFIX_ONLY_MODULES,
};
