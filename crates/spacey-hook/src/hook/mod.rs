// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! require() hooks
//!
//! A [`Hook`] sits between the runtime's `require()` entry point and the loader
//! that was active when the hook was created. For every module the hook is
//! configured for, the transform runs once, after the module has finished
//! loading, and its return value is what every later `require()` of that
//! module gets back.
//!
//! Per load:
//! 1. a disabled hook forwards the call untouched
//! 2. the specifier is resolved; on failure the call is forwarded untouched
//! 3. cached exports are returned without loading anything
//! 4. the loader below runs; a circular re-entry returns its result as-is
//! 5. the filter decides; the raw exports are cached before the transform runs
//!    and the transform's result replaces them afterwards

pub mod exports;
pub mod filter;
mod layer;
pub mod pending;

pub use exports::ExportsCache;
pub use filter::{Decision, FilterMatcher, Target};
pub use layer::{Hook, HookBuilder, Transform};
pub use pending::{PendingLoad, ReentrancyTracker};
