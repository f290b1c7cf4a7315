// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tracking of loads that are still in progress

use crate::module_system::ModuleIdentity;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Identities whose outermost load has started but not returned yet
#[derive(Debug, Default)]
pub struct ReentrancyTracker {
    pending: Mutex<HashSet<ModuleIdentity>>,
}

impl ReentrancyTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `identity` as loading.
    ///
    /// The returned guard is outermost when no other load of `identity` was
    /// pending; only an outermost guard clears the mark when dropped.
    pub fn begin(&self, identity: &ModuleIdentity) -> PendingLoad<'_> {
        let outermost = self.pending.lock().insert(identity.clone());
        PendingLoad {
            tracker: self,
            identity: outermost.then(|| identity.clone()),
        }
    }

    /// Whether a load of `identity` is in progress
    pub fn is_pending(&self, identity: &ModuleIdentity) -> bool {
        self.pending.lock().contains(identity)
    }
}

/// A load of one identity that is in progress
#[must_use = "the load stops being pending as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PendingLoad<'a> {
    tracker: &'a ReentrancyTracker,
    /// Set only on the outermost guard
    identity: Option<ModuleIdentity>,
}

impl PendingLoad<'_> {
    /// `false` for a circular re-entry into a load that is already running
    pub fn is_outermost(&self) -> bool {
        self.identity.is_some()
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if let Some(identity) = self.identity.take() {
            self.tracker.pending.lock().remove(&identity);
        }
    }
}
