// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The single-slot request queue of an asset controller.

use kiln_core::{AssetEventKind, BuildAction, CookOptions};

/// What happened to a request handed to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The slot was empty and now holds the request.
    Queued,
    /// A pending cook took over the new cook's options.
    Coalesced,
    /// The request replaced the pending action.
    Replaced(BuildAction),
    /// A pending action with higher priority swallowed the request. Its
    /// completion is reported with that action's outcome.
    Absorbed(BuildAction),
}

/// A request taken out of the queue, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    /// What to run.
    pub action: BuildAction,
    /// Options of the last cook merged into the slot.
    pub options: CookOptions,
    /// One completion per request that ended up in this slot.
    pub waiters: Vec<AssetEventKind>,
}

/// The pending-action slot.
///
/// Holds at most one action. A cook never displaces a reload, a reset or a
/// bake. Reloads and resets replace each other and any cook. A bake only lands
/// in an empty slot. Every request that reaches the slot, accepted or
/// absorbed, leaves a waiter behind so its completion can be reported.
#[derive(Debug, Clone, Default)]
pub struct BuildRequestQueue {
    action: BuildAction,
    options: CookOptions,
    waiters: Vec<AssetEventKind>,
}

impl BuildRequestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The pending action.
    pub fn action(&self) -> BuildAction {
        self.action
    }

    /// Options of the pending cook.
    pub fn options(&self) -> CookOptions {
        self.options
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.action == BuildAction::None
    }

    /// Completions owed once the pending action runs.
    pub fn waiters(&self) -> &[AssetEventKind] {
        &self.waiters
    }

    /// Queues a cook.
    pub fn request_cook(&mut self, options: CookOptions) -> RequestOutcome {
        self.waiters.push(AssetEventKind::Cook);
        match self.action {
            BuildAction::None => {
                self.action = BuildAction::Cook;
                self.options = options;
                RequestOutcome::Queued
            }
            BuildAction::Cook => {
                self.options = options;
                RequestOutcome::Coalesced
            }
            other => RequestOutcome::Absorbed(other),
        }
    }

    /// Queues a full rebuild.
    pub fn request_reload(&mut self) -> RequestOutcome {
        self.request_rebuild(BuildAction::Reload)
    }

    /// Queues a reset to defaults, followed by a rebuild.
    pub fn request_reset_parameters(&mut self) -> RequestOutcome {
        self.request_rebuild(BuildAction::ResetParameters)
    }

    /// Queues a bake in place.
    pub fn request_bake(&mut self) -> RequestOutcome {
        self.waiters.push(AssetEventKind::Bake);
        match self.action {
            BuildAction::None => {
                self.action = BuildAction::StripEngineData;
                RequestOutcome::Queued
            }
            other => RequestOutcome::Absorbed(other),
        }
    }

    /// Puts an already-owned set of waiters back behind a new action.
    ///
    /// Used when one action hands over to another, such as a reset that is
    /// always followed by a rebuild.
    pub fn requeue(&mut self, action: BuildAction, waiters: Vec<AssetEventKind>) {
        self.waiters.extend(waiters);
        match (self.action, action) {
            (BuildAction::None, _) | (BuildAction::Cook, BuildAction::Reload | BuildAction::ResetParameters) => {
                self.action = action;
                self.options = CookOptions::default();
            }
            _ => {}
        }
    }

    /// Removes the pending request, resetting the slot and its options.
    pub fn take(&mut self) -> PendingRequest {
        PendingRequest {
            action: std::mem::take(&mut self.action),
            options: std::mem::take(&mut self.options),
            waiters: std::mem::take(&mut self.waiters),
        }
    }

    /// Drops the pending request. Returns the completions it owed.
    pub fn clear(&mut self) -> Vec<AssetEventKind> {
        self.take().waiters
    }

    fn request_rebuild(&mut self, action: BuildAction) -> RequestOutcome {
        self.waiters.push(AssetEventKind::Reload);
        match self.action {
            BuildAction::None => {
                self.action = action;
                RequestOutcome::Queued
            }
            BuildAction::StripEngineData => RequestOutcome::Absorbed(BuildAction::StripEngineData),
            previous => {
                self.action = action;
                self.options = CookOptions::default();
                RequestOutcome::Replaced(previous)
            }
        }
    }
}
