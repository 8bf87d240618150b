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

//! Ordered, single-threaded driver for a set of asset controllers.

use kiln_agents::AssetController;
use kiln_core::{AssetEvent, AssetEventKind, AssetKey, Session};
use serde::{Deserialize, Serialize};

/// Configuration for the [`AssetUpdater`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Settle finished sequences at the end of every tick.
    pub run_post_update: bool,
    /// Upper bound on ticks spent waiting for the set to go idle.
    pub max_idle_ticks: usize,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            run_post_update: true,
            max_idle_ticks: 64,
        }
    }
}

impl UpdaterConfig {
    /// Parses a configuration from RON text. Missing fields keep their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }
}

/// What [`AssetUpdater::run_until_idle`] observed.
#[derive(Debug, Clone, Default)]
pub struct IdleReport {
    /// Number of ticks that ran.
    pub ticks: usize,
    /// Every completion event published while ticking, in order.
    pub events: Vec<AssetEvent>,
    /// `false` if the tick limit was reached first.
    pub idle: bool,
}

/// A controller plus the receiving end of its event stream.
struct UpdaterEntry {
    controller: AssetController,
    events: flume::Receiver<AssetEvent>,
}

/// Owns asset controllers and advances them one tick at a time.
///
/// Controllers are updated in insertion order. When a controller reports a
/// successful cook, every other controller with an input fed by it is told so
/// and queues a cook of its own; controllers added later in the order pick
/// that cook up in the same tick.
pub struct AssetUpdater {
    config: UpdaterConfig,
    entries: Vec<UpdaterEntry>,
}

impl AssetUpdater {
    /// Creates an empty updater with the default configuration.
    pub fn new() -> Self {
        Self::with_config(UpdaterConfig::default())
    }

    /// Creates an empty updater.
    pub fn with_config(config: UpdaterConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Takes ownership of `controller` and returns its key.
    ///
    /// The updater subscribes to the controller's events; callers that want
    /// their own copy should subscribe before handing it over.
    pub fn add(&mut self, mut controller: AssetController) -> AssetKey {
        let key = controller.key();
        if self.position(key).is_some() {
            log::warn!("AssetUpdater: asset {key} is already registered, replacing it.");
            self.remove(key);
        }
        let events = controller.subscribe();
        log::info!(
            "AssetUpdater: registered asset {} ({} total).",
            key,
            self.entries.len() + 1
        );
        self.entries.push(UpdaterEntry { controller, events });
        key
    }

    /// Hands the controller back to the caller. Its session node is left alone.
    pub fn remove(&mut self, key: AssetKey) -> Option<AssetController> {
        let index = self.position(key)?;
        log::info!("AssetUpdater: unregistered asset {key}.");
        Some(self.entries.remove(index).controller)
    }

    /// Returns the controller with the given key.
    pub fn get(&self, key: AssetKey) -> Option<&AssetController> {
        self.entries
            .iter()
            .find(|e| e.controller.key() == key)
            .map(|e| &e.controller)
    }

    /// Returns the controller with the given key, mutably.
    pub fn get_mut(&mut self, key: AssetKey) -> Option<&mut AssetController> {
        self.entries
            .iter_mut()
            .find(|e| e.controller.key() == key)
            .map(|e| &mut e.controller)
    }

    /// Returns the number of controllers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no controllers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the controllers in update order.
    pub fn iter(&self) -> impl Iterator<Item = &AssetController> {
        self.entries.iter().map(|e| &e.controller)
    }

    /// Returns `true` when no controller has work in flight or queued.
    pub fn is_idle(&self) -> bool {
        self.entries.iter().all(|e| e.controller.is_idle())
    }

    /// Updates every controller once and returns the events they published.
    pub fn tick(&mut self, session: &mut dyn Session) -> Vec<AssetEvent> {
        let mut published = Vec::new();

        for index in 0..self.entries.len() {
            let entry = &mut self.entries[index];
            entry.controller.update(session);
            let key = entry.controller.key();
            let notifies_downstream = entry.controller.config().cooking_triggers_downstream_cooks;
            let events: Vec<AssetEvent> = entry.events.try_iter().collect();

            // Coalesced requests publish one event per waiter; downstream
            // assets are told once.
            if notifies_downstream
                && events
                    .iter()
                    .any(|e| e.success && cooked_outputs(e.kind))
            {
                self.notify_downstream(key);
            }
            published.extend(events);
        }

        if self.config.run_post_update {
            for entry in &mut self.entries {
                entry.controller.post_update();
            }
        }
        published
    }

    /// Ticks until every controller is idle or `max_ticks` ran.
    pub fn run_until_idle(&mut self, session: &mut dyn Session, max_ticks: usize) -> IdleReport {
        let mut report = IdleReport {
            idle: self.is_idle(),
            ..Default::default()
        };

        while !report.idle && report.ticks < max_ticks {
            report.events.extend(self.tick(session));
            report.ticks += 1;
            report.idle = self.is_idle();
        }

        if !report.idle {
            log::warn!(
                "AssetUpdater: {} asset(s) still busy after {} tick(s).",
                self.entries.iter().filter(|e| !e.controller.is_idle()).count(),
                report.ticks
            );
        }
        report
    }

    /// Destroys every controller's session data and empties the updater.
    pub fn destroy_all(&mut self, session: &mut dyn Session) {
        for mut entry in self.entries.drain(..) {
            entry.controller.destroy(session);
        }
    }

    fn notify_downstream(&mut self, upstream: AssetKey) {
        let notified = self
            .entries
            .iter_mut()
            .filter(|e| e.controller.key() != upstream)
            .map(|e| e.controller.notify_upstream_cooked(upstream))
            .filter(|affected| *affected)
            .count();
        if notified > 0 {
            log::debug!("AssetUpdater: {upstream} cooked, {notified} downstream asset(s) queued.");
        }
    }

    fn position(&self, key: AssetKey) -> Option<usize> {
        self.entries.iter().position(|e| e.controller.key() == key)
    }
}

impl Default for AssetUpdater {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuilds cook as well, so both refresh what downstream inputs read.
fn cooked_outputs(kind: AssetEventKind) -> bool {
    matches!(kind, AssetEventKind::Cook | AssetEventKind::Reload)
}
