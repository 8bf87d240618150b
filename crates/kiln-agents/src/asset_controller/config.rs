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

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use kiln_core::session::CookNodeOptions;
use serde::{Deserialize, Serialize};

/// Settings shared by asset controllers.
///
/// Every field has a default, so a configuration file only needs to name the
/// values it changes:
///
/// ```text
/// (
///     cooking_enabled: false,
///     blocking_poll_interval_ms: 5,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Cooks are refused unless the request skips this check.
    pub cooking_enabled: bool,
    /// Upload the host transform to the asset node before cooking.
    pub push_transform: bool,
    /// Recook when the host transform changes.
    pub transform_change_triggers_cooks: bool,
    /// Assets fed by this one recook after it cooks successfully.
    pub cooking_triggers_downstream_cooks: bool,
    /// Recook when the node was cooked by someone else in the session.
    pub session_sync_auto_cook: bool,
    /// Forwarded to the session with every cook.
    pub cook_templated_geos: bool,
    /// Forwarded to the session with every cook.
    pub split_geos_by_group: bool,
    /// Pause between polls of a blocking cook. Zero spins.
    pub blocking_poll_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cooking_enabled: true,
            push_transform: true,
            transform_change_triggers_cooks: false,
            cooking_triggers_downstream_cooks: true,
            session_sync_auto_cook: true,
            cook_templated_geos: true,
            split_geos_by_group: false,
            blocking_poll_interval_ms: 0,
        }
    }
}

impl ControllerConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).context("Failed to parse controller configuration")
    }

    /// Reads and parses a RON configuration file.
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read controller configuration {}", path.display()))?;
        Self::from_ron_str(&text)
            .with_context(|| format!("Invalid controller configuration in {}", path.display()))
    }

    /// The options passed to the session with each cook.
    pub fn cook_node_options(&self) -> CookNodeOptions {
        CookNodeOptions {
            cook_templated_geos: self.cook_templated_geos,
            split_geos_by_group: self.split_geos_by_group,
        }
    }

    /// The pause between polls of a blocking cook, if any.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.blocking_poll_interval_ms > 0)
            .then(|| Duration::from_millis(self.blocking_poll_interval_ms))
    }
}
