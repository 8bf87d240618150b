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

use anyhow::{Context, Result};
use kiln_agents::ControllerConfig;
use kiln_control::UpdaterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one runtime invocation.
///
/// ```ron
/// (
///     controller: (cooking_enabled: true, blocking_poll_interval_ms: 5),
///     updater: (max_idle_ticks: 128),
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Applied to every controller the runtime creates.
    pub controller: ControllerConfig,
    /// Applied to the tick driver.
    pub updater: UpdaterConfig,
}

impl RuntimeConfig {
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).context("Failed to parse runtime configuration")
    }

    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runtime configuration {}", path.display()))?;
        Self::from_ron_str(&text)
            .with_context(|| format!("Invalid runtime configuration in {}", path.display()))
    }
}
