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

use serde::{Deserialize, Serialize};
use std::fmt;

/// The phase an asset controller is in.
///
/// ```text
///  None ──reload──▶ PreLoad ──▶ Loading ──▶ PostLoad ──tick──▶ None
///                      │           ▲
///                      ▼           │ selection made
///               SelectSubasset ────┘
///
///  None ──cook──▶ Cooking ──ready──▶ PostCook ──tick──▶ None
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CookStatus {
    /// Idle, waiting for the next request.
    #[default]
    None,
    /// A rebuild is about to load the definition library.
    PreLoad,
    /// The library is loaded and the node is being (re)created.
    Loading,
    /// A cook was issued and is being polled.
    Cooking,
    /// A cook finished during this tick.
    PostCook,
    /// A rebuild finished during this tick.
    PostLoad,
    /// A rebuild is parked until the host picks a definition.
    SelectSubasset,
}

impl CookStatus {
    /// Returns `true` when no cook or rebuild sequence is in flight.
    pub fn is_idle(self) -> bool {
        matches!(self, CookStatus::None)
    }

    /// Returns `true` if a blocking cook may start from this status.
    pub fn accepts_blocking_cook(self) -> bool {
        matches!(
            self,
            CookStatus::None | CookStatus::PostLoad | CookStatus::PostCook
        )
    }

    /// Returns `true` if the state machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: CookStatus) -> bool {
        use CookStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (None, PreLoad | Cooking | PostCook | PostLoad) => true,
            (PreLoad, Loading | SelectSubasset | PostLoad) => true,
            (SelectSubasset, PreLoad | Loading | PostLoad) => true,
            (Loading, PostLoad | None) => true,
            (Cooking, PostCook | None) => true,
            (PostCook | PostLoad, None | PreLoad | Cooking | PostCook | PostLoad) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CookStatus::None => "NONE",
            CookStatus::PreLoad => "PRELOAD",
            CookStatus::Loading => "LOADING",
            CookStatus::Cooking => "COOKING",
            CookStatus::PostCook => "POSTCOOK",
            CookStatus::PostLoad => "POSTLOAD",
            CookStatus::SelectSubasset => "SELECT_SUBASSET",
        };
        f.write_str(name)
    }
}

/// Outcome of the last finished cook or rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CookResult {
    /// Nothing has finished yet.
    #[default]
    None,
    /// The last sequence completed.
    Success,
    /// The last sequence failed and was aborted.
    Errored,
}

/// The action waiting in an asset's single request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildAction {
    /// Nothing queued.
    #[default]
    None,
    /// Full teardown and rebuild.
    Reload,
    /// Incremental recook.
    Cook,
    /// Reset everything to defaults, then rebuild.
    ResetParameters,
    /// Drop the live session dependency and freeze outputs.
    StripEngineData,
}

/// Flags that shape a single cook request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookOptions {
    /// Upload only the parameters that changed since the last upload.
    pub check_parameters_changed: bool,
    /// Cook even when cooking is globally disabled.
    pub skip_cook_check: bool,
    /// Upload parameter values before cooking.
    pub upload_parameters: bool,
    /// Upload every input, dirty or not.
    pub force_upload_inputs: bool,
}

impl Default for CookOptions {
    fn default() -> Self {
        Self {
            check_parameters_changed: false,
            skip_cook_check: false,
            upload_parameters: true,
            force_upload_inputs: false,
        }
    }
}

impl CookOptions {
    /// Options for a cook that only uploads what changed.
    pub fn changed_only() -> Self {
        Self {
            check_parameters_changed: true,
            ..Default::default()
        }
    }
}
