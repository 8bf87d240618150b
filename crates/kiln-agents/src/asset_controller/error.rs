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

use kiln_core::session::SessionError;
use kiln_core::CookStatus;
use kiln_lanes::preset_lane::PresetError;
use thiserror::Error;

/// Why a cook or rebuild was aborted.
///
/// Never escapes the controller's tick: the top of each sequence logs it and
/// turns it into an errored completion event.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// No valid session to talk to.
    #[error("No valid session is available")]
    SessionUnavailable,
    /// The definition library could not be loaded or was empty.
    #[error("Failed to load asset definition: {0}")]
    LoadFailure(String),
    /// The session reported fatal errors for the cook.
    #[error("Cook failed: {0}")]
    CookFatalError(String),
    /// Cooking is disabled in the configuration.
    #[error("Cooking is disabled")]
    CookingDisabled,
    /// Cooking was paused on this controller.
    #[error("Cooking is paused")]
    Paused,
    /// A blocking request arrived while a sequence was in flight.
    #[error("Asset is busy ({0})")]
    Busy(CookStatus),
    /// The asset was baked and no longer has a session node.
    #[error("Asset was baked in place")]
    Baked,
    /// The chosen sub-asset does not exist in the library.
    #[error("Invalid sub-asset index {0}")]
    InvalidSubasset(usize),
    /// The parameter set was generated for another node.
    #[error("Parameters do not belong to the asset node")]
    ParameterNodeMismatch,
    /// A preset blob could not be decoded.
    #[error(transparent)]
    Preset(#[from] PresetError),
    /// A session call failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
