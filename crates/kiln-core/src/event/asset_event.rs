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

use crate::asset::AssetKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which request an [`AssetEvent`] completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetEventKind {
    /// A rebuild (reload or reset) finished.
    Reload,
    /// A cook finished.
    Cook,
    /// A bake-in-place finished.
    Bake,
}

/// Identity of one generated output, as reported to observers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Object name.
    pub object: String,
    /// Geo name inside the object.
    pub geo: String,
    /// Part name inside the geo.
    pub part: String,
    /// Number of points carried by the part.
    pub point_count: u32,
}

/// A non-fatal problem observed while serving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// The session finished the cook with recoverable errors.
    CookWarning {
        /// Status message reported by the session.
        message: String,
    },
    /// A freshly queried object could not be matched to a cached one.
    ReconciliationAmbiguity {
        /// Name of the object that was created anew.
        object: String,
        /// How many cached objects were candidates.
        candidates: usize,
    },
    /// A preset target was not found.
    PresetApplyMiss {
        /// Description of the missing target.
        target: String,
        /// `true` if the preset was kept for the next cook.
        deferred: bool,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CookWarning { message } => write!(f, "Cook warning: {message}"),
            Diagnostic::ReconciliationAmbiguity { object, candidates } => write!(
                f,
                "Object '{object}' could not be matched among {candidates} previous objects; state may be lost"
            ),
            Diagnostic::PresetApplyMiss { target, deferred } => {
                if *deferred {
                    write!(f, "Preset target '{target}' not found, deferred to next cook")
                } else {
                    write!(f, "Preset target '{target}' not found, dropped")
                }
            }
        }
    }
}

/// Completion record published once per finished request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEvent {
    /// The asset the request belonged to.
    pub asset: AssetKey,
    /// Which request finished.
    pub kind: AssetEventKind,
    /// Whether the request succeeded.
    pub success: bool,
    /// Generated outputs. Empty on failure.
    pub outputs: Vec<OutputRef>,
    /// Non-fatal problems gathered along the way.
    pub diagnostics: Vec<Diagnostic>,
}

impl AssetEvent {
    /// A failed completion with no outputs.
    pub fn failed(asset: AssetKey, kind: AssetEventKind, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            asset,
            kind,
            success: false,
            outputs: Vec::new(),
            diagnostics,
        }
    }
}
