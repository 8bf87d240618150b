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

//! Preset capture and restore.
//!
//! Restoring never talks to the session: it only stages blobs and connections
//! on the local entities. The controller uploads them with the recook that
//! follows. Targets that do not exist yet are deferred into a
//! [`RecookPreset`] and retried once the next cook has produced them.

use kiln_core::event::Diagnostic;
use kiln_core::preset::{AssetPreset, CurvePreset, InputPreset, RecookPreset, VolumeTilePreset};
use kiln_data::{AssetGraph, InputNode, ParameterSet};
use thiserror::Error;

/// A preset blob that could not be read or written.
#[derive(Debug, Error)]
pub enum PresetError {
    /// The bytes are not a valid preset.
    #[error("Malformed preset: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The preset could not be encoded.
    #[error("Preset could not be encoded: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// Reads a preset persisted with [`encode`].
pub fn decode(bytes: &[u8]) -> Result<AssetPreset, PresetError> {
    Ok(AssetPreset::from_bytes(bytes)?)
}

/// Encodes a preset for persistence.
pub fn encode(preset: &AssetPreset) -> Result<Vec<u8>, PresetError> {
    Ok(preset.to_bytes()?)
}

/// Snapshots the local state of an asset.
///
/// The parameter and curve blobs are taken as they are; refresh them from
/// the session first if they may be stale.
pub fn capture(
    operator_name: &str,
    parameters: &ParameterSet,
    graph: &AssetGraph,
    inputs: &[InputNode],
) -> AssetPreset {
    AssetPreset {
        operator_name: operator_name.to_string(),
        parameter_preset: parameters.preset().to_vec(),
        curve_presets: graph
            .curves()
            .map(|(_, curve)| CurvePreset {
                name: curve.name.clone(),
                blob: curve.parameters.preset().to_vec(),
            })
            .collect(),
        input_presets: inputs
            .iter()
            .map(|input| InputPreset {
                input_name: input.name.clone(),
                connection: input.connection.clone(),
            })
            .collect(),
        volume_presets: graph
            .volumes()
            .map(|(_, volume)| VolumeTilePreset {
                object_name: volume.object_name.clone(),
                geo_name: volume.geo_name.clone(),
                tile: volume.tile,
                settings: volume.settings.clone(),
            })
            .collect(),
    }
}

/// Result of [`restore`].
#[derive(Debug, Clone, Default)]
pub struct RestoreOutcome {
    /// Presets whose targets do not exist yet.
    pub recook: RecookPreset,
    /// Problems gathered along the way.
    pub diagnostics: Vec<Diagnostic>,
}

/// Stages `preset` on the local entities.
///
/// Curves are matched by name. If any curve is missing, the unmatched blobs
/// are applied by position to the curves that did not receive one.
pub fn restore(
    preset: &AssetPreset,
    operator_name: &str,
    parameters: &mut ParameterSet,
    graph: &mut AssetGraph,
    inputs: &mut [InputNode],
) -> RestoreOutcome {
    let mut outcome = RestoreOutcome::default();

    if !preset.operator_name.is_empty() && preset.operator_name != operator_name {
        log::warn!(
            "PresetLane: preset was captured from '{}' but is applied to '{}'.",
            preset.operator_name,
            operator_name
        );
    }
    if !preset.parameter_preset.is_empty() {
        parameters.set_preset(preset.parameter_preset.clone());
    }

    restore_curves(&preset.curve_presets, graph);

    for input_preset in &preset.input_presets {
        match inputs.iter_mut().find(|i| i.name == input_preset.input_name) {
            Some(input) => input.connect(input_preset.connection.clone()),
            None => {
                log::warn!(
                    "PresetLane: input '{}' not found, deferring its preset to the next cook.",
                    input_preset.input_name
                );
                outcome.diagnostics.push(Diagnostic::PresetApplyMiss {
                    target: format!("input '{}'", input_preset.input_name),
                    deferred: true,
                });
                outcome.recook.input_presets.push(input_preset.clone());
            }
        }
    }

    for volume_preset in &preset.volume_presets {
        if !apply_volume(volume_preset, graph) {
            log::warn!(
                "PresetLane: {} not found, deferring its preset to the next cook.",
                volume_target(volume_preset)
            );
            outcome.diagnostics.push(Diagnostic::PresetApplyMiss {
                target: volume_target(volume_preset),
                deferred: true,
            });
            outcome.recook.volume_presets.push(volume_preset.clone());
        }
    }

    outcome
}

/// Applies presets deferred by [`restore`]. Targets still missing are
/// dropped. Returns whether anything was applied and the misses.
pub fn apply_recook(recook: &RecookPreset, graph: &mut AssetGraph, inputs: &mut [InputNode]) -> (bool, Vec<Diagnostic>) {
    let mut applied = false;
    let mut diagnostics = Vec::new();

    for input_preset in &recook.input_presets {
        match inputs.iter_mut().find(|i| i.name == input_preset.input_name) {
            Some(input) => {
                input.connect(input_preset.connection.clone());
                applied = true;
            }
            None => {
                log::warn!(
                    "PresetLane: input '{}' still missing after cook, preset dropped.",
                    input_preset.input_name
                );
                diagnostics.push(Diagnostic::PresetApplyMiss {
                    target: format!("input '{}'", input_preset.input_name),
                    deferred: false,
                });
            }
        }
    }

    for volume_preset in &recook.volume_presets {
        if apply_volume(volume_preset, graph) {
            applied = true;
        } else {
            log::warn!(
                "PresetLane: {} still missing after cook, preset dropped.",
                volume_target(volume_preset)
            );
            diagnostics.push(Diagnostic::PresetApplyMiss {
                target: volume_target(volume_preset),
                deferred: false,
            });
        }
    }

    (applied, diagnostics)
}

fn restore_curves(presets: &[CurvePreset], graph: &mut AssetGraph) {
    let keys = graph.curve_keys().to_vec();
    let mut received = vec![false; keys.len()];
    let mut missing = Vec::new();

    for (index, preset) in presets.iter().enumerate() {
        match graph.curve_by_name(&preset.name) {
            Some(key) => {
                if let Some(curve) = graph.curve_mut(key) {
                    curve.parameters.set_preset(preset.blob.clone());
                }
                if let Some(slot) = keys.iter().position(|k| *k == key) {
                    received[slot] = true;
                }
            }
            None => missing.push(index),
        }
    }

    if missing.is_empty() {
        return;
    }
    log::warn!(
        "PresetLane: {} curve preset(s) did not match by name, applying by position.",
        missing.len()
    );
    for index in missing {
        let Some(key) = keys.get(index) else {
            continue;
        };
        if received[index] {
            continue;
        }
        if let Some(curve) = graph.curve_mut(*key) {
            curve.parameters.set_preset(presets[index].blob.clone());
            received[index] = true;
        }
    }
}

fn apply_volume(preset: &VolumeTilePreset, graph: &mut AssetGraph) -> bool {
    match graph.volume_by_tile(&preset.object_name, &preset.geo_name, preset.tile) {
        Some(key) => {
            if let Some(volume) = graph.volume_mut(key) {
                volume.apply(preset.settings.clone());
            }
            true
        }
        None => false,
    }
}

fn volume_target(preset: &VolumeTilePreset) -> String {
    format!(
        "volume tile {}/{}#{}",
        preset.object_name, preset.geo_name, preset.tile
    )
}
