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

//! Preset records.
//!
//! A preset is a snapshot of everything a user can tweak on an asset. It is
//! taken before a destructive rebuild and restored once the rebuild's
//! geometry exists again. Presets are plain data and outlive the controller
//! that captured them, so they double as the payload for duplication.

use crate::session::InputConnection;
use serde::{Deserialize, Serialize};

/// Parameter blob for one named curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePreset {
    /// Curve name at capture time.
    pub name: String,
    /// Opaque parameter blob.
    pub blob: Vec<u8>,
}

/// Connection of one input slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPreset {
    /// Input name at capture time.
    pub input_name: String,
    /// Connection description.
    pub connection: InputConnection,
}

/// Host-side settings of one volume tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeTileSettings {
    /// Material override applied to the tile.
    pub material: Option<String>,
    /// Density of detail scattering.
    pub detail_density: f32,
    /// Whether the tile is rendered.
    pub visible: bool,
}

impl Default for VolumeTileSettings {
    fn default() -> Self {
        Self {
            material: None,
            detail_density: 1.0,
            visible: true,
        }
    }
}

/// Settings of one volume tile, keyed by object name, geo name and tile index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeTilePreset {
    /// Owning object name.
    pub object_name: String,
    /// Owning geo name.
    pub geo_name: String,
    /// Tile index inside the geo.
    pub tile: u32,
    /// Captured settings.
    pub settings: VolumeTileSettings,
}

impl VolumeTilePreset {
    /// Returns `true` if this record targets the given tile.
    pub fn targets(&self, object_name: &str, geo_name: &str, tile: u32) -> bool {
        self.object_name == object_name && self.geo_name == geo_name && self.tile == tile
    }
}

/// Full snapshot of an asset's user-editable state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetPreset {
    /// Operator the snapshot was taken from.
    pub operator_name: String,
    /// Opaque blob of the asset's own parameters.
    pub parameter_preset: Vec<u8>,
    /// Curve blobs, in curve order.
    pub curve_presets: Vec<CurvePreset>,
    /// Input connections.
    pub input_presets: Vec<InputPreset>,
    /// Volume tile settings.
    pub volume_presets: Vec<VolumeTilePreset>,
}

impl AssetPreset {
    /// Returns `true` if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.parameter_preset.is_empty()
            && self.curve_presets.is_empty()
            && self.input_presets.is_empty()
            && self.volume_presets.is_empty()
    }

    /// Encodes the preset for persistence by the host.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    /// Decodes a preset produced by [`AssetPreset::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let (preset, _read) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(preset)
    }
}

/// Presets whose targets only exist after a cook.
///
/// Filled during restore with everything that could not be applied yet, and
/// drained after the next successful cook.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecookPreset {
    /// Deferred input connections.
    pub input_presets: Vec<InputPreset>,
    /// Deferred volume tile settings.
    pub volume_presets: Vec<VolumeTilePreset>,
}

impl RecookPreset {
    /// Returns `true` if nothing is deferred.
    pub fn is_empty(&self) -> bool {
        self.input_presets.is_empty() && self.volume_presets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_survives_persistence() {
        let preset = AssetPreset {
            operator_name: "kiln::rock".to_string(),
            parameter_preset: vec![1, 2, 3],
            curve_presets: vec![CurvePreset {
                name: "path".to_string(),
                blob: vec![9],
            }],
            input_presets: vec![InputPreset {
                input_name: "ground".to_string(),
                connection: InputConnection::geometry("plane"),
            }],
            volume_presets: vec![VolumeTilePreset {
                object_name: "terrain".to_string(),
                geo_name: "height".to_string(),
                tile: 2,
                settings: VolumeTileSettings {
                    material: Some("grass".to_string()),
                    detail_density: 0.5,
                    visible: false,
                },
            }],
        };

        let bytes = preset.to_bytes().expect("encode");
        let decoded = AssetPreset::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, preset);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(AssetPreset::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn tile_targeting_uses_full_key() {
        let preset = VolumeTilePreset {
            object_name: "terrain".to_string(),
            geo_name: "height".to_string(),
            tile: 1,
            settings: VolumeTileSettings::default(),
        };
        assert!(preset.targets("terrain", "height", 1));
        assert!(!preset.targets("terrain", "height", 0));
        assert!(!preset.targets("terrain", "mask", 1));
    }
}
