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

use crate::parameters::ParameterSet;
use kiln_core::preset::VolumeTileSettings;
use kiln_core::session::{GeoKind, MaterialId, NodeId, Session, SessionResult};
use kiln_core::Transform;
use slotmap::new_key_type;
use std::collections::{BTreeMap, BTreeSet};

new_key_type! {
    /// Key of an [`ObjectNode`].
    pub struct ObjectKey;
    /// Key of a [`GeoNode`].
    pub struct GeoKey;
    /// Key of a [`PartData`].
    pub struct PartKey;
    /// Key of a [`Curve`].
    pub struct CurveKey;
    /// Key of a [`VolumeCache`].
    pub struct VolumeKey;
    /// Key of an [`AttributeStore`].
    pub struct AttributeStoreKey;
}

/// A generated object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    /// Object name as last reported by the session.
    pub name: String,
    /// Session node.
    pub node: NodeId,
    /// Transform relative to the asset.
    pub transform: Transform,
    /// Geometry nodes, in session order.
    pub geos: Vec<GeoKey>,
    /// Names of the objects this one instances.
    pub instanced_names: Vec<String>,
    /// Resolved instance targets.
    pub instances: Vec<ObjectKey>,
}

/// A geometry node below an object.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoNode {
    /// Owning object.
    pub object: ObjectKey,
    /// Geo name.
    pub name: String,
    /// Session node.
    pub node: NodeId,
    /// Kind of geometry.
    pub kind: GeoKind,
    /// Generated parts, in session order.
    pub parts: Vec<PartKey>,
}

/// Host-side result of converting one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneratedOutput {
    /// Number of points in the part.
    pub point_count: u32,
}

/// One generated part and the output built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PartData {
    /// Owning geo.
    pub geo: GeoKey,
    /// Part name.
    pub name: String,
    /// Bound material.
    pub material: Option<MaterialId>,
    /// Generated output.
    pub output: GeneratedOutput,
}

/// An editable curve with its own parameters.
#[derive(Debug, Clone)]
pub struct Curve {
    /// Curve name.
    pub name: String,
    /// Session node holding the curve parameters.
    pub node: NodeId,
    /// Geo the curve was generated from. `None` when the asset itself is the curve.
    pub geo: Option<GeoKey>,
    /// Curve parameters.
    pub parameters: ParameterSet,
}

/// Host-side settings of one volume tile.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeCache {
    /// Owning geo.
    pub geo: GeoKey,
    /// Owning object name.
    pub object_name: String,
    /// Owning geo name.
    pub geo_name: String,
    /// Tile index.
    pub tile: u32,
    /// Current settings.
    pub settings: VolumeTileSettings,
    /// Settings changed since the last cook.
    pub dirty: bool,
}

impl VolumeCache {
    /// Replaces the settings and marks the cache dirty.
    pub fn apply(&mut self, settings: VolumeTileSettings) {
        self.settings = settings;
        self.dirty = true;
    }

    /// Restores default settings and marks the cache dirty.
    pub fn reset(&mut self) {
        self.apply(VolumeTileSettings::default());
    }
}

/// Painted attribute values of one editable geo.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeStore {
    /// Owning geo.
    pub geo: Option<GeoKey>,
    /// Session node of the geo.
    pub geo_node: Option<NodeId>,
    values: BTreeMap<String, Vec<f32>>,
    dirty: BTreeSet<String>,
}

impl AttributeStore {
    pub(crate) fn for_geo(geo: GeoKey, node: NodeId) -> Self {
        Self {
            geo: Some(geo),
            geo_node: Some(node),
            ..Default::default()
        }
    }

    /// Sets an attribute and marks it dirty.
    pub fn set(&mut self, name: &str, values: Vec<f32>) {
        self.values.insert(name.to_string(), values);
        self.dirty.insert(name.to_string());
    }

    /// Reads an attribute.
    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Returns `true` if some attribute waits for upload.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Marks every attribute for upload.
    pub fn mark_all_dirty(&mut self) {
        self.dirty = self.values.keys().cloned().collect();
    }

    /// Uploads dirty attributes. Returns the number of attributes sent.
    pub fn upload(&mut self, session: &mut dyn Session) -> SessionResult<usize> {
        let Some(node) = self.geo_node else {
            return Ok(0);
        };
        let mut sent = 0;
        let pending: Vec<String> = self.dirty.iter().cloned().collect();
        for name in pending {
            if let Some(values) = self.values.get(&name) {
                session.set_attribute_values(node, &name, values)?;
                sent += 1;
            }
            self.dirty.remove(&name);
        }
        Ok(sent)
    }
}
