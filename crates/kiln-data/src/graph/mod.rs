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

//! Arena storage for everything an asset generates.
//!
//! Objects own geos, geos own parts. Curves, volume caches, and attribute
//! stores hang off geos. Children keep the key of their parent instead of a
//! reference, and removing a parent removes everything below it.

mod entities;

pub use entities::*;

use kiln_core::event::OutputRef;
use kiln_core::session::{GeoKind, MaterialId, NodeId, ObjectInfo};
use kiln_core::Transform;
use slotmap::SlotMap;
use std::collections::BTreeSet;

/// The generated entities of one asset.
#[derive(Debug, Default)]
pub struct AssetGraph {
    objects: SlotMap<ObjectKey, ObjectNode>,
    order: Vec<ObjectKey>,
    geos: SlotMap<GeoKey, GeoNode>,
    parts: SlotMap<PartKey, PartData>,
    curves: SlotMap<CurveKey, Curve>,
    curve_order: Vec<CurveKey>,
    volumes: SlotMap<VolumeKey, VolumeCache>,
    attribute_stores: SlotMap<AttributeStoreKey, AttributeStore>,
}

impl AssetGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Objects ---

    /// Adds an object at the end of the object order.
    pub fn insert_object(&mut self, name: &str, node: NodeId, transform: Transform) -> ObjectKey {
        let key = self.objects.insert(ObjectNode {
            name: name.to_string(),
            node,
            transform,
            geos: Vec::new(),
            instanced_names: Vec::new(),
            instances: Vec::new(),
        });
        self.order.push(key);
        key
    }

    /// Updates an object's identity fields in place.
    pub fn update_object(&mut self, key: ObjectKey, name: &str, node: NodeId, transform: Transform) -> bool {
        match self.objects.get_mut(key) {
            Some(object) => {
                object.name = name.to_string();
                object.node = node;
                object.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Removes an object and everything below it.
    pub fn remove_object(&mut self, key: ObjectKey) -> Option<ObjectNode> {
        let object = self.objects.remove(key)?;
        self.order.retain(|k| *k != key);
        for geo in &object.geos {
            self.remove_geo(*geo);
        }
        for other in self.objects.values_mut() {
            other.instances.retain(|k| *k != key);
        }
        Some(object)
    }

    /// Reorders objects. Keys not in the graph are ignored, objects missing
    /// from `order` keep their relative order at the end.
    pub fn set_object_order(&mut self, order: &[ObjectKey]) {
        let mut next: Vec<ObjectKey> = order
            .iter()
            .copied()
            .filter(|k| self.objects.contains_key(*k))
            .collect();
        for key in &self.order {
            if !next.contains(key) {
                next.push(*key);
            }
        }
        self.order = next;
    }

    /// Looks up an object.
    pub fn object(&self, key: ObjectKey) -> Option<&ObjectNode> {
        self.objects.get(key)
    }

    /// Objects in order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &ObjectNode)> {
        self.order.iter().filter_map(|k| self.objects.get(*k).map(|o| (*k, o)))
    }

    /// Object keys in order.
    pub fn object_keys(&self) -> &[ObjectKey] {
        &self.order
    }

    /// Number of objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// First object named `name`.
    pub fn object_by_name(&self, name: &str) -> Option<ObjectKey> {
        self.objects().find(|(_, o)| o.name == name).map(|(k, _)| k)
    }

    /// Object names in order.
    pub fn object_names(&self) -> Vec<String> {
        self.objects().map(|(_, o)| o.name.clone()).collect()
    }

    // --- Geometry ---

    /// Brings the geos and parts of `object` in line with `info`.
    ///
    /// Geos are reused by name so the curves, volume caches and attribute
    /// stores attached to them survive. Parts are always regenerated.
    pub fn apply_geometry(&mut self, object: ObjectKey, info: &ObjectInfo) {
        let Some(node) = self.objects.get_mut(object) else {
            return;
        };
        node.instanced_names = info.instanced_objects.clone();
        let previous = std::mem::take(&mut node.geos);
        let object_name = node.name.clone();

        let mut kept = Vec::with_capacity(info.geos.len());
        for geo_info in &info.geos {
            let reused = previous.iter().copied().find(|k| {
                !kept.contains(k) && self.geos.get(*k).is_some_and(|g| g.name == geo_info.name)
            });
            let key = match reused {
                Some(key) => {
                    let parts = match self.geos.get_mut(key) {
                        Some(geo) => {
                            geo.node = geo_info.node;
                            geo.kind = geo_info.kind;
                            std::mem::take(&mut geo.parts)
                        }
                        None => Vec::new(),
                    };
                    for part in parts {
                        self.parts.remove(part);
                    }
                    key
                }
                None => self.geos.insert(GeoNode {
                    object,
                    name: geo_info.name.clone(),
                    node: geo_info.node,
                    kind: geo_info.kind,
                    parts: Vec::new(),
                }),
            };

            let parts: Vec<PartKey> = geo_info
                .parts
                .iter()
                .map(|p| {
                    self.parts.insert(PartData {
                        geo: key,
                        name: p.name.clone(),
                        material: p.material,
                        output: GeneratedOutput {
                            point_count: p.point_count,
                        },
                    })
                })
                .collect();
            if let Some(geo) = self.geos.get_mut(key) {
                geo.parts = parts;
            }

            self.sync_geo_attachments(key, &object_name, &geo_info.name, geo_info.node, geo_info.kind);
            kept.push(key);
        }

        for stale in previous.into_iter().filter(|k| !kept.contains(k)) {
            self.remove_geo(stale);
        }
        if let Some(node) = self.objects.get_mut(object) {
            node.geos = kept;
        }
    }

    /// Looks up a geo.
    pub fn geo(&self, key: GeoKey) -> Option<&GeoNode> {
        self.geos.get(key)
    }

    /// Geo named `geo_name` below the object named `object_name`.
    pub fn geo_by_name(&self, object_name: &str, geo_name: &str) -> Option<GeoKey> {
        self.objects()
            .filter(|(_, o)| o.name == object_name)
            .flat_map(|(_, o)| o.geos.iter().copied())
            .find(|k| self.geos.get(*k).is_some_and(|g| g.name == geo_name))
    }

    /// Looks up a part.
    pub fn part(&self, key: PartKey) -> Option<&PartData> {
        self.parts.get(key)
    }

    /// Number of parts across all objects.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn remove_geo(&mut self, key: GeoKey) {
        let Some(geo) = self.geos.remove(key) else {
            return;
        };
        for part in geo.parts {
            self.parts.remove(part);
        }
        self.curves.retain(|_, c| c.geo != Some(key));
        let curves = &self.curves;
        self.curve_order.retain(|k| curves.contains_key(*k));
        self.volumes.retain(|_, v| v.geo != key);
        self.attribute_stores.retain(|_, s| s.geo != Some(key));
    }

    fn sync_geo_attachments(&mut self, geo: GeoKey, object_name: &str, geo_name: &str, node: NodeId, kind: GeoKind) {
        let wants_curve = kind == GeoKind::Curve;
        let curve = self.curves.iter().find(|(_, c)| c.geo == Some(geo)).map(|(k, _)| k);
        match (wants_curve, curve) {
            (true, Some(key)) => {
                if let Some(curve) = self.curves.get_mut(key) {
                    curve.node = node;
                    curve.name = geo_name.to_string();
                }
            }
            (true, None) => {
                self.insert_curve(geo_name, node, Some(geo));
            }
            (false, Some(key)) => {
                self.remove_curve(key);
            }
            (false, None) => {}
        }

        let tiles = match kind {
            GeoKind::Heightfield { tiles } => tiles,
            _ => 0,
        };
        self.volumes.retain(|_, v| v.geo != geo || v.tile < tiles);
        for tile in 0..tiles {
            let exists = self.volumes.values().any(|v| v.geo == geo && v.tile == tile);
            if !exists {
                self.volumes.insert(VolumeCache {
                    geo,
                    object_name: object_name.to_string(),
                    geo_name: geo_name.to_string(),
                    tile,
                    settings: Default::default(),
                    dirty: false,
                });
            }
        }
        for volume in self.volumes.values_mut().filter(|v| v.geo == geo) {
            volume.object_name = object_name.to_string();
            volume.geo_name = geo_name.to_string();
        }

        let store = self
            .attribute_stores
            .iter()
            .find(|(_, s)| s.geo == Some(geo))
            .map(|(k, _)| k);
        match (kind == GeoKind::Editable, store) {
            (true, Some(key)) => {
                if let Some(store) = self.attribute_stores.get_mut(key) {
                    store.geo_node = Some(node);
                }
            }
            (true, None) => {
                self.attribute_stores.insert(AttributeStore::for_geo(geo, node));
            }
            (false, Some(key)) => {
                self.attribute_stores.remove(key);
            }
            (false, None) => {}
        }
    }

    // --- Instances and materials ---

    /// Resolves every object's instanced names to object keys.
    pub fn resolve_instances(&mut self) {
        let resolved: Vec<(ObjectKey, Vec<ObjectKey>)> = self
            .objects()
            .map(|(key, object)| {
                let targets = object
                    .instanced_names
                    .iter()
                    .filter_map(|name| self.object_by_name(name))
                    .collect();
                (key, targets)
            })
            .collect();
        for (key, targets) in resolved {
            if let Some(object) = self.objects.get_mut(key) {
                object.instances = targets;
            }
        }
    }

    /// Materials bound to at least one part.
    pub fn referenced_materials(&self) -> BTreeSet<MaterialId> {
        self.parts.values().filter_map(|p| p.material).collect()
    }

    // --- Curves ---

    /// Adds a curve with uninitialized parameters.
    pub fn insert_curve(&mut self, name: &str, node: NodeId, geo: Option<GeoKey>) -> CurveKey {
        let key = self.curves.insert(Curve {
            name: name.to_string(),
            node,
            geo,
            parameters: Default::default(),
        });
        self.curve_order.push(key);
        key
    }

    /// Removes a curve.
    pub fn remove_curve(&mut self, key: CurveKey) -> Option<Curve> {
        self.curve_order.retain(|k| *k != key);
        self.curves.remove(key)
    }

    /// Curves in creation order.
    pub fn curves(&self) -> impl Iterator<Item = (CurveKey, &Curve)> {
        self.curve_order.iter().filter_map(|k| self.curves.get(*k).map(|c| (*k, c)))
    }

    /// Curve keys in creation order.
    pub fn curve_keys(&self) -> &[CurveKey] {
        &self.curve_order
    }

    /// Mutable access to a curve.
    pub fn curve_mut(&mut self, key: CurveKey) -> Option<&mut Curve> {
        self.curves.get_mut(key)
    }

    /// First curve named `name`.
    pub fn curve_by_name(&self, name: &str) -> Option<CurveKey> {
        self.curves().find(|(_, c)| c.name == name).map(|(k, _)| k)
    }

    // --- Volumes and attribute stores ---

    /// Volume cache for a tile.
    pub fn volume_by_tile(&self, object_name: &str, geo_name: &str, tile: u32) -> Option<VolumeKey> {
        self.volumes
            .iter()
            .find(|(_, v)| v.object_name == object_name && v.geo_name == geo_name && v.tile == tile)
            .map(|(k, _)| k)
    }

    /// All volume caches.
    pub fn volumes(&self) -> impl Iterator<Item = (VolumeKey, &VolumeCache)> {
        self.volumes.iter()
    }

    /// Mutable access to all volume caches.
    pub fn volumes_mut(&mut self) -> impl Iterator<Item = &mut VolumeCache> {
        self.volumes.values_mut()
    }

    /// Mutable access to one volume cache.
    pub fn volume_mut(&mut self, key: VolumeKey) -> Option<&mut VolumeCache> {
        self.volumes.get_mut(key)
    }

    /// Attribute store attached to a geo.
    pub fn attribute_store_for(&self, geo: GeoKey) -> Option<AttributeStoreKey> {
        self.attribute_stores
            .iter()
            .find(|(_, s)| s.geo == Some(geo))
            .map(|(k, _)| k)
    }

    /// Mutable access to one attribute store.
    pub fn attribute_store_mut(&mut self, key: AttributeStoreKey) -> Option<&mut AttributeStore> {
        self.attribute_stores.get_mut(key)
    }

    /// Mutable access to all attribute stores.
    pub fn attribute_stores_mut(&mut self) -> impl Iterator<Item = &mut AttributeStore> {
        self.attribute_stores.values_mut()
    }

    /// Number of attribute stores.
    pub fn attribute_store_count(&self) -> usize {
        self.attribute_stores.len()
    }

    // --- Whole graph ---

    /// Outputs in object, geo, part order.
    pub fn outputs(&self) -> Vec<OutputRef> {
        let mut outputs = Vec::new();
        for (_, object) in self.objects() {
            for geo in object.geos.iter().filter_map(|k| self.geos.get(*k)) {
                for part in geo.parts.iter().filter_map(|k| self.parts.get(*k)) {
                    outputs.push(OutputRef {
                        object: object.name.clone(),
                        geo: geo.name.clone(),
                        part: part.name.clone(),
                        point_count: part.output.point_count,
                    });
                }
            }
        }
        outputs
    }

    /// Removes everything, including curves not attached to a geo.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if nothing was generated.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.curves.is_empty()
    }
}
