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

//! Materials referenced by generated parts.

use kiln_core::session::{MaterialId, Session, SessionResult};
use std::collections::{BTreeMap, BTreeSet};

/// Host-side copy of a session material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialData {
    /// Session id.
    pub id: MaterialId,
    /// Material name.
    pub name: String,
    /// Texture sampled by the material.
    pub texture: Option<String>,
}

/// Materials known to one asset.
#[derive(Debug, Clone, Default)]
pub struct MaterialCache {
    materials: BTreeMap<MaterialId, MaterialData>,
}

impl MaterialCache {
    /// Fetches or refreshes every material in `ids`.
    pub fn refresh(&mut self, session: &dyn Session, ids: &BTreeSet<MaterialId>) -> SessionResult<()> {
        for id in ids {
            let info = session.material_info(*id)?;
            self.materials.insert(
                *id,
                MaterialData {
                    id: info.id,
                    name: info.name,
                    texture: info.texture,
                },
            );
        }
        Ok(())
    }

    /// Drops materials not in `referenced`. Returns how many were dropped.
    pub fn retain_referenced(&mut self, referenced: &BTreeSet<MaterialId>) -> usize {
        let before = self.materials.len();
        self.materials.retain(|id, _| referenced.contains(id));
        before - self.materials.len()
    }

    /// Looks up a material.
    pub fn get(&self, id: MaterialId) -> Option<&MaterialData> {
        self.materials.get(&id)
    }

    /// Number of cached materials.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Removes every material.
    pub fn clear(&mut self) {
        self.materials.clear();
    }
}
