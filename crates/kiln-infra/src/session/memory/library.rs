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

//! Library and definition descriptions evaluated by the memory session.
//!
//! A library is a RON document:
//!
//! ```ron
//! (
//!     name: "rocks",
//!     definitions: [
//!         (
//!             operator: "kiln::rock",
//!             label: "Rock",
//!             parameters: { "size": Float(1.0) },
//!             inputs: ["ground"],
//!             objects: [
//!                 (name: "rock", geos: [(name: "mesh", parts: [(name: "body", point_count: 8)])]),
//!             ],
//!         ),
//!     ],
//! )
//! ```

use kiln_core::session::{
    GeoKind, HandleInfo, MaterialId, MaterialInfo, ParmValue, ParmValues,
};
use kiln_core::Transform;
use serde::{Deserialize, Serialize};

pub use kiln_core::asset::{CURVE_OPERATOR, INPUT_OPERATOR};

/// A generated part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTemplate {
    /// Part name.
    pub name: String,
    /// Material id, resolved against the definition's materials.
    #[serde(default)]
    pub material: Option<i32>,
    /// Number of points.
    #[serde(default)]
    pub point_count: u32,
}

/// A generated geometry node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTemplate {
    /// Geo name.
    pub name: String,
    /// Geometry kind.
    #[serde(default = "mesh_kind")]
    pub kind: GeoKind,
    /// Parameters of the geo node itself (used by curve geos).
    #[serde(default)]
    pub parameters: ParmValues,
    /// Generated parts.
    #[serde(default)]
    pub parts: Vec<PartTemplate>,
}

fn mesh_kind() -> GeoKind {
    GeoKind::Mesh
}

/// A generated object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTemplate {
    /// Object name.
    pub name: String,
    /// Transform relative to the asset.
    #[serde(default)]
    pub transform: Transform,
    /// Names of the objects this one instances.
    #[serde(default)]
    pub instanced_objects: Vec<String>,
    /// Geometry nodes.
    #[serde(default)]
    pub geos: Vec<GeoTemplate>,
}

impl ObjectTemplate {
    /// An object with a single mesh geo carrying one part.
    pub fn single_part(name: &str, point_count: u32) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::IDENTITY,
            instanced_objects: Vec::new(),
            geos: vec![GeoTemplate {
                name: "geo".to_string(),
                kind: GeoKind::Mesh,
                parameters: ParmValues::new(),
                parts: vec![PartTemplate {
                    name: name.to_string(),
                    material: None,
                    point_count,
                }],
            }],
        }
    }
}

/// One operator a library defines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Fully qualified operator name.
    pub operator: String,
    /// Display name.
    #[serde(default)]
    pub label: String,
    /// Help text.
    #[serde(default)]
    pub help: String,
    /// Default parameter values.
    #[serde(default)]
    pub parameters: ParmValues,
    /// Geometry input names.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Exposed handles.
    #[serde(default)]
    pub handles: Vec<HandleInfo>,
    /// Materials the objects may reference.
    #[serde(default)]
    pub materials: Vec<MaterialInfo>,
    /// Objects produced by a cook.
    #[serde(default)]
    pub objects: Vec<ObjectTemplate>,
    /// Polls reporting `Running` before a cook completes.
    #[serde(default)]
    pub cook_polls: u32,
}

impl Definition {
    /// A definition with no inputs, handles, or materials.
    pub fn new(operator: &str, parameters: ParmValues, objects: Vec<ObjectTemplate>) -> Self {
        Self {
            operator: operator.to_string(),
            label: operator.rsplit("::").next().unwrap_or(operator).to_string(),
            help: String::new(),
            parameters,
            inputs: Vec::new(),
            handles: Vec::new(),
            materials: Vec::new(),
            objects,
            cook_polls: 0,
        }
    }

    /// Looks up a material declared by this definition.
    pub fn material(&self, id: MaterialId) -> Option<&MaterialInfo> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub(crate) fn builtin_curve() -> Self {
        let mut parameters = ParmValues::new();
        parameters.insert("coords".to_string(), ParmValue::Text(String::new()));
        parameters.insert("closed".to_string(), ParmValue::Toggle(false));
        Self::new(CURVE_OPERATOR, parameters, vec![ObjectTemplate::single_part("curve", 0)])
    }

    pub(crate) fn builtin_input() -> Self {
        Self::new(
            INPUT_OPERATOR,
            ParmValues::new(),
            vec![ObjectTemplate::single_part("input", 0)],
        )
    }
}

/// A named collection of definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    /// Library name.
    pub name: String,
    /// Definitions, in declaration order.
    pub definitions: Vec<Definition>,
}

impl Library {
    /// Parses a library from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Serializes the library to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Looks up a definition by operator name.
    pub fn definition(&self, operator: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.operator == operator)
    }
}
