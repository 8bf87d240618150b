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

//! Plain records exchanged with a session.

use crate::asset::AssetKey;
use crate::math::Transform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

macro_rules! session_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

session_id!(
    /// A node living inside the session.
    NodeId(i32)
);
session_id!(
    /// A loaded definition library.
    LibraryId(i32)
);
session_id!(
    /// The identity of one session process. Changes when the session restarts.
    SessionId(u64)
);
session_id!(
    /// A material known to the session.
    MaterialId(i32)
);

/// Where a definition library is loaded from.
#[derive(Debug, Clone, Copy)]
pub enum LibrarySource<'a> {
    /// Let the session read the file itself.
    File(&'a Path),
    /// A buffer the host already read.
    Memory {
        /// Name used to identify the library in logs and errors.
        name: &'a str,
        /// Raw library bytes.
        bytes: &'a [u8],
    },
}

impl fmt::Display for LibrarySource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibrarySource::File(path) => write!(f, "{}", path.display()),
            LibrarySource::Memory { name, bytes } => {
                write!(f, "{name} (memory, {} bytes)", bytes.len())
            }
        }
    }
}

/// Result of polling the session's cook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookState {
    /// Still evaluating.
    Running,
    /// Finished without problems.
    ReadyClean,
    /// Finished with recoverable errors.
    ReadyWithWarnings,
    /// Finished with errors that invalidate the result.
    ReadyWithFatalErrors,
}

impl CookState {
    /// Returns `true` once the cook has finished, whatever the outcome.
    pub fn is_ready(self) -> bool {
        !matches!(self, CookState::Running)
    }
}

/// Options forwarded with a cook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookNodeOptions {
    /// Also cook templated geometry.
    pub cook_templated_geos: bool,
    /// Split geometry parts by primitive group.
    pub split_geos_by_group: bool,
}

impl Default for CookNodeOptions {
    fn default() -> Self {
        Self {
            cook_templated_geos: true,
            split_geos_by_group: false,
        }
    }
}

/// Basic node metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node id.
    pub id: NodeId,
    /// Node name.
    pub name: String,
    /// Parent node, if any.
    pub parent: Option<NodeId>,
    /// Number of parameters on the node.
    pub parameter_count: usize,
}

/// Metadata about an instantiated asset node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Display name of the asset.
    pub name: String,
    /// Fully qualified operator the node was created from.
    pub operator_name: String,
    /// Help text shipped with the definition.
    pub help: String,
    /// Number of geometry inputs the definition exposes.
    pub geo_input_count: usize,
    /// Number of interactive handles.
    pub handle_count: usize,
}

/// The kind of a generated geometry node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoKind {
    /// Plain generated mesh.
    Mesh,
    /// An editable curve.
    Curve,
    /// A terrain-like volume split in tiles.
    Heightfield {
        /// Number of tiles.
        tiles: u32,
    },
    /// Geometry whose attributes the host may paint.
    Editable,
}

/// One generated part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    /// Part name.
    pub name: String,
    /// Material assigned to the part.
    pub material: Option<MaterialId>,
    /// Number of points in the part.
    pub point_count: u32,
}

/// One geometry node below an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    /// Geo name.
    pub name: String,
    /// Session node for the geo.
    pub node: NodeId,
    /// Kind of geometry.
    pub kind: GeoKind,
    /// Generated parts.
    pub parts: Vec<PartInfo>,
}

/// One object node generated by an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object name. Not guaranteed to be unique.
    pub name: String,
    /// Session node for the object.
    pub node: NodeId,
    /// Transform relative to the asset.
    pub transform: Transform,
    /// Names of objects this one instances.
    pub instanced_objects: Vec<String>,
    /// Geometry nodes below the object.
    pub geos: Vec<GeoInfo>,
}

/// Metadata about a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialInfo {
    /// Material id.
    pub id: MaterialId,
    /// Material name.
    pub name: String,
    /// Texture the material samples, if any.
    pub texture: Option<String>,
}

/// Metadata about an interactive handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleInfo {
    /// Handle name.
    pub name: String,
    /// Manipulator type, such as `xform`.
    pub kind: String,
    /// Parameters driven by the handle.
    pub bound_parameters: Vec<String>,
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParmValue {
    /// Integer value.
    Int(i32),
    /// Float value.
    Float(f32),
    /// String value.
    Text(String),
    /// Toggle value.
    Toggle(bool),
}

/// Parameter values keyed by name.
pub type ParmValues = BTreeMap<String, ParmValue>;

/// A structural change to a multi-instance parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParmModifier {
    /// Insert an instance at `index`.
    InsertInstance {
        /// The list parameter.
        parameter: String,
        /// Insertion index.
        index: usize,
    },
    /// Remove the instance at `index`.
    RemoveInstance {
        /// The list parameter.
        parameter: String,
        /// Removal index.
        index: usize,
    },
}

/// What feeds a geometry input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputSource {
    /// Disconnected.
    #[default]
    None,
    /// The output of another registered asset.
    Asset(AssetKey),
    /// Named host geometry.
    Geometry(String),
}

/// Connection description for one input slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputConnection {
    /// What is connected.
    pub source: InputSource,
    /// Keep the source's world transform instead of merging in local space.
    pub keep_world_transform: bool,
}

impl InputConnection {
    /// A connection to another asset.
    pub fn asset(key: AssetKey) -> Self {
        Self {
            source: InputSource::Asset(key),
            keep_world_transform: false,
        }
    }

    /// A connection to named host geometry.
    pub fn geometry(name: impl Into<String>) -> Self {
        Self {
            source: InputSource::Geometry(name.into()),
            keep_world_transform: false,
        }
    }
}
