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

//! The contract between an asset controller and the external engine session.
//!
//! A session is a stateful, process-scoped connection. Several assets may
//! share one session; each controller only issues mutating calls for nodes it
//! created itself. No locking is involved: the host drives every controller
//! from a single tick loop and hands the session over explicitly.

mod error;
mod types;

pub use error::*;
pub use types::*;

use crate::asset::AssetKey;
use crate::math::Transform;

/// A connection to one external content-generation session.
///
/// Every call may be slow. Only [`Session::poll_cook_state`] is expected to
/// be called repeatedly; everything else runs to completion.
pub trait Session {
    /// Identity of the running session process.
    fn id(&self) -> SessionId;

    /// Returns `true` while the session is connected and usable.
    fn is_valid(&self) -> bool;

    /// Loads a definition library.
    fn load_library(&mut self, source: LibrarySource<'_>, overwrite: bool)
        -> SessionResult<LibraryId>;

    /// Lists the operator names defined in a loaded library.
    fn enumerate_definitions(&self, library: LibraryId) -> SessionResult<Vec<String>>;

    /// Creates a node from `operator` under `parent` (top level when `None`).
    fn create_node(&mut self, parent: Option<NodeId>, operator: &str) -> SessionResult<NodeId>;

    /// Starts a cook of `node`. The result is observed through polling.
    fn cook_node(&mut self, node: NodeId, options: &CookNodeOptions) -> SessionResult<()>;

    /// Polls the cook of `node`. A node with no cook in flight reports ready.
    fn poll_cook_state(&mut self, node: NodeId) -> SessionResult<CookState>;

    /// Returns the session's status message for the last cook of `node`.
    fn cook_status_message(&self, node: NodeId) -> String;

    /// Returns basic node metadata.
    fn node_info(&self, node: NodeId) -> SessionResult<NodeInfo>;

    /// Returns asset metadata for an instantiated definition.
    fn asset_info(&self, node: NodeId) -> SessionResult<AssetInfo>;

    /// Reads the transform of an object node.
    fn object_transform(&self, node: NodeId) -> SessionResult<Transform>;

    /// Writes the transform of an object node.
    fn set_object_transform(&mut self, node: NodeId, transform: &Transform) -> SessionResult<()>;

    /// Deletes a node and everything below it.
    fn delete_node(&mut self, node: NodeId) -> SessionResult<()>;

    /// Records that `key` owns `node`.
    fn register_asset(&mut self, node: NodeId, key: AssetKey) -> SessionResult<()>;

    /// Forgets the owner of `node`, if any.
    fn unregister_asset(&mut self, node: NodeId);

    /// Returns `true` if `node` is registered to `key`.
    fn is_asset_registered(&self, node: NodeId, key: AssetKey) -> bool;

    /// Returns `true` if `node` exists.
    fn is_node_valid(&self, node: NodeId) -> bool;

    /// Queries the objects an asset node currently generates.
    fn object_infos(&self, node: NodeId) -> SessionResult<Vec<ObjectInfo>>;

    /// Number of times the node has cooked. Any change means the session
    /// changed the node on its own.
    fn total_cook_count(&self, node: NodeId) -> SessionResult<u32>;

    /// Reads every parameter value of `node`.
    fn parameter_values(&self, node: NodeId) -> SessionResult<ParmValues>;

    /// Writes the given parameter values to `node`.
    fn set_parameter_values(&mut self, node: NodeId, values: &ParmValues) -> SessionResult<()>;

    /// Applies a structural change to a list parameter.
    fn apply_parameter_modifier(&mut self, node: NodeId, modifier: &ParmModifier)
        -> SessionResult<()>;

    /// Exports the parameter state of `node` as an opaque blob.
    fn parameter_preset(&self, node: NodeId) -> SessionResult<Vec<u8>>;

    /// Imports a blob produced by [`Session::parameter_preset`].
    fn set_parameter_preset(&mut self, node: NodeId, preset: &[u8]) -> SessionResult<()>;

    /// Names of the geometry inputs of an asset node.
    fn input_names(&self, node: NodeId) -> SessionResult<Vec<String>>;

    /// Connects (or disconnects) geometry input `index` of `node`.
    fn connect_input(
        &mut self,
        node: NodeId,
        index: usize,
        connection: &InputConnection,
    ) -> SessionResult<()>;

    /// Returns material metadata.
    fn material_info(&self, material: MaterialId) -> SessionResult<MaterialInfo>;

    /// Returns the handles exposed by an asset node.
    fn handle_infos(&self, node: NodeId) -> SessionResult<Vec<HandleInfo>>;

    /// Writes a float attribute on a geometry node.
    fn set_attribute_values(&mut self, geo: NodeId, name: &str, values: &[f32])
        -> SessionResult<()>;
}
