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

//! Deterministic in-process session.
//!
//! Evaluates definitions loaded from RON libraries. Cooking a node replays the
//! definition's object templates (or a generator registered for the operator)
//! and reports completion after a configurable number of polls. Faults can be
//! injected for the next cook, and the session can be restarted or
//! disconnected to exercise recovery paths.

mod library;

pub use library::*;

use kiln_core::session::{
    AssetInfo, CookNodeOptions, CookState, GeoInfo, HandleInfo, InputConnection, InputSource,
    LibraryId, LibrarySource, MaterialId, MaterialInfo, NodeId, NodeInfo, ObjectInfo, ParmModifier,
    ParmValue, ParmValues, PartInfo, Session, SessionError, SessionId, SessionResult,
};
use kiln_core::{AssetKey, Transform};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

type ObjectGenerator = Box<dyn Fn(&ParmValues) -> Vec<ObjectTemplate>>;

#[derive(Debug, Clone, PartialEq)]
enum NodeRole {
    Asset { operator: String },
    Object,
    Geo,
}

#[derive(Debug, Clone)]
struct NodeRecord {
    name: String,
    parent: Option<NodeId>,
    role: NodeRole,
    parameters: ParmValues,
    transform: Transform,
    inputs: BTreeMap<usize, InputConnection>,
    objects: Vec<ObjectInfo>,
    attributes: BTreeMap<String, Vec<f32>>,
    cook_count: u32,
    status_message: String,
}

impl NodeRecord {
    fn new(name: &str, parent: Option<NodeId>, role: NodeRole, parameters: ParmValues) -> Self {
        Self {
            name: name.to_string(),
            parent,
            role,
            parameters,
            transform: Transform::IDENTITY,
            inputs: BTreeMap::new(),
            objects: Vec::new(),
            attributes: BTreeMap::new(),
            cook_count: 0,
            status_message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingCook {
    node: NodeId,
    polls_left: u32,
}

#[derive(Debug, Clone)]
enum CookFault {
    Warning(String),
    Fatal(String),
}

/// A session living entirely in memory.
pub struct MemorySession {
    id: SessionId,
    connected: bool,
    next_node: i32,
    next_library: i32,
    installed: HashMap<PathBuf, Library>,
    libraries: BTreeMap<LibraryId, Library>,
    builtins: Vec<Definition>,
    generators: HashMap<String, ObjectGenerator>,
    nodes: BTreeMap<NodeId, NodeRecord>,
    registry: BTreeMap<NodeId, AssetKey>,
    pending: Option<PendingCook>,
    finished: BTreeMap<NodeId, CookState>,
    next_fault: Option<CookFault>,
    library_loads: usize,
    cook_calls: usize,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    /// Creates a connected session with only the built-in operators.
    pub fn new() -> Self {
        let mut session = Self {
            id: SessionId(1),
            connected: true,
            next_node: 1,
            next_library: 1,
            installed: HashMap::new(),
            libraries: BTreeMap::new(),
            builtins: vec![Definition::builtin_curve(), Definition::builtin_input()],
            generators: HashMap::new(),
            nodes: BTreeMap::new(),
            registry: BTreeMap::new(),
            pending: None,
            finished: BTreeMap::new(),
            next_fault: None,
            library_loads: 0,
            cook_calls: 0,
        };
        session.set_object_generator(CURVE_OPERATOR, |parameters| {
            let points = match parameters.get("coords") {
                Some(ParmValue::Text(coords)) => coords.split_whitespace().count() as u32,
                _ => 0,
            };
            vec![ObjectTemplate::single_part("curve", points)]
        });
        log::info!("MemorySession: session {} started.", session.id);
        session
    }

    /// Makes `library` loadable from `path` without touching the file system.
    pub fn install_library(&mut self, path: impl Into<PathBuf>, library: Library) {
        self.installed.insert(path.into(), library);
    }

    /// Overrides the objects produced when `operator` cooks.
    pub fn set_object_generator<F>(&mut self, operator: &str, generator: F)
    where
        F: Fn(&ParmValues) -> Vec<ObjectTemplate> + 'static,
    {
        self.generators.insert(operator.to_string(), Box::new(generator));
    }

    /// Makes the next cook finish with fatal errors.
    pub fn fail_next_cook(&mut self, message: &str) {
        self.next_fault = Some(CookFault::Fatal(message.to_string()));
    }

    /// Makes the next cook finish with recoverable errors.
    pub fn warn_next_cook(&mut self, message: &str) {
        self.next_fault = Some(CookFault::Warning(message.to_string()));
    }

    /// Deletes a node behind its owner's back.
    pub fn invalidate_node(&mut self, node: NodeId) {
        self.remove_subtree(node);
    }

    /// Cooks a node as if the user changed it inside the session.
    pub fn simulate_external_cook(&mut self, node: NodeId) -> SessionResult<()> {
        self.record(node)?;
        self.regenerate(node)?;
        if let Some(record) = self.nodes.get_mut(&node) {
            record.cook_count += 1;
        }
        Ok(())
    }

    /// Restarts the session process. Every node and loaded library is lost.
    pub fn restart(&mut self) {
        self.id = SessionId(self.id.0 + 1);
        self.connected = true;
        self.libraries.clear();
        self.nodes.clear();
        self.registry.clear();
        self.pending = None;
        self.finished.clear();
        self.next_fault = None;
        log::info!("MemorySession: restarted as session {}.", self.id);
    }

    /// Drops the connection. Every call fails until [`MemorySession::restart`].
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Number of successful library loads.
    pub fn library_load_count(&self) -> usize {
        self.library_loads
    }

    /// Number of cooks started.
    pub fn cook_call_count(&self) -> usize {
        self.cook_calls
    }

    /// Number of live nodes, including generated object and geo nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node registered to `key`, if any.
    pub fn node_for_asset(&self, key: AssetKey) -> Option<NodeId> {
        self.registry
            .iter()
            .find(|(_, k)| **k == key)
            .map(|(node, _)| *node)
    }

    /// Input connections currently set on `node`.
    pub fn input_connections(&self, node: NodeId) -> BTreeMap<usize, InputConnection> {
        self.nodes
            .get(&node)
            .map(|r| r.inputs.clone())
            .unwrap_or_default()
    }

    /// Attribute values last written to a geo node.
    pub fn attribute_values(&self, geo: NodeId, name: &str) -> Option<Vec<f32>> {
        self.nodes.get(&geo)?.attributes.get(name).cloned()
    }

    fn ensure_connected(&self) -> SessionResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(SessionError::Unavailable)
        }
    }

    fn record(&self, node: NodeId) -> SessionResult<&NodeRecord> {
        self.ensure_connected()?;
        self.nodes.get(&node).ok_or(SessionError::InvalidNode(node))
    }

    fn record_mut(&mut self, node: NodeId) -> SessionResult<&mut NodeRecord> {
        self.ensure_connected()?;
        self.nodes
            .get_mut(&node)
            .ok_or(SessionError::InvalidNode(node))
    }

    fn definition(&self, operator: &str) -> Option<&Definition> {
        self.builtins
            .iter()
            .find(|d| d.operator == operator)
            .or_else(|| {
                self.libraries
                    .values()
                    .rev()
                    .find_map(|library| library.definition(operator))
            })
    }

    fn definition_of(&self, node: NodeId) -> SessionResult<&Definition> {
        match &self.record(node)?.role {
            NodeRole::Asset { operator } => self
                .definition(operator)
                .ok_or_else(|| SessionError::NotFound(operator.clone())),
            _ => Err(SessionError::call_failed("definition", "not an asset node")),
        }
    }

    fn allocate(&mut self, record: NodeRecord) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, record);
        id
    }

    fn remove_subtree(&mut self, node: NodeId) {
        let children: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, r)| r.parent == Some(node))
            .map(|(id, _)| *id)
            .collect();
        for child in children {
            self.remove_subtree(child);
        }
        self.nodes.remove(&node);
        self.registry.remove(&node);
    }

    fn parse_library(source: &LibrarySource<'_>, text: &str) -> SessionResult<Library> {
        Library::from_ron_str(text).map_err(|e| SessionError::LoadFailed {
            source: source.to_string(),
            reason: e.to_string(),
        })
    }

    fn read_library(&self, source: &LibrarySource<'_>) -> SessionResult<Library> {
        match source {
            LibrarySource::File(path) => {
                if let Some(library) = self.installed.get(*path) {
                    return Ok(library.clone());
                }
                let text = std::fs::read_to_string(path).map_err(|e| SessionError::LoadFailed {
                    source: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                Self::parse_library(source, &text)
            }
            LibrarySource::Memory { bytes, .. } => {
                let text = std::str::from_utf8(bytes).map_err(|e| SessionError::LoadFailed {
                    source: source.to_string(),
                    reason: e.to_string(),
                })?;
                Self::parse_library(source, text)
            }
        }
    }

    /// Rebuilds the generated objects of an asset node from its parameters.
    ///
    /// Object and geo nodes are reused by name so their ids stay stable
    /// across cooks.
    fn regenerate(&mut self, node: NodeId) -> SessionResult<()> {
        let (operator, parameters, previous) = {
            let record = self.record(node)?;
            let NodeRole::Asset { operator } = &record.role else {
                return Ok(());
            };
            (operator.clone(), record.parameters.clone(), record.objects.clone())
        };
        let templates = match self.generators.get(&operator) {
            Some(generator) => generator(&parameters),
            None => self
                .definition(&operator)
                .map(|d| d.objects.clone())
                .ok_or_else(|| SessionError::NotFound(operator.clone()))?,
        };

        let mut objects = Vec::with_capacity(templates.len());
        let mut kept = Vec::new();
        for template in &templates {
            let old = previous
                .iter()
                .find(|o| o.name == template.name && !kept.contains(&o.node) && self.nodes.contains_key(&o.node));
            let object_node = match old {
                Some(o) => o.node,
                None => self.allocate(NodeRecord::new(&template.name, Some(node), NodeRole::Object, ParmValues::new())),
            };
            kept.push(object_node);
            if let Some(record) = self.nodes.get_mut(&object_node) {
                record.transform = template.transform;
            }

            let mut geos = Vec::with_capacity(template.geos.len());
            for geo in &template.geos {
                let old_geo = old
                    .and_then(|o| o.geos.iter().find(|g| g.name == geo.name))
                    .map(|g| g.node)
                    .filter(|id| self.nodes.contains_key(id) && !kept.contains(id));
                let geo_node = match old_geo {
                    Some(id) => id,
                    None => self.allocate(NodeRecord::new(&geo.name, Some(object_node), NodeRole::Geo, geo.parameters.clone())),
                };
                kept.push(geo_node);
                geos.push(GeoInfo {
                    name: geo.name.clone(),
                    node: geo_node,
                    kind: geo.kind,
                    parts: geo
                        .parts
                        .iter()
                        .map(|p| PartInfo {
                            name: p.name.clone(),
                            material: p.material.map(MaterialId),
                            point_count: p.point_count,
                        })
                        .collect(),
                });
            }

            objects.push(ObjectInfo {
                name: template.name.clone(),
                node: object_node,
                transform: template.transform,
                instanced_objects: template.instanced_objects.clone(),
                geos,
            });
        }

        let stale: Vec<NodeId> = previous
            .iter()
            .flat_map(|o| std::iter::once(o.node).chain(o.geos.iter().map(|g| g.node)))
            .filter(|id| !kept.contains(id))
            .collect();
        for id in stale {
            self.remove_subtree(id);
        }
        if let Some(record) = self.nodes.get_mut(&node) {
            record.objects = objects;
        }
        Ok(())
    }

    /// Completes the cook of `node`, applying any injected fault.
    fn finish_cook(&mut self, node: NodeId) -> SessionResult<CookState> {
        if !self.nodes.contains_key(&node) {
            return Ok(CookState::ReadyWithFatalErrors);
        }

        let fault = self.next_fault.take();
        if let Some(CookFault::Fatal(message)) = &fault {
            self.record_mut(node)?.status_message = message.clone();
            return Ok(CookState::ReadyWithFatalErrors);
        }

        self.regenerate(node)?;
        let record = self.record_mut(node)?;
        record.cook_count += 1;
        match fault {
            Some(CookFault::Warning(message)) => {
                record.status_message = message;
                Ok(CookState::ReadyWithWarnings)
            }
            _ => {
                record.status_message = "Cook completed".to_string();
                Ok(CookState::ReadyClean)
            }
        }
    }
}

impl Session for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn is_valid(&self) -> bool {
        self.connected
    }

    fn load_library(&mut self, source: LibrarySource<'_>, overwrite: bool) -> SessionResult<LibraryId> {
        self.ensure_connected()?;
        let library = self.read_library(&source)?;

        let existing = self
            .libraries
            .iter()
            .find(|(_, l)| l.name == library.name)
            .map(|(id, _)| *id);
        let id = match existing {
            Some(id) if overwrite => {
                log::debug!("MemorySession: overwriting library '{}'.", library.name);
                self.libraries.insert(id, library);
                id
            }
            Some(id) => {
                log::debug!("MemorySession: library '{}' already loaded.", library.name);
                id
            }
            None => {
                let id = LibraryId(self.next_library);
                self.next_library += 1;
                self.libraries.insert(id, library);
                id
            }
        };
        self.library_loads += 1;
        Ok(id)
    }

    fn enumerate_definitions(&self, library: LibraryId) -> SessionResult<Vec<String>> {
        self.ensure_connected()?;
        self.libraries
            .get(&library)
            .map(|l| l.definitions.iter().map(|d| d.operator.clone()).collect())
            .ok_or_else(|| SessionError::NotFound(format!("library {library}")))
    }

    fn create_node(&mut self, parent: Option<NodeId>, operator: &str) -> SessionResult<NodeId> {
        self.ensure_connected()?;
        if let Some(parent) = parent {
            self.record(parent)?;
        }
        let definition = self
            .definition(operator)
            .ok_or_else(|| SessionError::NotFound(operator.to_string()))?;
        let record = NodeRecord::new(
            &definition.label,
            parent,
            NodeRole::Asset {
                operator: operator.to_string(),
            },
            definition.parameters.clone(),
        );
        Ok(self.allocate(record))
    }

    fn cook_node(&mut self, node: NodeId, _options: &CookNodeOptions) -> SessionResult<()> {
        let polls_left = self.definition_of(node)?.cook_polls;
        self.finished.remove(&node);
        if let Some(previous) = self.pending.take().filter(|p| p.node != node) {
            // One cook at a time: the one in flight finishes first and keeps
            // its outcome for its owner's next poll.
            log::debug!(
                "MemorySession: finishing the cook of {} before cooking {}.",
                previous.node,
                node
            );
            let state = self.finish_cook(previous.node).unwrap_or_else(|err| {
                log::warn!("MemorySession: cook of {} failed: {err}", previous.node);
                CookState::ReadyWithFatalErrors
            });
            self.finished.insert(previous.node, state);
        }
        self.pending = Some(PendingCook { node, polls_left });
        self.cook_calls += 1;
        Ok(())
    }

    fn poll_cook_state(&mut self, node: NodeId) -> SessionResult<CookState> {
        self.ensure_connected()?;
        if let Some(state) = self.finished.remove(&node) {
            return Ok(state);
        }
        let Some(pending) = self.pending.as_mut().filter(|p| p.node == node) else {
            return Ok(CookState::ReadyClean);
        };
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return Ok(CookState::Running);
        }

        self.pending = None;
        self.finish_cook(node)
    }

    fn cook_status_message(&self, node: NodeId) -> String {
        self.nodes
            .get(&node)
            .map(|r| r.status_message.clone())
            .unwrap_or_default()
    }

    fn node_info(&self, node: NodeId) -> SessionResult<NodeInfo> {
        let record = self.record(node)?;
        Ok(NodeInfo {
            id: node,
            name: record.name.clone(),
            parent: record.parent,
            parameter_count: record.parameters.len(),
        })
    }

    fn asset_info(&self, node: NodeId) -> SessionResult<AssetInfo> {
        let definition = self.definition_of(node)?;
        Ok(AssetInfo {
            name: definition.label.clone(),
            operator_name: definition.operator.clone(),
            help: definition.help.clone(),
            geo_input_count: definition.inputs.len(),
            handle_count: definition.handles.len(),
        })
    }

    fn object_transform(&self, node: NodeId) -> SessionResult<Transform> {
        Ok(self.record(node)?.transform)
    }

    fn set_object_transform(&mut self, node: NodeId, transform: &Transform) -> SessionResult<()> {
        self.record_mut(node)?.transform = *transform;
        Ok(())
    }

    fn delete_node(&mut self, node: NodeId) -> SessionResult<()> {
        self.record(node)?;
        self.remove_subtree(node);
        Ok(())
    }

    fn register_asset(&mut self, node: NodeId, key: AssetKey) -> SessionResult<()> {
        self.record(node)?;
        self.registry.insert(node, key);
        Ok(())
    }

    fn unregister_asset(&mut self, node: NodeId) {
        self.registry.remove(&node);
    }

    fn is_asset_registered(&self, node: NodeId, key: AssetKey) -> bool {
        self.connected && self.nodes.contains_key(&node) && self.registry.get(&node) == Some(&key)
    }

    fn is_node_valid(&self, node: NodeId) -> bool {
        self.connected && self.nodes.contains_key(&node)
    }

    fn object_infos(&self, node: NodeId) -> SessionResult<Vec<ObjectInfo>> {
        Ok(self.record(node)?.objects.clone())
    }

    fn total_cook_count(&self, node: NodeId) -> SessionResult<u32> {
        Ok(self.record(node)?.cook_count)
    }

    fn parameter_values(&self, node: NodeId) -> SessionResult<ParmValues> {
        Ok(self.record(node)?.parameters.clone())
    }

    fn set_parameter_values(&mut self, node: NodeId, values: &ParmValues) -> SessionResult<()> {
        let record = self.record_mut(node)?;
        for (name, value) in values {
            match record.parameters.get_mut(name) {
                Some(slot) => *slot = value.clone(),
                None => log::debug!("MemorySession: ignoring unknown parameter '{name}'."),
            }
        }
        Ok(())
    }

    fn apply_parameter_modifier(&mut self, node: NodeId, modifier: &ParmModifier) -> SessionResult<()> {
        let record = self.record_mut(node)?;
        let (parameter, delta) = match modifier {
            ParmModifier::InsertInstance { parameter, .. } => (parameter, 1),
            ParmModifier::RemoveInstance { parameter, .. } => (parameter, -1),
        };
        match record.parameters.get_mut(parameter) {
            Some(ParmValue::Int(count)) => {
                *count = (*count + delta).max(0);
                Ok(())
            }
            _ => Err(SessionError::call_failed(
                "apply_parameter_modifier",
                format!("'{parameter}' is not a list parameter"),
            )),
        }
    }

    fn parameter_preset(&self, node: NodeId) -> SessionResult<Vec<u8>> {
        let record = self.record(node)?;
        bincode::serde::encode_to_vec(&record.parameters, bincode::config::standard())
            .map_err(|e| SessionError::call_failed("parameter_preset", e.to_string()))
    }

    fn set_parameter_preset(&mut self, node: NodeId, preset: &[u8]) -> SessionResult<()> {
        let (values, _): (ParmValues, usize) =
            bincode::serde::decode_from_slice(preset, bincode::config::standard())
                .map_err(|e| SessionError::call_failed("set_parameter_preset", e.to_string()))?;
        self.set_parameter_values(node, &values)
    }

    fn input_names(&self, node: NodeId) -> SessionResult<Vec<String>> {
        match &self.record(node)?.role {
            NodeRole::Asset { .. } => Ok(self.definition_of(node)?.inputs.clone()),
            _ => Ok(Vec::new()),
        }
    }

    fn connect_input(&mut self, node: NodeId, index: usize, connection: &InputConnection) -> SessionResult<()> {
        let slots = self.input_names(node)?.len();
        if index >= slots {
            return Err(SessionError::call_failed(
                "connect_input",
                format!("input {index} out of range ({slots} inputs)"),
            ));
        }
        if let InputSource::Asset(key) = connection.source {
            if self.node_for_asset(key).is_none() {
                return Err(SessionError::NotFound(format!("asset {key}")));
            }
        }
        self.record_mut(node)?.inputs.insert(index, connection.clone());
        Ok(())
    }

    fn material_info(&self, material: MaterialId) -> SessionResult<MaterialInfo> {
        self.ensure_connected()?;
        self.libraries
            .values()
            .flat_map(|l| l.definitions.iter())
            .find_map(|d| d.material(material))
            .cloned()
            .ok_or_else(|| SessionError::NotFound(format!("material {material}")))
    }

    fn handle_infos(&self, node: NodeId) -> SessionResult<Vec<HandleInfo>> {
        Ok(self.definition_of(node)?.handles.clone())
    }

    fn set_attribute_values(&mut self, geo: NodeId, name: &str, values: &[f32]) -> SessionResult<()> {
        self.record_mut(geo)?
            .attributes
            .insert(name.to_string(), values.to_vec());
        Ok(())
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("connected", &self.connected)
            .field("libraries", &self.libraries.len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

