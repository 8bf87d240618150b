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

//! The asset lifecycle controller.
//!
//! One [`AssetController`] mirrors one node of a [`Session`]. The host calls
//! [`AssetController::update`] once per tick. The controller then runs at most
//! one rebuild or cook sequence, and answers each request with an
//! [`AssetEvent`] on its event bus.

mod cook;
mod rebuild;

use kiln_core::event::{AssetEvent, AssetEventKind, Diagnostic, EventBus, OutputRef};
use kiln_core::preset::{AssetPreset, RecookPreset, VolumeTileSettings};
use kiln_core::session::{
    AssetInfo, InputConnection, InputSource, NodeId, NodeInfo, ParmModifier, ParmValue, Session,
    SessionId,
};
use kiln_core::{AssetKey, AssetKind, AssetSource, BuildAction, CookOptions, CookResult, CookStatus, CreationMode, Transform};
use kiln_data::{AssetGraph, HandleSet, InputKind, InputNode, MaterialCache, ParameterSet};
use kiln_lanes::preset_lane;

use super::{BuildRequestQueue, ControllerConfig, ControllerError, RequestOutcome};

/// Drives one procedural asset through rebuilds and cooks.
///
/// Requests made with the `request_*` methods are queued and run on a later
/// [`update`](AssetController::update). The `*_blocking` methods run
/// immediately against the given session. Either way, each call is answered
/// by exactly one [`AssetEvent`].
pub struct AssetController {
    key: AssetKey,
    kind: AssetKind,
    source: AssetSource,
    config: ControllerConfig,

    status: CookStatus,
    last_result: CookResult,
    queue: BuildRequestQueue,

    node: Option<NodeId>,
    session_id: Option<SessionId>,
    node_info: Option<NodeInfo>,
    asset_info: Option<AssetInfo>,
    asset_name: String,
    operator_name: String,
    subasset_names: Vec<String>,
    desired_subasset: Option<usize>,
    selected_subasset: Option<usize>,
    total_cook_count: u32,

    transform: Transform,
    synced_transform: Option<Transform>,

    parameters: ParameterSet,
    inputs: Vec<InputNode>,
    graph: AssetGraph,
    handles: HandleSet,
    materials: MaterialCache,

    saved_preset: Option<AssetPreset>,
    recook_preset: RecookPreset,

    restore_pending: bool,
    upstream_cook_changed: bool,
    cooking_paused: bool,
    baked: bool,

    completion: Vec<AssetEventKind>,
    diagnostics: Vec<Diagnostic>,
    events: EventBus<AssetEvent>,
}

impl AssetController {
    /// Creates a controller. Nothing is created in a session until the first
    /// rebuild.
    pub fn new(kind: AssetKind, source: AssetSource, config: ControllerConfig, creation_mode: CreationMode) -> Self {
        let mut controller = Self {
            key: AssetKey::new(),
            kind,
            source,
            config,
            status: CookStatus::None,
            last_result: CookResult::None,
            queue: BuildRequestQueue::new(),
            node: None,
            session_id: None,
            node_info: None,
            asset_info: None,
            asset_name: String::new(),
            operator_name: String::new(),
            subasset_names: Vec::new(),
            desired_subasset: None,
            selected_subasset: None,
            total_cook_count: 0,
            transform: Transform::IDENTITY,
            synced_transform: None,
            parameters: ParameterSet::new(),
            inputs: Vec::new(),
            graph: AssetGraph::new(),
            handles: HandleSet::default(),
            materials: MaterialCache::default(),
            saved_preset: None,
            recook_preset: RecookPreset::default(),
            restore_pending: false,
            upstream_cook_changed: false,
            cooking_paused: false,
            baked: false,
            completion: Vec::new(),
            diagnostics: Vec::new(),
            events: EventBus::new(),
        };
        match creation_mode {
            CreationMode::Fresh => {}
            CreationMode::Duplicate(preset) => controller.saved_preset = Some(preset),
            CreationMode::Restored => controller.restore_pending = true,
        }
        controller
    }

    /// Replaces the random key, e.g. with one derived from a persistent name.
    pub fn with_key(mut self, key: AssetKey) -> Self {
        self.key = key;
        self
    }

    // --- Accessors ---

    /// Stable identity of this controller.
    pub fn key(&self) -> AssetKey {
        self.key
    }

    /// Kind of node backing the asset.
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Where the definition library comes from.
    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    /// Current configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Mutable configuration. Takes effect with the next request.
    pub fn config_mut(&mut self) -> &mut ControllerConfig {
        &mut self.config
    }

    /// Current phase.
    pub fn status(&self) -> CookStatus {
        self.status
    }

    /// Outcome of the last finished sequence.
    pub fn last_result(&self) -> CookResult {
        self.last_result
    }

    /// The action waiting in the request slot.
    pub fn pending_action(&self) -> BuildAction {
        self.queue.action()
    }

    /// The request slot.
    pub fn queue(&self) -> &BuildRequestQueue {
        &self.queue
    }

    /// Session node backing the asset, if one was created.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Session the node was created in.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Metadata of the asset node from the last refresh.
    pub fn node_info(&self) -> Option<&NodeInfo> {
        self.node_info.as_ref()
    }

    /// Asset metadata from the last refresh.
    pub fn asset_info(&self) -> Option<&AssetInfo> {
        self.asset_info.as_ref()
    }

    /// Display name reported by the session.
    pub fn asset_name(&self) -> &str {
        &self.asset_name
    }

    /// Operator the node was created from.
    pub fn operator_name(&self) -> &str {
        &self.operator_name
    }

    /// Definitions found in the library by the last rebuild.
    pub fn subasset_names(&self) -> &[String] {
        &self.subasset_names
    }

    /// Engine-side cook counter seen after the last cook.
    pub fn total_cook_count(&self) -> u32 {
        self.total_cook_count
    }

    /// Host transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Parameters of the asset node.
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Inputs of the asset node.
    pub fn inputs(&self) -> &[InputNode] {
        &self.inputs
    }

    /// Everything generated by the last cook.
    pub fn graph(&self) -> &AssetGraph {
        &self.graph
    }

    /// Handles of the asset node.
    pub fn handles(&self) -> &HandleSet {
        &self.handles
    }

    /// Materials referenced by the generated parts.
    pub fn materials(&self) -> &MaterialCache {
        &self.materials
    }

    /// Preset restored by the next rebuild.
    pub fn saved_preset(&self) -> Option<&AssetPreset> {
        self.saved_preset.as_ref()
    }

    /// Presets waiting for their targets to be generated.
    pub fn recook_preset(&self) -> &RecookPreset {
        &self.recook_preset
    }

    /// Returns `true` once the asset was baked in place.
    pub fn is_baked(&self) -> bool {
        self.baked
    }

    /// Returns `true` while cooks are refused.
    pub fn is_cooking_paused(&self) -> bool {
        self.cooking_paused
    }

    /// Returns `true` if nothing is in flight or queued.
    pub fn is_idle(&self) -> bool {
        matches!(
            self.status,
            CookStatus::None | CookStatus::PostCook | CookStatus::PostLoad
        ) && self.queue.is_empty()
            && !self.restore_pending
    }

    /// Outputs of the last generation.
    pub fn outputs(&self) -> Vec<OutputRef> {
        self.graph.outputs()
    }

    /// Subscribes to completion events.
    pub fn subscribe(&mut self) -> flume::Receiver<AssetEvent> {
        self.events.subscribe()
    }

    /// Returns `true` if local edits are waiting to be cooked.
    pub fn requires_recook(&self) -> bool {
        self.parameters.has_changed()
            || self.parameters.has_pending_modifiers()
            || self.graph.curves().any(|(_, c)| c.parameters.has_changed())
            || self
                .inputs
                .iter()
                .any(|i| i.kind == InputKind::Connection && i.requires_upload)
            || self.graph.volumes().any(|(_, v)| v.dirty)
    }

    // --- Host edits ---

    /// Sets the host transform. Uploaded with the next cook.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Sets a local parameter value. Returns `false` for unknown names.
    pub fn set_parameter(&mut self, name: &str, value: ParmValue) -> bool {
        self.parameters.set(name, value)
    }

    /// Sets a parameter of the named curve.
    pub fn set_curve_parameter(&mut self, curve: &str, name: &str, value: ParmValue) -> bool {
        let Some(key) = self.graph.curve_by_name(curve) else {
            return false;
        };
        self.graph
            .curve_mut(key)
            .is_some_and(|c| c.parameters.set(name, value))
    }

    /// Queues a structural parameter change for the next cook.
    pub fn push_parameter_modifier(&mut self, modifier: ParmModifier) {
        self.parameters.push_modifier(modifier);
    }

    /// Exposes the parameter `name` as an input.
    ///
    /// The input survives rebuilds. Its connection travels with the parameter
    /// upload instead of the input upload.
    pub fn attach_parameter_input(&mut self, name: &str) -> bool {
        if self.inputs.iter().any(|i| i.name == name) {
            return false;
        }
        let index = self
            .inputs
            .iter()
            .filter(|i| i.kind == InputKind::Parameter)
            .count();
        self.inputs.push(InputNode::parameter(name, index));
        true
    }

    /// Connects the named input. Returns `false` if there is no such input.
    pub fn set_input_connection(&mut self, name: &str, connection: InputConnection) -> bool {
        let Some(input) = self.inputs.iter_mut().find(|i| i.name == name) else {
            return false;
        };
        if input.kind == InputKind::Parameter {
            let value = match &connection.source {
                InputSource::None => String::new(),
                InputSource::Asset(key) => key.to_string(),
                InputSource::Geometry(name) => name.clone(),
            };
            self.parameters.set(&input.name, ParmValue::Text(value));
        }
        input.connect(connection);
        true
    }

    /// Stages attribute values on an editable geo.
    pub fn set_attribute(&mut self, object: &str, geo: &str, attribute: &str, values: Vec<f32>) -> bool {
        let Some(store) = self
            .graph
            .geo_by_name(object, geo)
            .and_then(|g| self.graph.attribute_store_for(g))
        else {
            return false;
        };
        match self.graph.attribute_store_mut(store) {
            Some(store) => {
                store.set(attribute, values);
                true
            }
            None => false,
        }
    }

    /// Changes the settings of one volume tile.
    pub fn set_volume_tile_settings(&mut self, object: &str, geo: &str, tile: u32, settings: VolumeTileSettings) -> bool {
        let Some(key) = self.graph.volume_by_tile(object, geo, tile) else {
            return false;
        };
        match self.graph.volume_mut(key) {
            Some(volume) => {
                volume.apply(settings);
                true
            }
            None => false,
        }
    }

    /// Prefers the definition at `index` for the next rebuild, or resumes a
    /// rebuild waiting for the choice.
    pub fn select_subasset(&mut self, index: usize) -> Result<(), ControllerError> {
        if self.status == CookStatus::SelectSubasset && index >= self.subasset_names.len() {
            return Err(ControllerError::InvalidSubasset(index));
        }
        self.desired_subasset = Some(index);
        if self.status == CookStatus::SelectSubasset {
            self.selected_subasset = Some(index);
        }
        Ok(())
    }

    /// Refuses or allows new cooks.
    pub fn set_cooking_paused(&mut self, paused: bool) {
        self.cooking_paused = paused;
    }

    /// Marks inputs fed by `upstream` for upload and queues a cook.
    ///
    /// Returns `false` if no input references `upstream`.
    pub fn notify_upstream_cooked(&mut self, upstream: AssetKey) -> bool {
        let mut affected = false;
        for input in self
            .inputs
            .iter_mut()
            .filter(|i| i.upstream_asset() == Some(upstream))
        {
            input.requires_upload = true;
            affected = true;
        }
        if affected {
            log::debug!(
                "AssetController: upstream {} of '{}' cooked, queueing a cook.",
                upstream,
                self.label()
            );
            self.upstream_cook_changed = true;
            self.request_cook(CookOptions::changed_only());
        }
        affected
    }

    // --- Presets ---

    /// Snapshots parameters, curves, inputs and volume tiles.
    pub fn capture_preset(&self) -> AssetPreset {
        preset_lane::capture(&self.operator_name, &self.parameters, &self.graph, &self.inputs)
    }

    /// Applies `preset` and cooks with it, blocking.
    pub fn load_preset_and_cook(&mut self, session: &mut dyn Session, preset: &AssetPreset) {
        if let Err(err) = self.check_blocking_allowed() {
            self.reject(AssetEventKind::Cook, &err);
            return;
        }
        self.completion = vec![AssetEventKind::Cook];
        self.apply_preset_and_recook(session, preset);
        self.complete(AssetEventKind::Cook);
    }

    // --- Requests ---

    /// Queues a full rebuild.
    pub fn request_reload(&mut self) -> RequestOutcome {
        let outcome = self.queue.request_reload();
        self.log_request("reload", outcome);
        outcome
    }

    /// Queues a cook.
    pub fn request_cook(&mut self, options: CookOptions) -> RequestOutcome {
        let outcome = self.queue.request_cook(options);
        self.log_request("cook", outcome);
        outcome
    }

    /// Queues a reset to defaults. The reset is followed by a rebuild.
    pub fn request_reset_parameters(&mut self) -> RequestOutcome {
        let outcome = self.queue.request_reset_parameters();
        self.log_request("reset", outcome);
        outcome
    }

    /// Queues a bake in place. Never overrides a pending action.
    pub fn request_bake_in_place(&mut self) -> RequestOutcome {
        let outcome = self.queue.request_bake();
        self.log_request("bake", outcome);
        outcome
    }

    /// Drops the pending request. Each dropped request is answered with a
    /// failed event.
    pub fn clear_build_request(&mut self) {
        let waiters = self.queue.clear();
        if !waiters.is_empty() {
            log::debug!(
                "AssetController: cancelled {} pending request(s) for '{}'.",
                waiters.len(),
                self.label()
            );
        }
        for kind in waiters {
            self.events
                .publish(AssetEvent::failed(self.key, kind, Vec::new()));
        }
    }

    /// Rebuilds immediately.
    pub fn reload_blocking(&mut self, session: &mut dyn Session) {
        if let Err(err) = self.check_rebuild_allowed() {
            self.reject(AssetEventKind::Reload, &err);
            return;
        }
        let waiters = self.queue.take().waiters;
        self.completion.extend(waiters);
        self.completion.push(AssetEventKind::Reload);
        self.set_status(CookStatus::PreLoad);
        self.process_rebuild(session, true);
    }

    /// Resets everything to defaults and rebuilds immediately.
    pub fn reset_parameters_blocking(&mut self, session: &mut dyn Session) {
        if let Err(err) = self.check_rebuild_allowed() {
            self.reject(AssetEventKind::Reload, &err);
            return;
        }
        self.reset_to_defaults(session);
        self.reload_blocking(session);
    }

    /// Cooks immediately, polling until the session is ready.
    pub fn cook_blocking(&mut self, session: &mut dyn Session, options: CookOptions) {
        if let Err(err) = self.check_blocking_allowed() {
            log::warn!("AssetController: cannot cook '{}' now: {err}", self.label());
            self.reject(AssetEventKind::Cook, &err);
            return;
        }
        self.completion = vec![AssetEventKind::Cook];
        self.recook_blocking(session, options, false);
        self.complete(AssetEventKind::Cook);
    }

    // --- Tick ---

    /// Advances the state machine by one step.
    pub fn update(&mut self, session: &mut dyn Session) {
        self.post_update();

        if self.baked {
            for kind in self.queue.clear() {
                self.reject(kind, &ControllerError::Baked);
            }
            return;
        }

        if self.restore_pending {
            self.restore_pending = false;
            log::info!("AssetController: rebuilding restored asset {}.", self.key);
            self.reload_blocking(session);
            return;
        }

        match self.status {
            CookStatus::Cooking => {
                if self.process_cook_status(session, false).is_some() {
                    self.complete(AssetEventKind::Cook);
                }
            }
            CookStatus::SelectSubasset => {
                if self.selected_subasset.is_some() {
                    self.set_status(CookStatus::Loading);
                    self.process_rebuild(session, false);
                }
            }
            CookStatus::None => self.process_pending(session),
            _ => {}
        }
    }

    /// Settles a finished sequence back to idle.
    pub fn post_update(&mut self) {
        if matches!(self.status, CookStatus::PostCook | CookStatus::PostLoad) {
            self.set_status(CookStatus::None);
        }
    }

    /// Deletes the session node and everything generated from it.
    ///
    /// Pending requests are answered with failed events.
    pub fn destroy(&mut self, session: &mut dyn Session) {
        self.clear_build_request();
        for kind in std::mem::take(&mut self.completion) {
            self.events
                .publish(AssetEvent::failed(self.key, kind, Vec::new()));
        }
        self.delete_session_data(session);
        self.graph.clear();
        self.handles.clear();
        self.materials.clear();
        self.parameters.clear();
        self.inputs.clear();
        self.recook_preset = RecookPreset::default();
        self.status = CookStatus::None;
        log::info!("AssetController: destroyed asset {}.", self.key);
    }

    fn process_pending(&mut self, session: &mut dyn Session) {
        if self.config.transform_change_triggers_cooks
            && self.config.cooking_enabled
            && !self.cooking_paused
            && self.node.is_some()
            && self.transform_changed()
        {
            log::debug!(
                "AssetController: transform of '{}' changed, cooking.",
                self.label()
            );
            self.recook_blocking(session, CookOptions::changed_only(), false);
            self.complete(AssetEventKind::Cook);
        }

        let pending = self.queue.take();
        match pending.action {
            BuildAction::None => self.update_session_sync(session),
            BuildAction::Reload => {
                self.completion = pending.waiters;
                self.set_status(CookStatus::PreLoad);
                self.process_rebuild(session, true);
            }
            BuildAction::Cook => {
                self.completion = pending.waiters;
                self.recook_async(session, pending.options);
            }
            BuildAction::ResetParameters => {
                self.reset_to_defaults(session);
                self.queue.requeue(BuildAction::Reload, pending.waiters);
            }
            BuildAction::StripEngineData => {
                self.completion = pending.waiters;
                self.bake_in_place(session);
                self.complete(AssetEventKind::Bake);
            }
        }
    }

    fn check_blocking_allowed(&self) -> Result<(), ControllerError> {
        if self.baked {
            Err(ControllerError::Baked)
        } else if !self.status.accepts_blocking_cook() {
            Err(ControllerError::Busy(self.status))
        } else {
            Ok(())
        }
    }

    fn check_rebuild_allowed(&self) -> Result<(), ControllerError> {
        if self.baked {
            Err(ControllerError::Baked)
        } else if matches!(
            self.status,
            CookStatus::PreLoad | CookStatus::Loading | CookStatus::Cooking
        ) {
            Err(ControllerError::Busy(self.status))
        } else {
            Ok(())
        }
    }

    fn log_request(&self, what: &str, outcome: RequestOutcome) {
        match outcome {
            RequestOutcome::Absorbed(pending) => log::warn!(
                "AssetController: '{}' is busy with {:?}, {} request will complete with it.",
                self.label(),
                pending,
                what
            ),
            _ => log::trace!(
                "AssetController: {} request for '{}': {:?}.",
                what,
                self.label(),
                outcome
            ),
        }
    }

    fn set_status(&mut self, next: CookStatus) {
        if !self.status.can_transition_to(next) {
            log::warn!(
                "AssetController: unexpected transition {} -> {} for '{}'.",
                self.status,
                next,
                self.label()
            );
        }
        if self.status != next {
            log::debug!(
                "AssetController: '{}' {} -> {}.",
                self.label(),
                self.status,
                next
            );
        }
        self.status = next;
    }

    fn finish(&mut self, status: CookStatus, result: CookResult) {
        self.set_status(status);
        self.last_result = result;
    }

    fn transform_changed(&self) -> bool {
        self.synced_transform
            .map_or(true, |synced| approx::relative_ne!(synced, self.transform))
    }

    /// Answers every owed completion with the outcome of the last sequence.
    ///
    /// With no waiters (sequences started by the controller itself) one event
    /// of `kind` is published.
    fn complete(&mut self, kind: AssetEventKind) {
        let success = self.last_result == CookResult::Success;
        let outputs = if success { self.graph.outputs() } else { Vec::new() };
        let diagnostics = std::mem::take(&mut self.diagnostics);
        let mut kinds = std::mem::take(&mut self.completion);
        if kinds.is_empty() {
            kinds.push(kind);
        }
        for kind in kinds {
            self.events.publish(AssetEvent {
                asset: self.key,
                kind,
                success,
                outputs: outputs.clone(),
                diagnostics: diagnostics.clone(),
            });
        }
    }

    fn reject(&mut self, kind: AssetEventKind, err: &ControllerError) {
        log::warn!(
            "AssetController: request on '{}' refused: {err}",
            self.label()
        );
        self.events
            .publish(AssetEvent::failed(self.key, kind, Vec::new()));
    }

    fn label(&self) -> String {
        if !self.asset_name.is_empty() {
            self.asset_name.clone()
        } else if let Some(path) = &self.source.path {
            path.display().to_string()
        } else {
            self.key.to_string()
        }
    }
}
