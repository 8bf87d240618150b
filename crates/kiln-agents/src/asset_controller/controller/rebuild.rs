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

//! Rebuilds: teardown, library loading and node creation.

use kiln_core::event::AssetEventKind;
use kiln_core::preset::{AssetPreset, RecookPreset};
use kiln_core::session::{CookState, InputConnection, InputSource, LibrarySource, NodeId, Session};
use kiln_core::{AssetKind, CookOptions, CookResult, CookStatus};
use kiln_data::{InputKind, InputNode};
use kiln_lanes::preset_lane;

use super::AssetController;
use crate::asset_controller::ControllerError;

impl AssetController {
    /// Runs a rebuild from the current status and reports its completion.
    ///
    /// A rebuild parked in `SelectSubasset` reports nothing until it resumes.
    pub(super) fn process_rebuild(&mut self, session: &mut dyn Session, prompt: bool) {
        match self.run_rebuild(session, prompt) {
            Ok(false) => {
                log::info!(
                    "AssetController: '{}' waits for a choice among {:?}.",
                    self.label(),
                    self.subasset_names
                );
                return;
            }
            Ok(true) => {}
            Err(err) => {
                log::error!("AssetController: rebuild of '{}' failed: {err}", self.label());
                self.finish(CookStatus::PostLoad, CookResult::Errored);
            }
        }
        self.complete(AssetEventKind::Reload);
    }

    fn run_rebuild(&mut self, session: &mut dyn Session, prompt: bool) -> Result<bool, ControllerError> {
        if self.status == CookStatus::PreLoad {
            self.start_rebuild(session, prompt)?;
        }
        if self.status == CookStatus::SelectSubasset {
            return Ok(false);
        }
        self.finish_rebuild(session)?;
        Ok(true)
    }

    fn start_rebuild(&mut self, session: &mut dyn Session, prompt: bool) -> Result<(), ControllerError> {
        if !session.is_valid() {
            return Err(ControllerError::SessionUnavailable);
        }
        if self.parameters.is_initialized() {
            self.saved_preset = Some(self.capture_preset());
        }

        self.delete_generated_data(session);
        self.session_id = Some(session.id());
        self.subasset_names.clear();
        self.selected_subasset = None;

        if self.kind == AssetKind::Definition {
            self.load_library(session, prompt)?;
        }
        if self.status == CookStatus::PreLoad {
            self.set_status(CookStatus::Loading);
        }
        Ok(())
    }

    fn finish_rebuild(&mut self, session: &mut dyn Session) -> Result<(), ControllerError> {
        let operator = self.resolve_operator()?;
        let node = self.create_and_cook_node(session, &operator)?;
        self.node = Some(node);
        self.session_id = Some(session.id());
        session.register_asset(node, self.key)?;

        self.refresh_info(session, node)?;
        self.total_cook_count = session.total_cook_count(node)?;
        self.create_inputs(session, node)?;

        self.parameters.generate(&*session, node)?;
        self.parameters.download_default_preset(&*session)?;
        self.parameters.download_preset(&*session)?;

        if self.kind == AssetKind::Curve && self.graph.curve_by_name(&self.asset_name).is_none() {
            self.graph.insert_curve(&self.asset_name, node, None);
        }
        self.generate_objects(session, node)?;
        self.upload_transform(session, false)?;
        self.finish(CookStatus::PostLoad, CookResult::Success);
        log::info!(
            "AssetController: rebuilt '{}' as node {} ({} object(s)).",
            self.label(),
            node,
            self.graph.object_count()
        );

        if let Some(preset) = self.saved_preset.clone() {
            let cooked = self.apply_preset_and_recook(session, &preset);
            self.set_status(CookStatus::PostLoad);
            if !cooked {
                self.last_result = CookResult::Errored;
            }
        }
        Ok(())
    }

    /// Loads the definition library and picks the definition to instantiate.
    ///
    /// Leaves the status at `SelectSubasset` when `prompt` is set, the library
    /// holds several definitions and neither the desired index nor the
    /// previously used operator resolves.
    pub(super) fn load_library(&mut self, session: &mut dyn Session, prompt: bool) -> Result<(), ControllerError> {
        let path = match &self.source.path {
            Some(path) if self.source.has_valid_path() => path.clone(),
            _ => return Err(ControllerError::LoadFailure("no library path is set".to_string())),
        };
        let overwrite = self.source.always_overwrite;

        let loaded = if self.source.load_from_memory {
            let bytes = std::fs::read(&path)
                .map_err(|e| ControllerError::LoadFailure(format!("{}: {e}", path.display())))?;
            let name = path.to_string_lossy().into_owned();
            session.load_library(
                LibrarySource::Memory {
                    name: name.as_str(),
                    bytes: &bytes,
                },
                overwrite,
            )
        } else {
            session.load_library(LibrarySource::File(&path), overwrite)
        };
        let library = loaded.map_err(|e| ControllerError::LoadFailure(e.to_string()))?;

        let names = session.enumerate_definitions(library)?;
        if names.is_empty() {
            return Err(ControllerError::LoadFailure(format!(
                "{} defines no assets",
                path.display()
            )));
        }
        let desired = self
            .desired_subasset
            .filter(|index| *index < names.len())
            .or_else(|| names.iter().position(|n| *n == self.operator_name));
        log::debug!(
            "AssetController: library {} holds {} definition(s).",
            path.display(),
            names.len()
        );
        self.subasset_names = names;

        match desired {
            Some(index) => self.selected_subasset = Some(index),
            None if prompt && self.subasset_names.len() > 1 => {
                self.set_status(CookStatus::SelectSubasset);
            }
            None => self.selected_subasset = Some(0),
        }
        Ok(())
    }

    /// Operator the asset node is created from.
    pub(super) fn resolve_operator(&self) -> Result<String, ControllerError> {
        if let Some(operator) = self.kind.builtin_operator() {
            return Ok(operator.to_string());
        }
        let index = self.selected_subasset.unwrap_or_default();
        self.subasset_names
            .get(index)
            .cloned()
            .ok_or(ControllerError::InvalidSubasset(index))
    }

    /// Creates the top-level node and cooks it once so load errors surface
    /// right away. The node is deleted again if that cook fails.
    pub(super) fn create_and_cook_node(&mut self, session: &mut dyn Session, operator: &str) -> Result<NodeId, ControllerError> {
        let node = session
            .create_node(None, operator)
            .map_err(|e| ControllerError::LoadFailure(e.to_string()))?;

        let cooked = session
            .cook_node(node, &self.config.cook_node_options())
            .map_err(ControllerError::from)
            .and_then(|()| self.poll_blocking(session, node));
        match cooked {
            Ok(CookState::ReadyWithFatalErrors) => {
                let message = session.cook_status_message(node);
                discard_node(session, node);
                Err(ControllerError::CookFatalError(message))
            }
            Ok(CookState::ReadyWithWarnings) => {
                self.record_cook_warning(session, node);
                Ok(node)
            }
            Ok(_) => Ok(node),
            Err(err) => {
                discard_node(session, node);
                Err(err)
            }
        }
    }

    pub(super) fn refresh_info(&mut self, session: &dyn Session, node: NodeId) -> Result<(), ControllerError> {
        self.node_info = Some(session.node_info(node)?);
        let info = session.asset_info(node)?;
        self.asset_name = info.name.clone();
        self.operator_name = info.operator_name.clone();
        self.asset_info = Some(info);
        Ok(())
    }

    /// Brings the connection inputs in line with the node's input slots.
    ///
    /// Parameter inputs are left alone. Inputs that carry a connection are
    /// marked for upload.
    pub(super) fn create_inputs(&mut self, session: &dyn Session, node: NodeId) -> Result<(), ControllerError> {
        let slot_count = self.asset_info.as_ref().map_or(0, |info| info.geo_input_count);
        if self.kind != AssetKind::Definition || slot_count == 0 {
            self.inputs.retain(|i| i.kind == InputKind::Parameter);
            return Ok(());
        }

        let names = session.input_names(node)?;
        self.inputs
            .retain(|i| i.kind == InputKind::Parameter || names.contains(&i.name));
        for (index, name) in names.iter().enumerate() {
            match self
                .inputs
                .iter_mut()
                .find(|i| i.kind == InputKind::Connection && i.name == *name)
            {
                Some(input) => input.index = index,
                None => self.inputs.push(InputNode::connection(name.clone(), index)),
            }
        }
        for input in &mut self.inputs {
            input.requires_upload = input.connection.source != InputSource::None;
        }
        Ok(())
    }

    /// Stages `preset` and runs the blocking recook that uploads it.
    ///
    /// Returns `false` if the recook failed.
    pub(super) fn apply_preset_and_recook(&mut self, session: &mut dyn Session, preset: &AssetPreset) -> bool {
        let outcome = preset_lane::restore(
            preset,
            &self.operator_name,
            &mut self.parameters,
            &mut self.graph,
            &mut self.inputs,
        );
        self.diagnostics.extend(outcome.diagnostics);
        self.recook_preset
            .input_presets
            .extend(outcome.recook.input_presets);
        self.recook_preset
            .volume_presets
            .extend(outcome.recook.volume_presets);

        let options = CookOptions {
            check_parameters_changed: false,
            skip_cook_check: true,
            upload_parameters: false,
            force_upload_inputs: false,
        };
        self.recook_blocking(session, options, true)
    }

    /// Puts parameters, curves, inputs and volume tiles back to their
    /// defaults. The rebuild that follows picks the defaults up.
    pub(super) fn reset_to_defaults(&mut self, session: &mut dyn Session) {
        log::info!("AssetController: resetting '{}' to defaults.", self.label());
        if self.is_valid_in_session(session) {
            if let Err(err) = self.parameters.reset_to_default(session) {
                log::warn!("AssetController: could not reset parameters: {err}");
            }
            for key in self.graph.curve_keys().to_vec() {
                let Some(curve) = self.graph.curve_mut(key) else {
                    continue;
                };
                if !curve.parameters.is_initialized() {
                    continue;
                }
                if let Err(err) = curve.parameters.reset_to_default(session) {
                    log::warn!(
                        "AssetController: could not reset curve '{}': {err}",
                        curve.name
                    );
                }
            }
        }
        for input in &mut self.inputs {
            input.connect(InputConnection::default());
        }
        for volume in self.graph.volumes_mut() {
            volume.reset();
        }
        self.recook_preset = RecookPreset::default();
        self.saved_preset = None;
    }

    /// Deletes the session node, keeping the generated outputs.
    pub(super) fn bake_in_place(&mut self, session: &mut dyn Session) {
        log::info!("AssetController: baking '{}' in place.", self.label());
        self.delete_session_data(session);
        self.parameters.clear();
        self.inputs.clear();
        self.handles.clear();
        self.recook_preset = RecookPreset::default();
        self.saved_preset = None;
        self.baked = true;
        self.finish(CookStatus::None, CookResult::Success);
    }

    /// Deletes and unregisters the node if it still belongs to this asset.
    pub(super) fn delete_session_data(&mut self, session: &mut dyn Session) {
        if let Some(node) = self.node.take() {
            if session.is_asset_registered(node, self.key) {
                discard_node(session, node);
                session.unregister_asset(node);
            }
        }
        self.session_id = None;
        self.node_info = None;
        self.asset_info = None;
        self.synced_transform = None;
    }

    fn delete_generated_data(&mut self, session: &mut dyn Session) {
        self.delete_session_data(session);
        self.graph.clear();
        self.handles.clear();
        self.materials.clear();
        self.parameters.clear();
        self.inputs.retain(|i| i.kind == InputKind::Parameter);
        self.recook_preset = RecookPreset::default();
    }
}

fn discard_node(session: &mut dyn Session, node: NodeId) {
    if let Err(err) = session.delete_node(node) {
        log::warn!("AssetController: could not delete node {node}: {err}");
    }
}
