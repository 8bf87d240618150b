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

//! Cooks: uploads, polling and post-cook regeneration.

use std::collections::BTreeSet;

use kiln_core::event::{AssetEventKind, Diagnostic};
use kiln_core::session::{CookState, MaterialId, NodeId, Session, SessionError};
use kiln_core::{CookOptions, CookResult, CookStatus};
use kiln_lanes::object_lane::reconcile_objects;
use kiln_lanes::preset_lane;

use super::AssetController;
use crate::asset_controller::ControllerError;

impl AssetController {
    /// Returns `true` if the node exists in this session and is still
    /// registered to this asset.
    pub(super) fn is_valid_in_session(&self, session: &dyn Session) -> bool {
        match self.node {
            Some(node) => {
                self.session_id == Some(session.id()) && session.is_asset_registered(node, self.key)
            }
            None => false,
        }
    }

    /// Starts a cook that is polled on later ticks.
    pub(super) fn recook_async(&mut self, session: &mut dyn Session, options: CookOptions) {
        if let Err(err) = self.start_recook(session, options, false, false) {
            self.fail_cook(&err);
            self.complete(AssetEventKind::Cook);
        }
    }

    /// Cooks and polls until the session is ready. Returns `true` on success.
    ///
    /// Reports nothing; the caller decides which completion this belongs to.
    pub(super) fn recook_blocking(&mut self, session: &mut dyn Session, options: CookOptions, upload_preset: bool) -> bool {
        if let Err(err) = self.start_recook(session, options, upload_preset, false) {
            self.fail_cook(&err);
            return false;
        }
        self.process_cook_status(session, true).unwrap_or(false)
    }

    /// Uploads local changes and triggers the cook.
    ///
    /// A node that is gone from the session is recreated first, and then
    /// everything is uploaded. A session-sync cook uploads nothing.
    fn start_recook(
        &mut self,
        session: &mut dyn Session,
        options: CookOptions,
        upload_preset: bool,
        session_sync: bool,
    ) -> Result<(), ControllerError> {
        if self.baked {
            return Err(ControllerError::Baked);
        }
        if !session.is_valid() {
            return Err(ControllerError::SessionUnavailable);
        }
        if !options.skip_cook_check && !self.config.cooking_enabled {
            return Err(ControllerError::CookingDisabled);
        }
        if self.cooking_paused {
            return Err(ControllerError::Paused);
        }

        let mut force = !options.check_parameters_changed;
        let recreated = !self.is_valid_in_session(session);
        if recreated {
            self.recreate_node(session)?;
            force = true;
        }
        let node = self.require_node()?;

        if !session_sync {
            // Transform first: the definition may derive parameters from it.
            self.upload_transform(session, !recreated)?;

            if options.upload_parameters || force {
                if !self.parameters.belongs_to(node) {
                    return Err(ControllerError::ParameterNodeMismatch);
                }
                if self.parameters.has_pending_modifiers() {
                    self.parameters.process_modifiers(session)?;
                } else {
                    let sent = self.parameters.upload_values(session, !force)?;
                    log::trace!("AssetController: uploaded {sent} parameter value(s).");
                }
            }
            if upload_preset {
                self.parameters.upload_preset(session)?;
            }
            if !recreated {
                self.upload_curves(session, upload_preset)?;
            }
            self.upload_attributes(session)?;
            self.upload_inputs(session, node, force || options.force_upload_inputs);
        }

        session.cook_node(node, &self.config.cook_node_options())?;
        self.set_status(CookStatus::Cooking);
        log::debug!("AssetController: cooking '{}'.", self.label());
        Ok(())
    }

    fn recreate_node(&mut self, session: &mut dyn Session) -> Result<(), ControllerError> {
        log::info!(
            "AssetController: node of '{}' is not valid in the session, recreating it.",
            self.label()
        );
        self.node = None;
        if self.kind.builtin_operator().is_none() {
            self.load_library(session, false)?;
        }
        let operator = self.resolve_operator()?;
        let node = self.create_and_cook_node(session, &operator)?;
        self.node = Some(node);
        self.session_id = Some(session.id());
        self.synced_transform = None;
        session.register_asset(node, self.key)?;

        self.refresh_info(session, node)?;
        self.create_inputs(session, node)?;
        for input in &mut self.inputs {
            input.requires_upload = true;
        }

        if self.parameters.is_initialized() {
            self.parameters.rebind(node);
        } else {
            self.parameters.generate(&*session, node)?;
            self.parameters.download_default_preset(&*session)?;
        }
        for key in self.graph.curve_keys().to_vec() {
            if let Some(curve) = self.graph.curve_mut(key).filter(|c| c.geo.is_none()) {
                curve.node = node;
                if curve.parameters.is_initialized() {
                    curve.parameters.rebind(node);
                }
            }
        }
        Ok(())
    }

    /// Uploads the host transform, optionally only if it changed.
    pub(super) fn upload_transform(&mut self, session: &mut dyn Session, only_if_changed: bool) -> Result<(), ControllerError> {
        if !self.config.push_transform {
            return Ok(());
        }
        let node = self.require_node()?;
        if self.transform.has_zero_scale() {
            log::debug!(
                "AssetController: not uploading a zero-scale transform for '{}'.",
                self.label()
            );
            // Counted as seen so it does not trigger another transform cook.
            self.synced_transform = Some(self.transform);
            return Ok(());
        }
        if only_if_changed && !self.transform_changed() {
            return Ok(());
        }
        session.set_object_transform(node, &self.transform)?;
        self.synced_transform = Some(self.transform);
        Ok(())
    }

    fn upload_curves(&mut self, session: &mut dyn Session, upload_preset: bool) -> Result<(), ControllerError> {
        for key in self.graph.curve_keys().to_vec() {
            let Some(curve) = self.graph.curve_mut(key) else {
                continue;
            };
            if !curve.parameters.belongs_to(curve.node) {
                continue;
            }
            if upload_preset {
                curve.parameters.upload_preset(session)?;
            } else {
                curve.parameters.upload_values(session, true)?;
            }
        }
        Ok(())
    }

    fn upload_attributes(&mut self, session: &mut dyn Session) -> Result<(), ControllerError> {
        for store in self.graph.attribute_stores_mut().filter(|s| s.is_dirty()) {
            let sent = store.upload(session)?;
            log::trace!("AssetController: uploaded {sent} attribute(s).");
        }
        Ok(())
    }

    /// Pushes dirty connection inputs. A connection the session refuses
    /// stays dirty and is retried with the next cook.
    fn upload_inputs(&mut self, session: &mut dyn Session, node: NodeId, force: bool) {
        for input in &mut self.inputs {
            if let Err(err) = input.upload(session, node, force) {
                log::warn!(
                    "AssetController: could not connect input '{}': {err}",
                    input.name
                );
            }
        }
    }

    /// Polls the running cook.
    ///
    /// Returns `None` while a non-blocking poll finds the cook still running,
    /// and whether the cook succeeded once it is done.
    pub(super) fn process_cook_status(&mut self, session: &mut dyn Session, blocking: bool) -> Option<bool> {
        let Some(node) = self.node else {
            self.fail_cook(&ControllerError::SessionUnavailable);
            return Some(false);
        };
        if !session.is_valid() {
            log::warn!(
                "AssetController: no session while cooking '{}'.",
                self.label()
            );
            self.finish(CookStatus::None, CookResult::Errored);
            return Some(false);
        }

        let state = loop {
            match session.poll_cook_state(node) {
                Ok(CookState::Running) if !blocking => {
                    log::trace!("AssetController: '{}' is still cooking.", self.label());
                    return None;
                }
                Ok(CookState::Running) => self.wait_poll_interval(),
                Ok(state) => break state,
                Err(err) => {
                    log::error!(
                        "AssetController: lost the session while cooking '{}': {err}",
                        self.label()
                    );
                    self.finish(CookStatus::None, CookResult::Errored);
                    return Some(false);
                }
            }
        };

        match state {
            CookState::ReadyWithFatalErrors => {
                let message = session.cook_status_message(node);
                log::error!(
                    "AssetController: cook of '{}' failed: {message}",
                    self.label()
                );
                self.finish(CookStatus::None, CookResult::Errored);
                return Some(false);
            }
            CookState::ReadyWithWarnings => self.record_cook_warning(session, node),
            _ => {}
        }

        self.finish(CookStatus::PostCook, CookResult::Success);
        if let Err(err) = self.process_post_cook(session, node) {
            log::error!(
                "AssetController: processing the cook of '{}' failed: {err}",
                self.label()
            );
            self.last_result = CookResult::Errored;
        }
        Some(self.last_result == CookResult::Success)
    }

    /// Polls until the session reports the cook as finished.
    pub(super) fn poll_blocking(&self, session: &mut dyn Session, node: NodeId) -> Result<CookState, ControllerError> {
        loop {
            match session.poll_cook_state(node)? {
                CookState::Running => self.wait_poll_interval(),
                state => return Ok(state),
            }
        }
    }

    fn wait_poll_interval(&self) {
        if let Some(interval) = self.config.poll_interval() {
            std::thread::sleep(interval);
        }
    }

    fn process_post_cook(&mut self, session: &mut dyn Session, node: NodeId) -> Result<(), ControllerError> {
        self.refresh_info(session, node)?;
        self.total_cook_count = session.total_cook_count(node)?;

        self.parameters.generate(&*session, node)?;
        self.parameters.download_preset(&*session)?;

        self.generate_objects(session, node)?;
        if self.upstream_cook_changed {
            self.upstream_cook_changed = false;
            for store in self.graph.attribute_stores_mut() {
                store.mark_all_dirty();
                store.upload(session)?;
            }
        }
        for volume in self.graph.volumes_mut() {
            volume.dirty = false;
        }
        self.apply_recook_preset();
        Ok(())
    }

    /// Refreshes materials, reconciles objects and regenerates curves and
    /// handles from the node's current state.
    pub(super) fn generate_objects(&mut self, session: &mut dyn Session, node: NodeId) -> Result<(), ControllerError> {
        let objects = session.object_infos(node)?;

        let materials: BTreeSet<MaterialId> = objects
            .iter()
            .flat_map(|o| o.geos.iter())
            .flat_map(|g| g.parts.iter())
            .filter_map(|p| p.material)
            .collect();
        if let Err(err) = self.materials.refresh(&*session, &materials) {
            log::warn!(
                "AssetController: could not refresh materials of '{}': {err}",
                self.label()
            );
        }

        let diagnostics = reconcile_objects(&mut self.graph, &objects);
        self.diagnostics.extend(diagnostics);
        self.sync_curves(session)?;
        self.handles.regenerate(&session.handle_infos(node)?);

        let dropped = self
            .materials
            .retain_referenced(&self.graph.referenced_materials());
        if dropped > 0 {
            log::debug!("AssetController: dropped {dropped} unused material(s).");
        }
        Ok(())
    }

    /// Regenerates curve parameters. A curve whose node changed gets its
    /// last preset uploaded to the new node.
    fn sync_curves(&mut self, session: &mut dyn Session) -> Result<(), ControllerError> {
        for key in self.graph.curve_keys().to_vec() {
            let Some(curve) = self.graph.curve_mut(key) else {
                continue;
            };
            let node = curve.node;
            if curve.parameters.belongs_to(node) {
                curve.parameters.generate(&*session, node)?;
            } else if curve.parameters.is_initialized() && !curve.parameters.preset().is_empty() {
                curve.parameters.rebind(node);
                curve.parameters.upload_preset(session)?;
            } else {
                curve.parameters.generate(&*session, node)?;
                curve.parameters.download_default_preset(&*session)?;
            }
            curve.parameters.download_preset(&*session)?;
        }
        Ok(())
    }

    fn apply_recook_preset(&mut self) {
        if self.recook_preset.is_empty() {
            return;
        }
        let recook = std::mem::take(&mut self.recook_preset);
        let (applied, diagnostics) = preset_lane::apply_recook(&recook, &mut self.graph, &mut self.inputs);
        self.diagnostics.extend(diagnostics);
        if applied {
            log::debug!(
                "AssetController: deferred presets applied to '{}', queueing a cook.",
                self.label()
            );
            self.request_cook(CookOptions {
                check_parameters_changed: false,
                skip_cook_check: true,
                upload_parameters: false,
                force_upload_inputs: false,
            });
        }
    }

    /// Recooks without uploading when someone else cooked the node.
    pub(super) fn update_session_sync(&mut self, session: &mut dyn Session) {
        if !self.config.session_sync_auto_cook || !self.is_valid_in_session(session) {
            return;
        }
        let Some(node) = self.node else {
            return;
        };
        let Ok(count) = session.total_cook_count(node) else {
            return;
        };
        if count == self.total_cook_count {
            return;
        }
        log::info!(
            "AssetController: '{}' was cooked in the session ({} -> {}), syncing.",
            self.label(),
            self.total_cook_count,
            count
        );
        self.total_cook_count = count;

        let options = CookOptions {
            check_parameters_changed: true,
            upload_parameters: false,
            ..Default::default()
        };
        if let Err(err) = self.start_recook(session, options, false, true) {
            self.fail_cook(&err);
            self.complete(AssetEventKind::Cook);
        }
    }

    pub(super) fn record_cook_warning(&mut self, session: &dyn Session, node: NodeId) {
        let message = session.cook_status_message(node);
        log::warn!(
            "AssetController: '{}' cooked with errors: {message}",
            self.label()
        );
        self.diagnostics.push(Diagnostic::CookWarning { message });
    }

    fn fail_cook(&mut self, err: &ControllerError) {
        match err {
            ControllerError::CookingDisabled | ControllerError::Paused | ControllerError::Baked => {
                log::warn!("AssetController: not cooking '{}': {err}", self.label());
            }
            _ => log::error!("AssetController: cook of '{}' failed: {err}", self.label()),
        }
        self.finish(CookStatus::None, CookResult::Errored);
    }

    fn require_node(&self) -> Result<NodeId, ControllerError> {
        self.node.ok_or_else(|| {
            ControllerError::Session(SessionError::NotFound(format!("node of asset {}", self.key)))
        })
    }
}
