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

//! Dirty-tracked parameter values of one session node.
//!
//! The set keeps three views of the same parameters: the local values the host
//! edits, the values last synced with the session, and an opaque preset blob
//! the session exported. Uploading compares the first two.

use kiln_core::session::{NodeId, ParmModifier, ParmValue, ParmValues, Session, SessionResult};

/// Parameter store for one asset, curve, or input node.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    node: Option<NodeId>,
    values: ParmValues,
    synced: ParmValues,
    modifiers: Vec<ParmModifier>,
    preset: Vec<u8>,
    default_preset: Vec<u8>,
}

impl ParameterSet {
    /// Creates an empty set not bound to any node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Node the set was last generated from.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Returns `true` once the set has been generated from a node.
    pub fn is_initialized(&self) -> bool {
        self.node.is_some()
    }

    /// Returns `true` if the set was generated from `node`.
    pub fn belongs_to(&self, node: NodeId) -> bool {
        self.node == Some(node)
    }

    /// Regenerates the set from the session.
    ///
    /// Local edits are discarded: after this call the local values equal the
    /// session's. Pending modifiers are kept.
    pub fn generate(&mut self, session: &dyn Session, node: NodeId) -> SessionResult<()> {
        let values = session.parameter_values(node)?;
        self.node = Some(node);
        self.synced = values.clone();
        self.values = values;
        Ok(())
    }

    /// Binds the set to a recreated node, keeping the local values.
    ///
    /// Everything is marked dirty, so the next upload sends all of it.
    pub fn rebind(&mut self, node: NodeId) {
        self.node = Some(node);
        self.mark_all_dirty();
    }

    /// Current local value of `name`.
    pub fn get(&self, name: &str) -> Option<&ParmValue> {
        self.values.get(name)
    }

    /// All local values.
    pub fn values(&self) -> &ParmValues {
        &self.values
    }

    /// Sets a local value. Returns `false` for unknown parameters.
    pub fn set(&mut self, name: &str, value: ParmValue) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if any local value differs from the session's.
    pub fn has_changed(&self) -> bool {
        self.values != self.synced
    }

    /// Forgets the last synced state so the next upload sends everything.
    pub fn mark_all_dirty(&mut self) {
        self.synced.clear();
    }

    /// Uploads local values.
    ///
    /// With `changed_only`, only values that differ from the last sync are
    /// sent. Returns the number of values sent.
    pub fn upload_values(&mut self, session: &mut dyn Session, changed_only: bool) -> SessionResult<usize> {
        let node = self.require_node()?;
        let outgoing: ParmValues = if changed_only {
            self.values
                .iter()
                .filter(|(name, value)| self.synced.get(*name) != Some(*value))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        } else {
            self.values.clone()
        };

        if !outgoing.is_empty() {
            session.set_parameter_values(node, &outgoing)?;
        }
        self.synced = self.values.clone();
        Ok(outgoing.len())
    }

    /// Queues a structural change for the next upload pass.
    pub fn push_modifier(&mut self, modifier: ParmModifier) {
        self.modifiers.push(modifier);
    }

    /// Returns `true` if structural changes are waiting.
    pub fn has_pending_modifiers(&self) -> bool {
        !self.modifiers.is_empty()
    }

    /// Applies every queued modifier, then re-reads the values.
    pub fn process_modifiers(&mut self, session: &mut dyn Session) -> SessionResult<()> {
        let node = self.require_node()?;
        for modifier in self.modifiers.drain(..) {
            session.apply_parameter_modifier(node, &modifier)?;
        }
        self.generate(session, node)
    }

    /// Opaque preset blob last downloaded or set.
    pub fn preset(&self) -> &[u8] {
        &self.preset
    }

    /// Replaces the local preset blob without uploading it.
    pub fn set_preset(&mut self, preset: Vec<u8>) {
        self.preset = preset;
    }

    /// Refreshes the preset blob from the session.
    pub fn download_preset(&mut self, session: &dyn Session) -> SessionResult<()> {
        let node = self.require_node()?;
        self.preset = session.parameter_preset(node)?;
        Ok(())
    }

    /// Refreshes the blob used by [`ParameterSet::reset_to_default`].
    pub fn download_default_preset(&mut self, session: &dyn Session) -> SessionResult<()> {
        let node = self.require_node()?;
        self.default_preset = session.parameter_preset(node)?;
        Ok(())
    }

    /// Pushes the local preset blob to the session and re-reads the values.
    pub fn upload_preset(&mut self, session: &mut dyn Session) -> SessionResult<()> {
        let node = self.require_node()?;
        if !self.preset.is_empty() {
            session.set_parameter_preset(node, &self.preset)?;
        }
        self.generate(session, node)
    }

    /// Restores the defaults captured when the node was created.
    ///
    /// Pending modifiers are dropped and every value is marked dirty.
    pub fn reset_to_default(&mut self, session: &mut dyn Session) -> SessionResult<()> {
        let node = self.require_node()?;
        self.modifiers.clear();
        if !self.default_preset.is_empty() {
            session.set_parameter_preset(node, &self.default_preset)?;
        }
        self.generate(session, node)?;
        self.preset = self.default_preset.clone();
        self.mark_all_dirty();
        Ok(())
    }

    /// Forgets the node binding and every value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn require_node(&self) -> SessionResult<NodeId> {
        self.node
            .ok_or_else(|| kiln_core::SessionError::call_failed("parameters", "set was never generated"))
    }
}
