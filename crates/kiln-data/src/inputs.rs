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

//! Geometry inputs of an asset.

use kiln_core::session::{InputConnection, InputSource, NodeId, Session, SessionResult};
use kiln_core::AssetKey;

/// How an input reaches the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// A geometry input slot of the asset node.
    Connection,
    /// An input exposed as a parameter. Its value travels with the
    /// parameter upload.
    Parameter,
}

/// One input of an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct InputNode {
    /// Input name.
    pub name: String,
    /// Slot index for connection inputs, or position for parameter inputs.
    pub index: usize,
    /// How the input is uploaded.
    pub kind: InputKind,
    /// What is currently connected.
    pub connection: InputConnection,
    /// Whether the connection must be pushed before the next cook.
    pub requires_upload: bool,
}

impl InputNode {
    /// A disconnected slot input.
    pub fn connection(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            kind: InputKind::Connection,
            connection: InputConnection::default(),
            requires_upload: false,
        }
    }

    /// A parameter-backed input.
    pub fn parameter(name: impl Into<String>, index: usize) -> Self {
        Self {
            kind: InputKind::Parameter,
            ..Self::connection(name, index)
        }
    }

    /// Replaces the connection and marks the input dirty.
    pub fn connect(&mut self, connection: InputConnection) {
        if self.connection != connection {
            self.connection = connection;
            self.requires_upload = true;
        }
    }

    /// Returns the upstream asset, if this input is fed by one.
    pub fn upstream_asset(&self) -> Option<AssetKey> {
        match self.connection.source {
            InputSource::Asset(key) => Some(key),
            _ => None,
        }
    }

    /// Pushes the connection to `asset_node` when needed.
    ///
    /// Parameter inputs are never pushed here. Returns `true` if a session
    /// call was made.
    pub fn upload(&mut self, session: &mut dyn Session, asset_node: NodeId, force: bool) -> SessionResult<bool> {
        if self.kind == InputKind::Parameter || !(force || self.requires_upload) {
            return Ok(false);
        }
        session.connect_input(asset_node, self.index, &self.connection)?;
        self.requires_upload = false;
        Ok(true)
    }
}
