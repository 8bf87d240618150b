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

//! Identity and descriptive types for procedural assets.
//!
//! An asset is the locally-held counterpart of a node living inside an
//! external engine session. This module only describes *what* an asset is;
//! driving it through load and cook cycles is the job of the controller in
//! `kiln-agents`.

mod key;
mod status;

pub use key::*;
pub use status::*;

use crate::preset::AssetPreset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Operator name of the built-in editable curve.
pub const CURVE_OPERATOR: &str = "kiln::curve";
/// Operator name of the built-in input holder.
pub const INPUT_OPERATOR: &str = "kiln::input";

/// The kind of node that backs an asset in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AssetKind {
    /// Instantiated from a definition found in a loaded library.
    #[default]
    Definition,
    /// An inline, editable curve node.
    Curve,
    /// An inline node that only carries input geometry.
    InputOnly,
}

impl AssetKind {
    /// Operator of the inline kinds. `None` for definitions loaded from a library.
    pub fn builtin_operator(self) -> Option<&'static str> {
        match self {
            AssetKind::Definition => None,
            AssetKind::Curve => Some(CURVE_OPERATOR),
            AssetKind::InputOnly => Some(INPUT_OPERATOR),
        }
    }
}

/// Where a [`AssetKind::Definition`] asset loads its library from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetSource {
    /// Path to the library file. `None` for inline kinds.
    pub path: Option<PathBuf>,
    /// Read the file into memory first and hand the buffer to the session.
    pub load_from_memory: bool,
    /// Overwrite an already-loaded library of the same name without asking.
    pub always_overwrite: bool,
}

impl AssetSource {
    /// A source that loads the library straight from `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// A source for inline kinds that have no backing file.
    pub fn inline() -> Self {
        Self::default()
    }

    /// Returns `true` if a non-empty path is set.
    pub fn has_valid_path(&self) -> bool {
        self.path
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty())
    }
}

/// How a controller came into existence.
///
/// Supplied by the caller at construction time instead of being guessed from
/// the shape of the restored state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CreationMode {
    /// A brand new asset.
    #[default]
    Fresh,
    /// A copy of another asset. The preset seeds the first rebuild.
    Duplicate(AssetPreset),
    /// Restored after deletion (e.g. by an undo). Rebuilt on the first update.
    Restored,
}
