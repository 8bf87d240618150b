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

//! # Kiln Data
//!
//! Local state derived from a session: the arena of generated objects,
//! geometry, and parts, the dirty-tracked parameter store, and the auxiliary
//! entities (inputs, handles, materials) an asset keeps between cooks.

#![warn(missing_docs)]

pub mod graph;
pub mod handles;
pub mod inputs;
pub mod materials;
pub mod parameters;

pub use graph::*;
pub use handles::{Handle, HandleSet};
pub use inputs::{InputKind, InputNode};
pub use materials::{MaterialCache, MaterialData};
pub use parameters::ParameterSet;
