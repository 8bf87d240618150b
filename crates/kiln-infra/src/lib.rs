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

//! # Kiln Infra
//!
//! Concrete implementations of the contracts defined in `kiln-core`.
//!
//! The only backend shipped today is [`MemorySession`], a deterministic
//! in-process session that evaluates definitions described in RON libraries.

#![warn(missing_docs)]

pub mod session;

pub use session::memory::{
    Definition, GeoTemplate, Library, MemorySession, ObjectTemplate, PartTemplate,
    CURVE_OPERATOR, INPUT_OPERATOR,
};
