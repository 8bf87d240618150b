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

//! # Kiln Core
//!
//! Foundational crate containing the session contract, core types, and the
//! primitives that describe an asset's build and cook lifecycle.
//!
//! Nothing in here talks to a real content-generation engine. Higher-level
//! crates implement or consume the [`session::Session`] trait.

#![warn(missing_docs)]

pub mod asset;
pub mod event;
pub mod math;
pub mod preset;
pub mod session;

pub use asset::{
    AssetKey, AssetKind, AssetSource, BuildAction, CookOptions, CookResult, CookStatus,
    CreationMode,
};
pub use event::{AssetEvent, AssetEventKind, Diagnostic, EventBus, OutputRef};
pub use math::Transform;
pub use session::{Session, SessionError, SessionResult};
