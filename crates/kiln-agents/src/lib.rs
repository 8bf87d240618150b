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

//! # Kiln Agents
//!
//! Controllers that drive a single procedural asset through its load and cook
//! lifecycle against a [`Session`](kiln_core::Session).
//!
//! An [`AssetController`] owns everything derived from one session node and is
//! advanced one step at a time by its host. Requests are queued in a single
//! slot ([`BuildRequestQueue`]) and every request is answered by exactly one
//! [`AssetEvent`](kiln_core::AssetEvent).

#![warn(missing_docs)]

pub mod asset_controller;

pub use asset_controller::{
    AssetController, BuildRequestQueue, ControllerConfig, ControllerError, PendingRequest,
    RequestOutcome,
};
