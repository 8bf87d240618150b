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

//! # Kiln Control
//!
//! The external tick driver. An [`AssetUpdater`] owns a set of
//! [`AssetController`](kiln_agents::AssetController)s, advances them in
//! insertion order against one session and routes "upstream cooked"
//! notifications to the assets that consume another asset's output.

#![warn(missing_docs)]

pub mod updater;

pub use updater::{AssetUpdater, IdleReport, UpdaterConfig};
