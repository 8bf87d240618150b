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

//! Interactive handles bound to parameters.

use kiln_core::session::HandleInfo;

/// A manipulator the host can display for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    /// Handle name.
    pub name: String,
    /// Manipulator type.
    pub kind: String,
    /// Parameters the handle drives.
    pub bound_parameters: Vec<String>,
    /// Number of cooks this handle has survived.
    pub generations: u32,
}

/// The handles of one asset, regenerated after every cook.
#[derive(Debug, Clone, Default)]
pub struct HandleSet {
    handles: Vec<Handle>,
}

impl HandleSet {
    /// Replaces the set with `infos`, reusing handles by name.
    pub fn regenerate(&mut self, infos: &[HandleInfo]) {
        let mut previous = std::mem::take(&mut self.handles);
        for info in infos {
            let handle = match previous.iter().position(|h| h.name == info.name) {
                Some(index) => {
                    let mut handle = previous.swap_remove(index);
                    handle.kind = info.kind.clone();
                    handle.bound_parameters = info.bound_parameters.clone();
                    handle.generations += 1;
                    handle
                }
                None => Handle {
                    name: info.name.clone(),
                    kind: info.kind.clone(),
                    bound_parameters: info.bound_parameters.clone(),
                    generations: 0,
                },
            };
            self.handles.push(handle);
        }
        if !previous.is_empty() {
            log::debug!("HandleSet: dropped {} stale handle(s).", previous.len());
        }
    }

    /// Current handles.
    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.handles.iter()
    }

    /// Number of handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if there are no handles.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Removes every handle.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}
