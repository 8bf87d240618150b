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

use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};

/// A translation, rotation (quaternion `[x, y, z, w]`), and scale triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position in parent space.
    pub translation: [f32; 3],
    /// Unit quaternion stored as `[x, y, z, w]`.
    pub rotation: [f32; 4],
    /// Per-axis scale.
    pub scale: [f32; 3],
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };

    /// Creates a transform with only a translation.
    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Returns a copy with the scale replaced.
    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    /// Returns `true` if any scale component is zero.
    ///
    /// The session rejects degenerate transforms, so these are never pushed.
    pub fn has_zero_scale(&self) -> bool {
        self.scale.iter().any(|s| *s == 0.0)
    }

    fn components(&self) -> impl Iterator<Item = f32> + '_ {
        self.translation
            .iter()
            .chain(self.rotation.iter())
            .chain(self.scale.iter())
            .copied()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AbsDiffEq for Transform {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.components()
            .zip(other.components())
            .all(|(a, b)| a.abs_diff_eq(&b, epsilon))
    }
}

impl RelativeEq for Transform {
    fn default_max_relative() -> f32 {
        f32::EPSILON
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.components()
            .zip(other.components())
            .all(|(a, b)| a.relative_eq(&b, epsilon, max_relative))
    }
}
