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

//! Minimal linear algebra used by the draw-submission core.
//!
//! Only what the core needs to move data to the GPU is provided: column-major
//! matrices for instance transforms and camera uniforms, and bounding boxes for
//! the culling hook exposed to scene collaborators.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub mod geometry;
pub mod matrix;
pub mod vector;

pub use self::geometry::Aabb;
pub use self::matrix::Mat4;
pub use self::vector::{Vec3, Vec4};

/// Returns `true` if `a` and `b` are within [`EPSILON`] of each other.
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}
