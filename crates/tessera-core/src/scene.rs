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

//! The narrow interface through which the scene feeds the draw core.

use crate::math::{Aabb, Mat4};

/// Identifies a mesh owned by the resource collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

/// Identifies a material owned by the resource collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

/// One object the scene may want drawn this frame.
///
/// Objects lacking a mesh or a material, or flagged inactive, are skipped by
/// batch assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderable {
    /// The object's mesh, if it has one.
    pub mesh: Option<MeshId>,
    /// The object's material, if it has one.
    pub material: Option<MaterialId>,
    /// The object-to-world transform.
    pub transform: Mat4,
    /// Whether the object takes part in this frame.
    pub active: bool,
}

impl Renderable {
    /// An active renderable with both a mesh and a material.
    pub fn new(mesh: MeshId, material: MaterialId, transform: Mat4) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
            transform,
            active: true,
        }
    }
}

/// Where a mesh's indices live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshGeometry {
    /// The number of indices of the mesh.
    pub index_count: u32,
    /// The first index of the mesh in its index buffer.
    pub first_index: u32,
    /// The value added to each index before reading the vertex buffer.
    pub base_vertex: i32,
}

/// Supplies the active objects and mesh metadata for a frame.
pub trait SceneSource {
    /// The objects to consider this frame. Iteration order only affects
    /// tie-breaking inside a batch.
    fn active_renderables(&self) -> Vec<Renderable>;

    /// The index count of `mesh`, or `None` if the mesh is unknown.
    fn mesh_index_count(&self, mesh: MeshId) -> Option<u32>;

    /// The object-space collision bounds of `mesh`, for culling.
    fn mesh_collision_bounds(&self, mesh: MeshId) -> Option<Aabb>;

    /// The location of `mesh` in its index and vertex buffers.
    ///
    /// Sources that pack every mesh into one shared buffer override this; the
    /// default describes a mesh with its own buffers.
    fn mesh_geometry(&self, mesh: MeshId) -> Option<MeshGeometry> {
        self.mesh_index_count(mesh).map(|index_count| MeshGeometry {
            index_count,
            first_index: 0,
            base_vertex: 0,
        })
    }
}

/// Per-frame camera matrices, uploaded to the uniform bound at subpass 0.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CameraUniformData {
    /// World-to-view transform.
    pub view: Mat4,
    /// View-to-clip transform.
    pub projection: Mat4,
    /// `projection * view`.
    pub view_projection: Mat4,
}

impl CameraUniformData {
    /// Builds the uniform from a view and a projection matrix.
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            view_projection: projection * view,
        }
    }
}

impl Default for CameraUniformData {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}
