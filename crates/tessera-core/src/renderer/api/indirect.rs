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

//! GPU-visible records exchanged between the batching stages.
//!
//! Every type here is `#[repr(C)]` and [`bytemuck::Pod`] so that it can be
//! uploaded as-is and mirrored field-for-field by the WGSL structs of the
//! compute chain. The sizes are asserted in the tests below because a layout
//! mismatch between host and shader corrupts draws silently.

use crate::math::Mat4;

/// The per-object record fed to the sort and compaction stages.
///
/// One record is produced for every drawable object. `first` is the object's
/// slot in the per-frame instance buffer; `count` is the number of instances the
/// record stands for (always 1 for a single object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct BatchRecord {
    /// Slot of the object in the instance storage buffer.
    pub first: u32,
    /// Number of instances covered by this record.
    pub count: u32,
    /// Index count of the object's mesh. Immutable per mesh.
    pub index_count: u32,
    /// Dense batch index of the object's (mesh, material) pair.
    pub batch_index: u32,
}

/// One compacted draw, stored at slot `[batch_index]` of the descriptor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DrawDescriptor {
    /// The lowest instance slot of the batch's run.
    pub first: u32,
    /// The run length, i.e. the instance count of the draw.
    pub count: u32,
    /// The batch the descriptor belongs to.
    pub batch_index: u32,
    /// Keeps the struct 16-byte aligned for storage buffers.
    pub padding: u32,
}

/// Arguments of one indexed indirect draw, in the layout consumed by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DrawIndexedIndirectArgs {
    /// The number of indices to draw.
    pub index_count: u32,
    /// The number of instances to draw.
    pub instance_count: u32,
    /// The first index within the index buffer.
    pub first_index: u32,
    /// The value added to each index before reading the vertex buffer.
    pub base_vertex: i32,
    /// The instance ID of the first instance to draw.
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// The stride between consecutive commands in an indirect buffer.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Where a batch's mesh lives in its index and vertex buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct BatchGeometry {
    /// The number of indices of the mesh.
    pub index_count: u32,
    /// The first index of the mesh in a shared index buffer (0 for per-mesh buffers).
    pub first_index: u32,
    /// The base vertex of the mesh in a shared vertex buffer (0 for per-mesh buffers).
    pub base_vertex: i32,
    /// Keeps the struct 16-byte aligned for storage buffers.
    pub padding: u32,
}

/// Per-instance data read by the vertex stage through `instance_index`.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct InstanceData {
    /// The object-to-world transform.
    pub model: Mat4,
}

/// Uniform parameters shared by the compute chain's dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ChainParams {
    /// The number of valid entries in the record and index buffers.
    pub object_count: u32,
    /// The number of batches, i.e. valid descriptor slots.
    pub batch_count: u32,
    /// The parity of the odd-even sort pass (0 or 1). Ignored by other stages.
    pub parity: u32,
    /// Keeps the struct 16 bytes wide for uniform buffers.
    pub padding: u32,
}
