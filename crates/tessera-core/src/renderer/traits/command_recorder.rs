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

use crate::renderer::api::{
    BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor, ComputePipelineId,
    IndexFormat, RenderPassDescriptor, RenderPipelineId,
};
use crate::renderer::error::ResourceError;

/// A trait representing an active render pass, used for recording drawing commands.
///
/// A `RenderPass` object is obtained from a [`CommandEncoder`] and provides methods
/// to set pipeline state and issue indirect draw calls.
///
/// The `'pass` lifetime ensures that the pass object cannot outlive the [`CommandEncoder`]
/// that created it. Resources are passed by ID; the backend keeps them alive for
/// as long as the recorded commands need them.
pub trait RenderPass<'pass> {
    /// Sets the active render pipeline for subsequent draw calls.
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId);

    /// Binds a bind group at the given group index.
    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId);

    /// Binds a vertex buffer to a specific slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &BufferId, offset: u64);

    /// Binds an index buffer for indexed drawing.
    fn set_index_buffer(&mut self, buffer: &BufferId, offset: u64, index_format: IndexFormat);

    /// Records one indexed draw whose arguments are read from `indirect_buffer`
    /// at `indirect_offset`.
    fn draw_indexed_indirect(&mut self, indirect_buffer: &BufferId, indirect_offset: u64);

    /// Records `count` consecutive indexed indirect draws.
    fn multi_draw_indexed_indirect(
        &mut self,
        indirect_buffer: &BufferId,
        indirect_offset: u64,
        count: u32,
    );

    /// Records indexed indirect draws whose count is read from `count_buffer`
    /// on the GPU, clamped to `max_count`.
    ///
    /// Only valid on devices reporting
    /// [`DeviceFeature::MultiDrawIndirectCount`](crate::renderer::api::DeviceFeature::MultiDrawIndirectCount).
    fn multi_draw_indexed_indirect_count(
        &mut self,
        indirect_buffer: &BufferId,
        indirect_offset: u64,
        count_buffer: &BufferId,
        count_offset: u64,
        max_count: u32,
    );
}

/// A trait representing an active compute pass, used for recording dispatch commands.
///
/// The end of a compute pass is a full execution and memory barrier: every
/// write made by its dispatches is visible to the next pass.
pub trait ComputePass<'pass> {
    /// Sets the active compute pipeline.
    fn set_pipeline(&mut self, pipeline: &ComputePipelineId);

    /// Binds a bind group at the given group index.
    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId);

    /// Dispatches a grid of workgroups.
    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// A `CommandEncoder` is the main tool for building a [`CommandBufferId`]. It creates
/// render and compute passes, and can also record commands that happen outside of a
/// pass, such as buffer clears and copies.
pub trait CommandEncoder {
    /// Begins a new render pass, returning a mutable `RenderPass` object.
    ///
    /// The returned `RenderPass` object borrows the encoder mutably, so only one
    /// pass can be active at a time. When the `RenderPass` object is dropped,
    /// the pass is ended. The descriptor is only read while the pass begins.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NotFound`] if an attachment view does not exist. No
    /// pass is begun in that case.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Result<Box<dyn RenderPass<'encoder> + 'encoder>, ResourceError>;

    /// Begins a new compute pass, returning a mutable `ComputePass` object.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder>;

    /// Records a command filling `size` bytes of `buffer` (or the rest of it) with zeros.
    fn clear_buffer(&mut self, buffer: &BufferId, offset: u64, size: Option<u64>);

    /// Records a command to copy data from one buffer to another on the GPU.
    fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferId,
        source_offset: u64,
        destination: &BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Finalizes the command recording and returns a handle to the resulting command buffer.
    ///
    /// This method consumes the encoder. The returned [`CommandBufferId`] can then
    /// be submitted to the [`GraphicsDevice`](super::GraphicsDevice)'s command queue.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
