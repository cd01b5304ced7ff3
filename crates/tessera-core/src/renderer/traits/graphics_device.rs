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

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The contract between the draw-submission core and a concrete GPU backend.
///
/// Resources are referred to through opaque, copyable IDs. Implementations are
/// expected to be cheap to share across threads; the core itself records from a
/// single control thread.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a shader module from WGSL source.
    /// ## Errors
    /// * `ResourceError::Shader` - If the source fails to compile.
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Creates a compute pipeline whose layout is derived from its shader.
    /// ## Errors
    /// * `ResourceError` - If the shader module is unknown or pipeline creation fails.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError>;

    /// Returns the layout of bind group `group` of a compute pipeline.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the pipeline ID is unknown.
    fn compute_pipeline_bind_group_layout(
        &self,
        pipeline: ComputePipelineId,
        group: u32,
    ) -> Result<BindGroupLayoutId, ResourceError>;

    /// Creates a bind group layout from explicit entries.
    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError>;

    /// Creates a bind group.
    /// ## Errors
    /// * `ResourceError::NotFound` - If the layout or a bound buffer is unknown.
    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError>;

    /// Destroys a bind group.
    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError>;

    /// Creates a new GPU buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer and initializes it with the provided data.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Schedules a write of `data` into a buffer. The write is ordered before
    /// any command buffer submitted afterwards.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `offset + data.len()` exceeds the buffer size.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a 2D texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates the default view of a texture.
    fn create_texture_view(&self, texture: TextureId) -> Result<TextureViewId, ResourceError>;

    /// Destroys a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a new command encoder to record GPU commands.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a finished command buffer to the queue.
    ///
    /// Returns the submission's ID, which acts as its fence.
    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionId, RenderError>;

    /// Blocks until all work of `submission` has completed on the GPU.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was lost while waiting.
    fn wait_for_submission(&self, submission: SubmissionId) -> Result<(), RenderError>;

    /// Returns `true` if the device supports `feature`.
    fn supports_feature(&self, feature: DeviceFeature) -> bool;
}

/// The presentation side of a frame: acquires the target to render into and
/// presents it once the frame's work is submitted.
///
/// Presentation failures are fatal for the frame; recreating the underlying
/// surface is left to the owner of the presenter.
pub trait SurfacePresenter: Debug {
    /// Acquires the view the current frame renders into.
    fn acquire(&mut self) -> Result<TextureViewId, RenderError>;

    /// Presents the acquired frame.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Gives back an acquired frame that will not be presented, e.g. because
    /// its recording failed.
    fn release(&mut self) {}

    /// The current size of the presentation target.
    fn extent(&self) -> Extent2D;

    /// The pixel format of the presentation target.
    fn format(&self) -> TextureFormat;
}
