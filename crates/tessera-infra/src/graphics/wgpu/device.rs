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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use wgpu::util::DeviceExt;

use tessera_core::renderer::api::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId,
    BufferDescriptor, BufferId, CommandBufferId, ComputePipelineDescriptor, ComputePipelineId,
    DeviceFeature, RenderPipelineId, ShaderModuleDescriptor, ShaderModuleId, SubmissionId,
    TextureDescriptor, TextureId, TextureViewId,
};
use tessera_core::renderer::traits::CommandEncoder;
use tessera_core::renderer::{GraphicsDevice, PipelineError, RenderError, ResourceError, ShaderError};

use crate::graphics::wgpu::command::WgpuCommandEncoder;
use crate::graphics::wgpu::context::WgpuGraphicsContext;
use crate::graphics::wgpu::conversions::IntoWgpu;

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: Arc<wgpu::Buffer>,
    pub(crate) size: u64, // To track VRAM accurately on destruction
}

#[derive(Debug)]
pub(crate) struct WgpuTextureEntry {
    pub(crate) wgpu_texture: Arc<wgpu::Texture>,
    pub(crate) size: u64,
}

#[derive(Debug)]
struct WgpuComputePipelineEntry {
    wgpu_pipeline: Arc<wgpu::ComputePipeline>,
    label: Option<String>,
}

/// The internal, non-clonable state of the WgpuDevice.
/// This struct holds all the GPU resources and state, protected by an Arc.
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    context: Arc<Mutex<WgpuGraphicsContext>>,
    shader_modules: Mutex<HashMap<ShaderModuleId, Arc<wgpu::ShaderModule>>>,
    compute_pipelines: Mutex<HashMap<ComputePipelineId, WgpuComputePipelineEntry>>,
    render_pipelines: Mutex<HashMap<RenderPipelineId, Arc<wgpu::RenderPipeline>>>,
    bind_group_layouts: Mutex<HashMap<BindGroupLayoutId, Arc<wgpu::BindGroupLayout>>>,
    bind_groups: Mutex<HashMap<BindGroupId, Arc<wgpu::BindGroup>>>,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    texture_views: Mutex<HashMap<TextureViewId, Arc<wgpu::TextureView>>>,

    next_shader_id: AtomicUsize,
    next_compute_pipeline_id: AtomicUsize,
    next_render_pipeline_id: AtomicUsize,
    next_bind_group_layout_id: AtomicUsize,
    next_bind_group_id: AtomicUsize,
    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_texture_view_id: AtomicUsize,

    vram_allocated_bytes: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,
    /// A thread-safe counter to generate unique command buffer IDs.
    command_buffer_id_counter: AtomicU64,
    /// The ID the next submission receives.
    next_submission: AtomicU64,
    /// Every submission with an ID below this value is known to be complete.
    completed_below: AtomicU64,
}

/// A clonable, thread-safe handle to the WGPU graphics device.
/// It wraps the actual device state (`WgpuDeviceInternal`) in an Arc,
/// allowing it to be shared across threads and with command encoders.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn poisoned(table: &str, e: impl std::fmt::Display) -> ResourceError {
    ResourceError::BackendError(format!("Mutex poisoned ({table}): {e}"))
}

fn lock<'a, T>(mutex: &'a Mutex<T>, table: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex.lock().map_err(|e| poisoned(table, e))
}

impl WgpuDevice {
    pub fn new(context: Arc<Mutex<WgpuGraphicsContext>>) -> Self {
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                shader_modules: Mutex::new(HashMap::new()),
                compute_pipelines: Mutex::new(HashMap::new()),
                render_pipelines: Mutex::new(HashMap::new()),
                bind_group_layouts: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                texture_views: Mutex::new(HashMap::new()),
                next_shader_id: AtomicUsize::new(0),
                next_compute_pipeline_id: AtomicUsize::new(0),
                next_render_pipeline_id: AtomicUsize::new(0),
                next_bind_group_layout_id: AtomicUsize::new(0),
                next_bind_group_id: AtomicUsize::new(0),
                next_buffer_id: AtomicUsize::new(0),
                next_texture_id: AtomicUsize::new(0),
                next_texture_view_id: AtomicUsize::new(0),
                vram_allocated_bytes: AtomicUsize::new(0),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicU64::new(0),
                next_submission: AtomicU64::new(0),
                completed_below: AtomicU64::new(0),
            }),
        }
    }

    /// Helper function to execute an operation with the wgpu::Device locked.
    /// Returns a Result to propagate lock errors or operation errors.
    pub fn with_wgpu_device<F, R>(&self, operation: F) -> Result<R, ResourceError>
    where
        F: FnOnce(&wgpu::Device) -> Result<R, ResourceError>,
    {
        let context_guard = self.internal.context.lock().map_err(|e| {
            ResourceError::BackendError(format!("Failed to lock WgpuGraphicsContext: {e}"))
        })?;
        operation(&context_guard.device)
    }

    /// Bytes currently held by live buffers and textures.
    pub fn vram_allocated_bytes(&self) -> usize {
        self.internal.vram_allocated_bytes.load(Ordering::Relaxed)
    }

    /// Registers a render pipeline built directly on the wgpu device, e.g. by
    /// the material system, and returns the ID draws bind it with.
    pub fn register_render_pipeline(
        &self,
        pipeline: wgpu::RenderPipeline,
    ) -> Result<RenderPipelineId, ResourceError> {
        let id = RenderPipelineId(
            self.internal
                .next_render_pipeline_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.render_pipelines, "render_pipelines")?.insert(id, Arc::new(pipeline));
        Ok(id)
    }

    /// Retrieves a reference-counted pointer to the internal WGPU render pipeline.
    /// Returns `None` if the ID is invalid.
    pub fn get_wgpu_render_pipeline(&self, id: RenderPipelineId) -> Option<Arc<wgpu::RenderPipeline>> {
        let pipelines = self.internal.render_pipelines.lock().ok()?;
        pipelines.get(&id).cloned()
    }

    pub fn get_wgpu_compute_pipeline(&self, id: ComputePipelineId) -> Option<Arc<wgpu::ComputePipeline>> {
        let pipelines = self.internal.compute_pipelines.lock().ok()?;
        pipelines.get(&id).map(|entry| Arc::clone(&entry.wgpu_pipeline))
    }

    pub fn get_wgpu_bind_group_layout(&self, id: BindGroupLayoutId) -> Option<Arc<wgpu::BindGroupLayout>> {
        let layouts = self.internal.bind_group_layouts.lock().ok()?;
        layouts.get(&id).cloned()
    }

    pub fn get_wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        let groups = self.internal.bind_groups.lock().ok()?;
        groups.get(&id).cloned()
    }

    /// Retrieves a reference-counted pointer to the internal WGPU buffer.
    /// Returns `None` if the ID is invalid.
    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        let buffers = self.internal.buffers.lock().ok()?;
        buffers.get(&id).map(|entry| Arc::clone(&entry.wgpu_buffer))
    }

    pub fn get_wgpu_texture(&self, id: TextureId) -> Option<Arc<wgpu::Texture>> {
        let textures = self.internal.textures.lock().ok()?;
        textures.get(&id).map(|entry| Arc::clone(&entry.wgpu_texture))
    }

    /// Retrieves a reference-counted pointer to the internal WGPU texture view.
    /// Returns `None` if the ID is invalid.
    pub fn get_wgpu_texture_view(&self, id: &TextureViewId) -> Option<Arc<wgpu::TextureView>> {
        let views = self.internal.texture_views.lock().ok()?;
        views.get(id).cloned()
    }

    /// Polls the underlying wgpu::Device in a blocking manner.
    /// This is primarily used during shutdown to ensure all pending operations
    /// are completed before resources are destroyed.
    pub fn poll_device_blocking(&self) {
        if let Err(e) = self.wait_all() {
            log::warn!("Failed to poll device during shutdown: {e}");
        }
    }

    /// Blocks until the queue is empty, then marks every submission made so
    /// far as complete.
    fn wait_all(&self) -> Result<(), RenderError> {
        let issued = self.internal.next_submission.load(Ordering::Acquire);
        let context_guard = self
            .internal
            .context
            .lock()
            .map_err(|e| RenderError::RenderingFailed(format!("Mutex poisoned (context): {e}")))?;
        context_guard.device.poll(wgpu::PollType::wait_indefinitely()).map_err(|e| {
            log::error!("WgpuDevice: device poll failed: {e:?}");
            RenderError::DeviceLost
        })?;
        self.internal
            .completed_below
            .fetch_max(issued, Ordering::AcqRel);
        Ok(())
    }

    /// (crate-internal) Registers a finished wgpu::CommandBuffer, storing it
    /// in a map and returning an abstract ID for it.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let new_id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        match self.internal.pending_command_buffers.lock() {
            Ok(mut guard) => {
                guard.insert(new_id, buffer);
            }
            Err(e) => log::error!("WgpuDevice: dropping command buffer {new_id:?}: {e}"),
        }
        new_id
    }

    fn track_allocation(&self, bytes: u64) {
        self.internal
            .vram_allocated_bytes
            .fetch_add(bytes as usize, Ordering::Relaxed);
    }

    fn track_release(&self, bytes: u64) {
        self.internal
            .vram_allocated_bytes
            .fetch_sub(bytes as usize, Ordering::Relaxed);
    }

    fn insert_buffer(&self, buffer: wgpu::Buffer, size: u64) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        self.track_allocation(size);
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(buffer),
                size,
            },
        );
        Ok(id)
    }

    fn insert_bind_group_layout(
        &self,
        layout: wgpu::BindGroupLayout,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let id = BindGroupLayoutId(
            self.internal
                .next_bind_group_layout_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.bind_group_layouts, "bind_group_layouts")?.insert(id, Arc::new(layout));
        Ok(id)
    }
}

impl GraphicsDevice for WgpuDevice {
    // --- Shader Module Operations ---

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let label = descriptor.label;
        let wgpu_module = self.with_wgpu_device(|device| {
            log::debug!("WgpuDevice: Creating wgpu::ShaderModule with label: {label:?}");
            Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label,
                source: wgpu::ShaderSource::Wgsl(descriptor.wgsl.clone()),
            }))
        })?;

        let id = ShaderModuleId(self.internal.next_shader_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.shader_modules, "shader_modules")?.insert(id, Arc::new(wgpu_module));

        log::info!(
            "WgpuDevice: Created shader module '{}' with ID: {:?}",
            label.unwrap_or_default(),
            id
        );
        Ok(id)
    }

    // --- Pipelines and bind groups ---

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let module = lock(&self.internal.shader_modules, "shader_modules")?
            .get(&descriptor.module)
            .cloned()
            .ok_or(ShaderError::NotFound {
                id: descriptor.module,
            })?;

        let wgpu_pipeline = self.with_wgpu_device(|device| {
            Ok(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: descriptor.label,
                layout: None,
                module: &module,
                entry_point: Some(descriptor.entry_point),
                compilation_options: Default::default(),
                cache: None,
            }))
        })?;

        let id = ComputePipelineId(
            self.internal
                .next_compute_pipeline_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.compute_pipelines, "compute_pipelines")?.insert(
            id,
            WgpuComputePipelineEntry {
                wgpu_pipeline: Arc::new(wgpu_pipeline),
                label: descriptor.label.map(str::to_owned),
            },
        );

        log::info!(
            "WgpuDevice: Created compute pipeline '{}' ({}) with ID: {:?}",
            descriptor.label.unwrap_or_default(),
            descriptor.entry_point,
            id
        );
        Ok(id)
    }

    fn compute_pipeline_bind_group_layout(
        &self,
        pipeline: ComputePipelineId,
        group: u32,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let (wgpu_pipeline, label) = {
            let pipelines = lock(&self.internal.compute_pipelines, "compute_pipelines")?;
            let entry = pipelines
                .get(&pipeline)
                .ok_or(PipelineError::InvalidComputePipeline { id: pipeline })?;
            (Arc::clone(&entry.wgpu_pipeline), entry.label.clone())
        };
        log::debug!(
            "WgpuDevice: Fetching bind group layout {group} of pipeline '{}'",
            label.unwrap_or_default()
        );
        self.insert_bind_group_layout(wgpu_pipeline.get_bind_group_layout(group))
    }

    fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into_wgpu(),
                ty: wgpu::BindingType::Buffer {
                    ty: entry.ty.into_wgpu(),
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let layout = self.with_wgpu_device(|device| {
            Ok(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: descriptor.label,
                entries: &entries,
            }))
        })?;
        self.insert_bind_group_layout(layout)
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let layout = self
            .get_wgpu_bind_group_layout(descriptor.layout)
            .ok_or(ResourceError::NotFound)?;

        // Keep the buffers alive while the wgpu entries borrow them.
        let buffers = descriptor
            .entries
            .iter()
            .map(|entry| self.get_wgpu_buffer(entry.buffer).ok_or(ResourceError::NotFound))
            .collect::<Result<Vec<_>, _>>()?;

        let entries: Vec<wgpu::BindGroupEntry> = descriptor
            .entries
            .iter()
            .zip(&buffers)
            .map(|(entry, buffer)| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: entry.offset,
                    size: entry.size.and_then(wgpu::BufferSize::new),
                }),
            })
            .collect();

        let bind_group = self.with_wgpu_device(|device| {
            Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: descriptor.label,
                layout: &layout,
                entries: &entries,
            }))
        })?;

        let id = BindGroupId(self.internal.next_bind_group_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.bind_groups, "bind_groups")?.insert(id, Arc::new(bind_group));
        log::debug!(
            "WgpuDevice: Created bind group '{}' with ID: {:?}",
            descriptor.label.unwrap_or_default(),
            id
        );
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        if lock(&self.internal.bind_groups, "bind_groups")?
            .remove(&id)
            .is_some()
        {
            log::debug!("WgpuDevice: Destroyed bind group with ID: {id:?}");
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    // --- Buffer Operations ---

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let wgpu_buffer = self.with_wgpu_device(|device| {
            Ok(device.create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size: descriptor.size,
                usage: descriptor.usage.into_wgpu(),
                mapped_at_creation: descriptor.mapped_at_creation,
            }))
        })?;
        let id = self.insert_buffer(wgpu_buffer, descriptor.size)?;

        log::info!(
            "WgpuDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let wgpu_buffer = self.with_wgpu_device(|device| {
            Ok(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: descriptor.label.as_deref(),
                contents: data,
                usage: descriptor.usage.into_wgpu(),
            }))
        })?;
        let buffer_size = data.len() as u64;
        let id = self.insert_buffer(wgpu_buffer, buffer_size)?;

        log::info!(
            "WgpuDevice: Created buffer '{}' with initial data. ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            buffer_size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.track_release(entry.size);
        log::debug!("WgpuDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?;

        if offset + data.len() as u64 > buffer.size() {
            return Err(ResourceError::OutOfBounds);
        }

        let context = lock(&self.internal.context, "context")?;
        context.queue.write_buffer(&buffer, offset, data);

        log::trace!(
            "WgpuDevice: Wrote {} bytes to buffer ID: {:?} at offset {}",
            data.len(),
            id,
            offset
        );
        Ok(())
    }

    // --- Texture Operations ---

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let format = descriptor.format.into_wgpu();
        let wgpu_texture = self.with_wgpu_device(|device| {
            Ok(device.create_texture(&wgpu::TextureDescriptor {
                label: descriptor.label.as_deref(),
                size: descriptor.size.into_wgpu(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: descriptor.usage.into_wgpu(),
                view_formats: &[],
            }))
        })?;

        // Simplified: ignores padding and alignment.
        let size_in_bytes = descriptor.size.width as u64
            * descriptor.size.height as u64
            * format.block_copy_size(None).unwrap_or(4) as u64;
        self.track_allocation(size_in_bytes);

        let id = TextureId(self.internal.next_texture_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.textures, "textures")?.insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(wgpu_texture),
                size: size_in_bytes,
            },
        );

        log::info!(
            "WgpuDevice: Created texture '{}' with ID: {:?}, {}x{} {:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.textures, "textures")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.track_release(entry.size);
        entry.wgpu_texture.destroy();
        log::debug!("WgpuDevice: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn create_texture_view(&self, texture: TextureId) -> Result<TextureViewId, ResourceError> {
        let wgpu_texture = self.get_wgpu_texture(texture).ok_or(ResourceError::NotFound)?;
        let wgpu_view = wgpu_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureViewId(
            self.internal
                .next_texture_view_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.texture_views, "texture_views")?.insert(id, Arc::new(wgpu_view));
        log::debug!("WgpuDevice: Created texture view {id:?} for texture ID: {texture:?}");
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        if lock(&self.internal.texture_views, "texture_views")?
            .remove(&id)
            .is_some()
        {
            log::debug!("WgpuDevice: Destroyed texture view with ID: {id:?}");
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    // --- Commands and submission ---

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = match self.internal.context.lock() {
            Ok(context_guard) => Some(
                context_guard
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor { label }),
            ),
            Err(e) => {
                log::error!("WgpuDevice: cannot create command encoder: {e}");
                None
            }
        };

        Box::new(WgpuCommandEncoder {
            encoder,              // `take`n in finish()
            device: self.clone(), // Clone the Arc handle
        })
    }

    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionId, RenderError> {
        let buffer = lock(&self.internal.pending_command_buffers, "pending_command_buffers")?
            .remove(&command_buffer)
            .ok_or_else(|| {
                log::error!(
                    "Attempted to submit a CommandBufferId ({command_buffer:?}) that does not exist."
                );
                RenderError::ResourceError(ResourceError::InvalidHandle)
            })?;

        let context_guard = lock(&self.internal.context, "context")?;
        context_guard.queue.submit(std::iter::once(buffer));
        let id = SubmissionId(self.internal.next_submission.fetch_add(1, Ordering::AcqRel));
        log::trace!("WgpuDevice: Submitted {command_buffer:?} as {id:?}");
        Ok(id)
    }

    fn wait_for_submission(&self, submission: SubmissionId) -> Result<(), RenderError> {
        if submission.0 >= self.internal.next_submission.load(Ordering::Acquire) {
            return Err(ResourceError::InvalidHandle.into());
        }
        if submission.0 < self.internal.completed_below.load(Ordering::Acquire) {
            return Ok(());
        }
        self.wait_all()
    }

    fn supports_feature(&self, feature: DeviceFeature) -> bool {
        let Ok(context_guard) = self.internal.context.lock() else {
            log::error!("WgpuDevice: Mutex poisoned (context) on supports_feature");
            return false;
        };
        match feature {
            DeviceFeature::MultiDrawIndirectCount => context_guard
                .active_device_features
                .contains(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT),
            DeviceFeature::IndirectFirstInstance => context_guard
                .active_device_features
                .contains(wgpu::Features::INDIRECT_FIRST_INSTANCE),
            DeviceFeature::Compute => context_guard.supports_compute,
        }
    }
}
