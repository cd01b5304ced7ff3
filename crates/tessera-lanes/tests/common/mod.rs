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

//! Shared test doubles: a recording graphics device, presenter, scene and
//! material binder.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tessera_core::math::{Aabb, Mat4, Vec3};
use tessera_core::renderer::*;
use tessera_core::scene::{MaterialId, MeshGeometry, MeshId, Renderable, SceneSource};
use tessera_lanes::batch_lane::BatchInfo;
use tessera_lanes::pass_lane::{MaterialBinder, SubpassContext};

/// One command recorded by a [`RecordingEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ClearBuffer {
        buffer: BufferId,
        size: Option<u64>,
    },
    BeginCompute {
        label: Option<String>,
    },
    SetComputePipeline(ComputePipelineId),
    Dispatch(u32),
    BeginRender {
        label: Option<String>,
        colors: Vec<(TextureViewId, LoadOp<Color>)>,
        depth: Option<(TextureViewId, LoadOp<f32>)>,
    },
    SetPipeline(RenderPipelineId),
    SetBindGroup {
        index: u32,
        group: BindGroupId,
    },
    SetVertexBuffer(BufferId),
    SetIndexBuffer(BufferId),
    DrawIndirect {
        buffer: BufferId,
        offset: u64,
    },
    MultiDraw {
        buffer: BufferId,
        count: u32,
    },
    MultiDrawCount {
        buffer: BufferId,
        counter: BufferId,
        max: u32,
    },
}

impl Command {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::DrawIndirect { .. } | Command::MultiDraw { .. } | Command::MultiDrawCount { .. }
        )
    }
}

/// Counts the commands of `log` matching `pred`.
pub fn count(log: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    log.iter().filter(|c| pred(c)).count()
}

/// The workgroup counts of every dispatch, in order.
pub fn dispatches(log: &[Command]) -> Vec<u32> {
    log.iter()
        .filter_map(|c| match c {
            Command::Dispatch(x) => Some(*x),
            _ => None,
        })
        .collect()
}

/// The labels of every compute pass, in order.
pub fn compute_labels(log: &[Command]) -> Vec<String> {
    log.iter()
        .filter_map(|c| match c {
            Command::BeginCompute { label } => label.clone(),
            _ => None,
        })
        .collect()
}

struct MockRenderPass<'a> {
    log: &'a mut Vec<Command>,
}

impl<'a> RenderPass<'a> for MockRenderPass<'a> {
    fn set_pipeline(&mut self, pipeline: &RenderPipelineId) {
        self.log.push(Command::SetPipeline(*pipeline));
    }
    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId) {
        self.log.push(Command::SetBindGroup {
            index,
            group: *bind_group,
        });
    }
    fn set_vertex_buffer(&mut self, _slot: u32, buffer: &BufferId, _offset: u64) {
        self.log.push(Command::SetVertexBuffer(*buffer));
    }
    fn set_index_buffer(&mut self, buffer: &BufferId, _offset: u64, _format: IndexFormat) {
        self.log.push(Command::SetIndexBuffer(*buffer));
    }
    fn draw_indexed_indirect(&mut self, buffer: &BufferId, offset: u64) {
        self.log.push(Command::DrawIndirect {
            buffer: *buffer,
            offset,
        });
    }
    fn multi_draw_indexed_indirect(&mut self, buffer: &BufferId, _offset: u64, count: u32) {
        self.log.push(Command::MultiDraw {
            buffer: *buffer,
            count,
        });
    }
    fn multi_draw_indexed_indirect_count(
        &mut self,
        buffer: &BufferId,
        _offset: u64,
        count_buffer: &BufferId,
        _count_offset: u64,
        max_count: u32,
    ) {
        self.log.push(Command::MultiDrawCount {
            buffer: *buffer,
            counter: *count_buffer,
            max: max_count,
        });
    }
}

struct MockComputePass<'a> {
    log: &'a mut Vec<Command>,
}

impl<'a> ComputePass<'a> for MockComputePass<'a> {
    fn set_pipeline(&mut self, pipeline: &ComputePipelineId) {
        self.log.push(Command::SetComputePipeline(*pipeline));
    }
    fn set_bind_group(&mut self, index: u32, bind_group: &BindGroupId) {
        self.log.push(Command::SetBindGroup {
            index,
            group: *bind_group,
        });
    }
    fn dispatch_workgroups(&mut self, x: u32, _y: u32, _z: u32) {
        self.log.push(Command::Dispatch(x));
    }
}

type EncodedLogs = Arc<Mutex<HashMap<CommandBufferId, Vec<Command>>>>;

/// Records every command. Encoders created by a [`MockGraphicsDevice`] hand
/// their log back to it on `finish`.
#[derive(Default)]
pub struct RecordingEncoder {
    pub log: Vec<Command>,
    sink: Option<(EncodedLogs, CommandBufferId)>,
}

impl CommandEncoder for RecordingEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Result<Box<dyn RenderPass<'encoder> + 'encoder>, ResourceError> {
        self.log.push(Command::BeginRender {
            label: descriptor.label.map(str::to_owned),
            colors: descriptor
                .color_attachments
                .iter()
                .map(|c| (*c.view, c.ops.load))
                .collect(),
            depth: descriptor
                .depth_stencil_attachment
                .as_ref()
                .map(|d| (*d.view, d.depth_ops.load)),
        });
        Ok(Box::new(MockRenderPass { log: &mut self.log }))
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        self.log.push(Command::BeginCompute {
            label: descriptor.label.map(str::to_owned),
        });
        Box::new(MockComputePass { log: &mut self.log })
    }

    fn clear_buffer(&mut self, buffer: &BufferId, _offset: u64, size: Option<u64>) {
        self.log.push(Command::ClearBuffer {
            buffer: *buffer,
            size,
        });
    }

    fn copy_buffer_to_buffer(&mut self, _: &BufferId, _: u64, _: &BufferId, _: u64, _: u64) {}

    fn finish(self: Box<Self>) -> CommandBufferId {
        let this = *self;
        match this.sink {
            Some((sink, id)) => {
                sink.lock().unwrap().insert(id, this.log);
                id
            }
            None => CommandBufferId(0),
        }
    }
}

/// Which optional features a [`MockGraphicsDevice`] reports.
#[derive(Debug, Clone, Copy)]
pub struct MockFeatures {
    pub compute: bool,
    pub draw_count: bool,
    pub first_instance: bool,
}

impl MockFeatures {
    pub const ALL: Self = Self {
        compute: true,
        draw_count: true,
        first_instance: true,
    };

    pub const NO_COMPUTE: Self = Self {
        compute: false,
        draw_count: true,
        first_instance: true,
    };

    pub const NO_DRAW_COUNT: Self = Self {
        compute: true,
        draw_count: false,
        first_instance: true,
    };
}

/// A texture as the device saw it created.
#[derive(Debug, Clone, PartialEq)]
pub struct MockTexture {
    pub label: String,
    pub size: Extent2D,
    pub format: TextureFormat,
}

/// A graphics device that hands out unique ids and keeps everything it sees.
#[derive(Debug)]
pub struct MockGraphicsDevice {
    features: MockFeatures,
    next_id: AtomicUsize,
    buffers: Mutex<HashMap<BufferId, (String, Vec<u8>)>>,
    textures: Mutex<HashMap<TextureId, MockTexture>>,
    views: Mutex<HashSet<TextureViewId>>,
    bind_groups: Mutex<HashSet<BindGroupId>>,
    encoded: EncodedLogs,
    submitted: Mutex<Vec<(SubmissionId, Vec<Command>)>>,
    waited: Mutex<Vec<SubmissionId>>,
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new(MockFeatures::ALL)
    }
}

/// Routes the lanes' `log` output to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl MockGraphicsDevice {
    pub fn new(features: MockFeatures) -> Self {
        init_logging();
        Self {
            features,
            next_id: AtomicUsize::new(0),
            buffers: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
            views: Mutex::new(HashSet::new()),
            bind_groups: Mutex::new(HashSet::new()),
            encoded: Arc::new(Mutex::new(HashMap::new())),
            submitted: Mutex::new(Vec::new()),
            waited: Mutex::new(Vec::new()),
        }
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The contents written to `buffer` so far.
    pub fn buffer_data(&self, buffer: BufferId) -> Vec<u8> {
        self.buffers
            .lock()
            .unwrap()
            .get(&buffer)
            .map(|(_, data)| data.clone())
            .unwrap_or_default()
    }

    /// Reads the first `len` values of `buffer` back as `T`.
    pub fn read<T: bytemuck::Pod>(&self, buffer: BufferId, len: usize) -> Vec<T> {
        let data = self.buffer_data(buffer);
        data.chunks_exact(std::mem::size_of::<T>())
            .take(len)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// Finds a live buffer by its exact label.
    pub fn buffer_by_label(&self, label: &str) -> Option<BufferId> {
        self.buffers
            .lock()
            .unwrap()
            .iter()
            .find(|(_, (l, _))| l == label)
            .map(|(id, _)| *id)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    pub fn live_bind_groups(&self) -> usize {
        self.bind_groups.lock().unwrap().len()
    }

    pub fn live_textures(&self) -> Vec<MockTexture> {
        self.textures.lock().unwrap().values().cloned().collect()
    }

    pub fn live_views(&self) -> usize {
        self.views.lock().unwrap().len()
    }

    /// The command logs of every submission, in order.
    pub fn submissions(&self) -> Vec<(SubmissionId, Vec<Command>)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn last_submission(&self) -> Vec<Command> {
        self.submitted
            .lock()
            .unwrap()
            .last()
            .map(|(_, log)| log.clone())
            .unwrap_or_default()
    }

    /// Every submission waited on, in order.
    pub fn waited(&self) -> Vec<SubmissionId> {
        self.waited.lock().unwrap().clone()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_shader_module(
        &self,
        _descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        Ok(ShaderModuleId(self.next()))
    }

    fn create_compute_pipeline(
        &self,
        _descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        Ok(ComputePipelineId(self.next()))
    }

    fn compute_pipeline_bind_group_layout(
        &self,
        _pipeline: ComputePipelineId,
        _index: u32,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        Ok(BindGroupLayoutId(self.next()))
    }

    fn create_bind_group_layout(
        &self,
        _descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        Ok(BindGroupLayoutId(self.next()))
    }

    fn create_bind_group(
        &self,
        _descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let id = BindGroupId(self.next());
        self.bind_groups.lock().unwrap().insert(id);
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        if self.bind_groups.lock().unwrap().remove(&id) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.next());
        let label = descriptor
            .label
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_default();
        self.buffers.lock().unwrap().insert(id, (label, Vec::new()));
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let id = self.create_buffer(descriptor)?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.buffers
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock().unwrap();
        let (_, contents) = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start + data.len();
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = TextureId(self.next());
        self.textures.lock().unwrap().insert(
            id,
            MockTexture {
                label: descriptor
                    .label
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_default(),
                size: descriptor.size,
                format: descriptor.format,
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.textures
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_texture_view(&self, _texture: TextureId) -> Result<TextureViewId, ResourceError> {
        let id = TextureViewId(self.next());
        self.views.lock().unwrap().insert(id);
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        if self.views.lock().unwrap().remove(&id) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        let id = CommandBufferId(self.next() as u64);
        Box::new(RecordingEncoder {
            log: Vec::new(),
            sink: Some((Arc::clone(&self.encoded), id)),
        })
    }

    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionId, RenderError> {
        let log = self
            .encoded
            .lock()
            .unwrap()
            .remove(&command_buffer)
            .ok_or(RenderError::RenderingFailed("unknown command buffer".into()))?;
        let id = SubmissionId(self.next() as u64);
        self.submitted.lock().unwrap().push((id, log));
        Ok(id)
    }

    fn wait_for_submission(&self, submission: SubmissionId) -> Result<(), RenderError> {
        self.waited.lock().unwrap().push(submission);
        Ok(())
    }

    fn supports_feature(&self, feature: DeviceFeature) -> bool {
        match feature {
            DeviceFeature::Compute => self.features.compute,
            DeviceFeature::MultiDrawIndirectCount => self.features.draw_count,
            DeviceFeature::IndirectFirstInstance => self.features.first_instance,
        }
    }
}

/// A presenter with one fixed target view.
#[derive(Debug)]
pub struct MockPresenter {
    pub view: TextureViewId,
    pub extent: Extent2D,
    pub fail_present: bool,
    pub presented: u32,
    pub released: u32,
}

impl MockPresenter {
    pub fn new(extent: Extent2D) -> Self {
        Self {
            view: TextureViewId(9_999),
            extent,
            fail_present: false,
            presented: 0,
            released: 0,
        }
    }
}

impl SurfacePresenter for MockPresenter {
    fn acquire(&mut self) -> Result<TextureViewId, RenderError> {
        Ok(self.view)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if self.fail_present {
            return Err(RenderError::PresentationFailed("surface lost".into()));
        }
        self.presented += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.released += 1;
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::Bgra8UnormSrgb
    }
}

/// A scene holding a fixed list of renderables; meshes below 100 are known.
#[derive(Debug, Default)]
pub struct TestScene {
    pub renderables: Vec<Renderable>,
}

impl TestScene {
    pub fn new(renderables: Vec<Renderable>) -> Self {
        Self { renderables }
    }

    /// `count` objects cycling over `meshes` meshes and `materials` materials.
    pub fn grid(count: usize, meshes: u64, materials: u64) -> Self {
        let renderables = (0..count)
            .map(|i| {
                object_at(
                    (i as u64) % meshes,
                    (i as u64 / meshes) % materials,
                    Vec3::new(i as f32, 0.0, 0.0),
                )
            })
            .collect();
        Self { renderables }
    }
}

pub fn mesh_geometry(mesh: MeshId) -> Option<MeshGeometry> {
    (mesh.0 < 100).then(|| MeshGeometry {
        index_count: 36 + mesh.0 as u32 * 6,
        first_index: mesh.0 as u32 * 1_000,
        base_vertex: mesh.0 as i32 * 100,
    })
}

impl SceneSource for TestScene {
    fn active_renderables(&self) -> Vec<Renderable> {
        self.renderables.clone()
    }

    fn mesh_index_count(&self, mesh: MeshId) -> Option<u32> {
        mesh_geometry(mesh).map(|g| g.index_count)
    }

    fn mesh_collision_bounds(&self, _mesh: MeshId) -> Option<Aabb> {
        None
    }

    fn mesh_geometry(&self, mesh: MeshId) -> Option<MeshGeometry> {
        mesh_geometry(mesh)
    }
}

pub fn object(mesh: u64, material: u64) -> Renderable {
    Renderable::new(MeshId(mesh), MaterialId(material), Mat4::IDENTITY)
}

pub fn object_at(mesh: u64, material: u64, position: Vec3) -> Renderable {
    Renderable::new(
        MeshId(mesh),
        MaterialId(material),
        Mat4::from_translation(position),
    )
}

/// A binder that binds a pipeline per subpass and skips one material.
#[derive(Debug, Default)]
pub struct CountingBinder {
    pub skip_material: Option<MaterialId>,
    pub subpass_binds: Cell<u32>,
    pub batch_binds: Cell<u32>,
}

impl MaterialBinder for CountingBinder {
    fn bind_subpass(
        &self,
        pass: &mut dyn RenderPass<'_>,
        _context: &SubpassContext<'_>,
    ) -> Result<(), ResourceError> {
        pass.set_pipeline(&RenderPipelineId(1));
        self.subpass_binds.set(self.subpass_binds.get() + 1);
        Ok(())
    }

    fn bind_batch(
        &self,
        pass: &mut dyn RenderPass<'_>,
        _context: &SubpassContext<'_>,
        batch: &BatchInfo,
    ) -> Result<bool, ResourceError> {
        if Some(batch.key.material) == self.skip_material {
            return Ok(false);
        }
        pass.set_bind_group(1, &BindGroupId(batch.key.material.0 as usize));
        self.batch_binds.set(self.batch_binds.get() + 1);
        Ok(true)
    }
}

/// A deterministic xorshift generator.
pub struct XorShift(pub u64);

impl XorShift {
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 32) as u32
    }
}
