//! The scene, meshes and material binder the sandbox renders.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tessera_core::math::{Aabb, Mat4, Vec3};
use tessera_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindGroupLayoutId, BufferBindingType, BufferDescriptor, BufferId,
    BufferUsage, GraphicsDevice, IndexFormat, RenderPass, RenderPipelineId, ResourceError,
    ShaderStages,
};
use tessera_core::scene::{MaterialId, MeshId, Renderable, SceneSource};
use tessera_infra::WgpuDevice;
use tessera_lanes::batch_lane::BatchInfo;
use tessera_lanes::pass_lane::{MaterialBinder, SubpassContext};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A mesh uploaded into its own index and vertex buffers.
#[derive(Debug)]
struct GpuMesh {
    vertices: BufferId,
    indices: BufferId,
    index_count: u32,
    bounds: Aabb,
}

/// A few unit-sized meshes.
#[derive(Debug)]
pub struct DemoMeshes {
    meshes: HashMap<MeshId, GpuMesh>,
}

impl DemoMeshes {
    pub fn upload(device: &dyn GraphicsDevice) -> Result<Self> {
        let cube_positions: Vec<[f32; 3]> = (0..8)
            .map(|i| {
                [
                    if i & 1 == 0 { -0.5 } else { 0.5 },
                    if i & 2 == 0 { -0.5 } else { 0.5 },
                    if i & 4 == 0 { -0.5 } else { 0.5 },
                ]
            })
            .collect();
        let cube_indices: [u32; 36] = [
            0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6, 0, 1, 4, 1, 5, 4, 2, 6, 3, 3, 6, 7, 0, 4, 2, 2,
            4, 6, 1, 3, 5, 3, 7, 5,
        ];
        let quad_positions = [
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ];
        let quad_indices: [u32; 6] = [0, 1, 2, 0, 2, 3];
        let tri_positions = [[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]];
        let tri_indices: [u32; 3] = [0, 1, 2];

        let mut meshes = HashMap::new();
        meshes.insert(MeshId(0), Self::mesh(device, "cube", &cube_positions, &cube_indices)?);
        meshes.insert(MeshId(1), Self::mesh(device, "quad", &quad_positions, &quad_indices)?);
        meshes.insert(MeshId(2), Self::mesh(device, "triangle", &tri_positions, &tri_indices)?);
        Ok(Self { meshes })
    }

    fn mesh(
        device: &dyn GraphicsDevice,
        name: &str,
        positions: &[[f32; 3]],
        indices: &[u32],
    ) -> Result<GpuMesh> {
        let vertices = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(format!("{name} vertices").into()),
                size: std::mem::size_of_val(positions) as u64,
                usage: BufferUsage::VERTEX,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(positions),
        )?;
        let indices_buffer = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(format!("{name} indices").into()),
                size: std::mem::size_of_val(indices) as u64,
                usage: BufferUsage::INDEX,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(indices),
        )?;
        Ok(GpuMesh {
            vertices,
            indices: indices_buffer,
            index_count: indices.len() as u32,
            bounds: Aabb::from_min_max(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5)),
        })
    }

    pub fn count(&self) -> u64 {
        self.meshes.len() as u64
    }

    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for mesh in self.meshes.values() {
            for buffer in [mesh.vertices, mesh.indices] {
                if let Err(e) = device.destroy_buffer(buffer) {
                    log::warn!("Failed to destroy mesh buffer: {e}");
                }
            }
        }
    }
}

/// A grid of objects cycling through the meshes and `materials` materials.
pub struct DemoScene<'a> {
    meshes: &'a DemoMeshes,
    objects: Vec<Renderable>,
}

impl<'a> DemoScene<'a> {
    pub fn grid(meshes: &'a DemoMeshes, side: u32, materials: u64) -> Self {
        let objects = (0..side * side)
            .map(|i| {
                let (x, y) = ((i % side) as f32, (i / side) as f32);
                let offset = side as f32 / 2.0;
                let mut renderable = Renderable::new(
                    MeshId(u64::from(i) % meshes.count()),
                    MaterialId(u64::from(i / 3) % materials.max(1)),
                    Mat4::from_translation(Vec3::new(x - offset, y - offset, 0.0))
                        * Mat4::from_scale(Vec3::new(0.8, 0.8, 0.8)),
                );
                // A sprinkling of hidden objects exercises the skip path.
                renderable.active = i % 11 != 10;
                renderable
            })
            .collect();
        Self { meshes, objects }
    }
}

impl SceneSource for DemoScene<'_> {
    fn active_renderables(&self) -> Vec<Renderable> {
        self.objects.clone()
    }

    fn mesh_index_count(&self, mesh: MeshId) -> Option<u32> {
        self.meshes.meshes.get(&mesh).map(|m| m.index_count)
    }

    fn mesh_collision_bounds(&self, mesh: MeshId) -> Option<Aabb> {
        self.meshes.meshes.get(&mesh).map(|m| m.bounds)
    }
}

/// Binds one unlit pipeline for every material, plus the frame's instance buffer.
#[derive(Debug)]
pub struct DemoBinder<'a> {
    device: WgpuDevice,
    meshes: &'a DemoMeshes,
    pipeline: RenderPipelineId,
    instance_layout: BindGroupLayoutId,
    instance_groups: Mutex<HashMap<BufferId, BindGroupId>>,
}

impl<'a> DemoBinder<'a> {
    pub fn new(device: &WgpuDevice, meshes: &'a DemoMeshes, camera_layout: BindGroupLayoutId) -> Result<Self> {
        let instance_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("instance_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BufferBindingType::Storage { read_only: true },
            }],
        })?;

        let camera = device
            .get_wgpu_bind_group_layout(camera_layout)
            .ok_or_else(|| anyhow!("camera layout {camera_layout:?} not found"))?;
        let instances = device
            .get_wgpu_bind_group_layout(instance_layout)
            .ok_or_else(|| anyhow!("instance layout {instance_layout:?} not found"))?;

        let pipeline = device.with_wgpu_device(|raw| {
            let module = raw.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("sandbox_unlit"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
            });
            let layout = raw.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sandbox_unlit_Layout"),
                bind_group_layouts: &[Some(camera.as_ref()), Some(instances.as_ref())],
                immediate_size: 0,
            });
            Ok(raw.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("sandbox_unlit"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: Some(true),
                    depth_compare: Some(wgpu::CompareFunction::Less),
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            }))
        })?;
        let pipeline = device.register_render_pipeline(pipeline)?;

        Ok(Self {
            device: device.clone(),
            meshes,
            pipeline,
            instance_layout,
            instance_groups: Mutex::new(HashMap::new()),
        })
    }

    /// The bind group exposing `instances` at group 1, created on first use.
    fn instance_group(&self, instances: BufferId) -> Result<BindGroupId, ResourceError> {
        let mut groups = self
            .instance_groups
            .lock()
            .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned (instance_groups): {e}")))?;
        if let Some(group) = groups.get(&instances) {
            return Ok(*group);
        }
        let group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("instances"),
            layout: self.instance_layout,
            entries: &[BindGroupEntry::whole(0, instances)],
        })?;
        groups.insert(instances, group);
        Ok(group)
    }

    pub fn destroy(&self) {
        if let Ok(groups) = self.instance_groups.lock() {
            for group in groups.values() {
                if let Err(e) = self.device.destroy_bind_group(*group) {
                    log::warn!("Failed to destroy instance bind group: {e}");
                }
            }
        }
    }
}

impl MaterialBinder for DemoBinder<'_> {
    fn bind_subpass(
        &self,
        pass: &mut dyn RenderPass<'_>,
        context: &SubpassContext<'_>,
    ) -> Result<(), ResourceError> {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.instance_group(context.instances)?);
        Ok(())
    }

    fn bind_batch(
        &self,
        pass: &mut dyn RenderPass<'_>,
        _context: &SubpassContext<'_>,
        batch: &BatchInfo,
    ) -> Result<bool, ResourceError> {
        let Some(mesh) = self.meshes.meshes.get(&batch.key.mesh) else {
            return Ok(false);
        };
        pass.set_vertex_buffer(0, &mesh.vertices, 0);
        pass.set_index_buffer(&mesh.indices, 0, IndexFormat::Uint32);
        Ok(true)
    }
}
