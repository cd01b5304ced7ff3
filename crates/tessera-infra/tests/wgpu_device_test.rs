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

//! These tests need a real adapter. Machines without one skip them.

use std::sync::{Arc, Mutex};

use tessera_core::math::{Aabb, Mat4, Vec3};
use tessera_core::renderer::{
    BatchRecord, BufferDescriptor, BufferId, BufferUsage, Color, DeviceFeature,
    DrawIndexedIndirectArgs, Extent2D, GraphicsDevice, LoadOp, Operations, RenderPass,
    RenderPassColorAttachment, RenderPassDescriptor, ResourceError, StoreOp, SurfacePresenter,
    TextureFormat, TextureViewId,
};
use tessera_core::scene::{CameraUniformData, MaterialId, MeshId, Renderable, SceneSource};
use tessera_core::DrawCoreConfig;
use tessera_infra::{OffscreenPresenter, WgpuDevice, WgpuGraphicsContext};
use tessera_lanes::batch_lane::BatchInfo;
use tessera_lanes::compute_lane::kernels;
use tessera_lanes::pass_lane::{
    AttachmentDescriptor, PassDescriptor, SubpassContext, SubpassDescriptor,
};
use tessera_lanes::{ChainStrategy, DrawSubmitter, MaterialBinder};

const EXTENT: Extent2D = Extent2D::new(64, 64);

fn device() -> Option<WgpuDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    match WgpuGraphicsContext::new_headless() {
        Ok(context) => Some(WgpuDevice::new(Arc::new(Mutex::new(context)))),
        Err(e) => {
            eprintln!("skipping: no adapter ({e})");
            None
        }
    }
}

fn read_back(device: &WgpuDevice, source: BufferId, size: u64) -> Vec<u8> {
    let staging = device
        .create_buffer(&BufferDescriptor {
            label: Some("readback".into()),
            size,
            usage: BufferUsage::MAP_READ | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })
        .unwrap();
    let mut encoder = device.create_command_encoder(Some("readback"));
    encoder.copy_buffer_to_buffer(&source, 0, &staging, 0, size);
    let submission = device.submit_command_buffer(encoder.finish()).unwrap();
    device.wait_for_submission(submission).unwrap();

    let buffer = device.get_wgpu_buffer(staging).unwrap();
    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| result.unwrap());
    device.poll_device_blocking();
    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    device.destroy_buffer(staging).unwrap();
    bytes
}

struct Grid {
    objects: Vec<Renderable>,
}

impl Grid {
    fn new(count: u32) -> Self {
        let objects = (0..count)
            .map(|i| {
                Renderable::new(
                    MeshId(u64::from((i * 7) % 5)),
                    MaterialId(u64::from(i % 3)),
                    Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
                )
            })
            .collect();
        Self { objects }
    }
}

impl SceneSource for Grid {
    fn active_renderables(&self) -> Vec<Renderable> {
        self.objects.clone()
    }

    fn mesh_index_count(&self, mesh: MeshId) -> Option<u32> {
        Some(36 + 6 * mesh.0 as u32)
    }

    fn mesh_collision_bounds(&self, _mesh: MeshId) -> Option<Aabb> {
        Some(Aabb::from_min_max(
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, 0.5),
        ))
    }
}

/// Skips every batch, so the frame runs the compute chain and clears only.
struct SkipAll;

impl MaterialBinder for SkipAll {
    fn bind_subpass(
        &self,
        _pass: &mut dyn RenderPass<'_>,
        _context: &SubpassContext<'_>,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn bind_batch(
        &self,
        _pass: &mut dyn RenderPass<'_>,
        _context: &SubpassContext<'_>,
        _batch: &BatchInfo,
    ) -> Result<bool, ResourceError> {
        Ok(false)
    }
}

#[test]
fn test_write_buffer_bounds() {
    let Some(device) = device() else { return };
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: Some("bounds".into()),
            size: 16,
            usage: BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
            mapped_at_creation: false,
        })
        .unwrap();

    device.write_buffer(buffer, 8, &[1u8; 8]).unwrap();
    assert!(matches!(
        device.write_buffer(buffer, 12, &[1u8; 8]),
        Err(ResourceError::OutOfBounds)
    ));
    assert_eq!(read_back(&device, buffer, 16), [&[0u8; 8][..], &[1u8; 8][..]].concat());

    device.destroy_buffer(buffer).unwrap();
    assert!(matches!(
        device.destroy_buffer(buffer),
        Err(ResourceError::NotFound)
    ));
    assert_eq!(device.vram_allocated_bytes(), 0);
}

#[test]
fn test_submissions_are_fences() {
    let Some(device) = device() else { return };
    let first = device
        .submit_command_buffer(device.create_command_encoder(None).finish())
        .unwrap();
    let second = device
        .submit_command_buffer(device.create_command_encoder(None).finish())
        .unwrap();
    assert!(second > first);

    device.wait_for_submission(second).unwrap();
    // Already complete: returns without polling.
    device.wait_for_submission(first).unwrap();

    let unknown = tessera_core::renderer::SubmissionId(second.0 + 10);
    assert!(device.wait_for_submission(unknown).is_err());
}

#[test]
fn test_missing_attachment_view_fails_the_render_pass() {
    let Some(device) = device() else { return };
    let mut presenter =
        OffscreenPresenter::new(&device, EXTENT, TextureFormat::Bgra8UnormSrgb).unwrap();
    let target = presenter.acquire().unwrap();
    let missing = TextureViewId(usize::MAX);
    let ops = Operations {
        load: LoadOp::Clear(Color::BLACK),
        store: StoreOp::Store,
    };

    let mut encoder = device.create_command_encoder(Some("attachments"));
    let colors = [
        RenderPassColorAttachment { view: &target, ops },
        RenderPassColorAttachment { view: &missing, ops },
    ];
    let result = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some("missing view"),
        color_attachments: &colors,
        depth_stencil_attachment: None,
    });
    assert!(matches!(result.err(), Some(ResourceError::NotFound)));

    let colors = [RenderPassColorAttachment { view: &target, ops }];
    let pass = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some("known view"),
        color_attachments: &colors,
        depth_stencil_attachment: None,
    });
    assert!(pass.is_ok());
    drop(pass);
    device.submit_command_buffer(encoder.finish()).unwrap();

    // A released target can no longer be presented.
    presenter.release();
    assert!(presenter.present().is_err());
    presenter.destroy(&device);
}

#[test]
fn test_gpu_chain_matches_host_chain() {
    let Some(device) = device() else { return };
    if !device.supports_feature(DeviceFeature::Compute)
        || !device.supports_feature(DeviceFeature::IndirectFirstInstance)
    {
        eprintln!("skipping: adapter lacks compute or indirect first instance");
        return;
    }

    let config = DrawCoreConfig {
        max_objects: 1024,
        ..Default::default()
    };
    let mut submitter = DrawSubmitter::new(&device, config, EXTENT).unwrap();
    assert_eq!(submitter.lane().strategy(), ChainStrategy::Gpu);
    submitter
        .set_attachments(
            &device,
            vec![
                AttachmentDescriptor::swapchain(
                    0,
                    "swapchain",
                    TextureFormat::Bgra8UnormSrgb,
                    Color::BLACK,
                ),
                AttachmentDescriptor::depth(1, "depth", TextureFormat::Depth32Float, 1.0),
            ],
        )
        .unwrap();
    submitter
        .set_structure(
            &device,
            vec![PassDescriptor::new(0, vec![SubpassDescriptor::writing(0, &[0, 1])])],
        )
        .unwrap();
    let mut presenter =
        OffscreenPresenter::new(&device, EXTENT, TextureFormat::Bgra8UnormSrgb).unwrap();

    let scene = Grid::new(300);
    let report = submitter
        .render_frame_with(
            &device,
            &mut presenter,
            &scene,
            &CameraUniformData::default(),
            &SkipAll,
        )
        .unwrap();
    assert_eq!(report.objects, 300);
    assert_eq!(report.batches, 15);
    assert_eq!(presenter.presented_frames(), 1);
    device.wait_for_submission(report.submission).unwrap();

    let table = submitter.table();
    let geometry = table.geometry_table(submitter.config().geometry);
    let expected = kernels::run_chain(table.records(), &geometry, table.batch_count()).unwrap();

    let draws = submitter.lane().draws(report.frame_slot, table).unwrap();
    let commands = read_back(
        &device,
        draws.commands,
        u64::from(table.batch_count()) * DrawIndexedIndirectArgs::SIZE,
    );
    let commands: Vec<DrawIndexedIndirectArgs> = commands
        .chunks_exact(DrawIndexedIndirectArgs::SIZE as usize)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    assert_eq!(commands, expected.commands);

    let counter = read_back(&device, draws.counter, 4);
    assert_eq!(bytemuck::pod_read_unaligned::<u32>(&counter), 15);

    // The records buffer holds one entry per object.
    assert_eq!(table.records().len(), 300);
    assert!(table.records().iter().all(|r: &BatchRecord| r.count == 1));

    submitter.destroy(&device);
    presenter.destroy(&device);
}
