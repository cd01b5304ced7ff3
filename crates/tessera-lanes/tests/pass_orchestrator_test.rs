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

mod common;

use common::{count, mesh_geometry, object, Command, CountingBinder, MockGraphicsDevice, RecordingEncoder};
use tessera_core::renderer::{
    BindGroupId, BufferId, Color, DrawIndexedIndirectArgs, Extent2D, LoadOp, TextureFormat,
    TextureViewId,
};
use tessera_core::scene::MaterialId;
use tessera_core::GeometryBinding;
use tessera_lanes::batch_lane::BatchTable;
use tessera_lanes::compute_lane::{DrawCount, FrameDraws};
use tessera_lanes::error::{DrawCoreError, PassStateError, StructureError};
use tessera_lanes::pass_lane::{
    AttachmentDescriptor, FrameInputs, PassDescriptor, PassOrchestrator, PassState,
    SubpassDescriptor,
};

const DEPTH: u32 = 0;
const GBUFFER: u32 = 1;
const SWAPCHAIN: u32 = 2;
const TARGET: TextureViewId = TextureViewId(9_999);
const CAMERA: BindGroupId = BindGroupId(7_777);
const COMMANDS: BufferId = BufferId(5_000);
const COUNTER: BufferId = BufferId(5_001);

fn attachments() -> Vec<AttachmentDescriptor> {
    vec![
        AttachmentDescriptor::depth(DEPTH, "depth", TextureFormat::Depth32Float, 1.0),
        AttachmentDescriptor::color(GBUFFER, "gbuffer", TextureFormat::Rgba16Float, Color::BLACK),
        AttachmentDescriptor::swapchain(
            SWAPCHAIN,
            "swapchain",
            TextureFormat::Bgra8UnormSrgb,
            Color::BLACK,
        ),
    ]
}

/// Pass 0 fills the G-buffer then resolves it to the swapchain; pass 1 draws
/// an overlay.
fn structure() -> Vec<PassDescriptor> {
    vec![
        PassDescriptor::new(
            0,
            vec![
                SubpassDescriptor::writing(0, &[DEPTH, GBUFFER]),
                SubpassDescriptor::writing(1, &[DEPTH, SWAPCHAIN]).reading(&[GBUFFER]),
            ],
        ),
        PassDescriptor::new(1, vec![SubpassDescriptor::writing(0, &[SWAPCHAIN])]),
    ]
}

fn built(device: &MockGraphicsDevice) -> PassOrchestrator {
    let mut orchestrator = PassOrchestrator::new(Extent2D::new(800, 600));
    orchestrator.set_attachments(device, attachments()).unwrap();
    orchestrator.set_structure(device, structure()).unwrap();
    orchestrator
}

fn three_batch_table() -> BatchTable {
    let mut table = BatchTable::new();
    let objects = [object(1, 1), object(2, 1), object(1, 1), object(1, 2)];
    table.rebuild_from(&objects, mesh_geometry, 64).unwrap();
    table
}

fn inputs(table: &BatchTable, count: DrawCount, geometry: GeometryBinding) -> FrameInputs<'_> {
    FrameInputs {
        target: TARGET,
        camera: CAMERA,
        draws: FrameDraws {
            commands: COMMANDS,
            counter: COUNTER,
            instances: BufferId(5_002),
            batches: table.batches(),
            count,
            geometry,
        },
    }
}

fn render_passes(log: &[Command]) -> Vec<&Command> {
    log.iter()
        .filter(|c| matches!(c, Command::BeginRender { .. }))
        .collect()
}

#[test]
fn test_structure_requires_attachments() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = PassOrchestrator::new(Extent2D::new(8, 8));
    let err = orchestrator.set_structure(&device, structure()).unwrap_err();
    assert!(matches!(
        err,
        DrawCoreError::Structure(StructureError::MissingAttachments)
    ));
    assert!(!orchestrator.is_built());
}

#[test]
fn test_invalid_structure_is_rejected_without_building() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = PassOrchestrator::new(Extent2D::new(8, 8));
    orchestrator.set_attachments(&device, attachments()).unwrap();
    let bad = vec![PassDescriptor::new(
        0,
        vec![SubpassDescriptor::writing(0, &[GBUFFER]).reading(&[SWAPCHAIN])],
    )];
    let err = orchestrator.set_structure(&device, bad).unwrap_err();
    assert!(matches!(
        err,
        DrawCoreError::Structure(StructureError::SwapchainRead { pass: 0, subpass: 0 })
    ));
    assert!(!orchestrator.is_built());
    assert!(device.live_textures().is_empty());
}

#[test]
fn test_full_legal_sequence_issues_every_draw() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = three_batch_table();
    let binder = CountingBinder::default();
    let mut encoder = RecordingEncoder::default();

    let stats = {
        let mut frame = orchestrator
            .begin_frame(
                &mut encoder,
                inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
            )
            .unwrap();
        frame.begin_pass(0).unwrap();
        for subpass in 0..2 {
            let mut recorder = frame.begin_subpass(subpass).unwrap();
            assert_eq!(recorder.context().subpass, subpass);
            assert_eq!(recorder.draw_batches(&binder).unwrap(), 3);
            drop(recorder);
            frame.end_subpass().unwrap();
        }
        frame.end_pass().unwrap();
        frame.begin_pass(1).unwrap();
        frame.record_subpass(0, &binder).unwrap();
        frame.end_pass().unwrap();
        frame.finish().unwrap()
    };

    assert_eq!(stats.passes, 2);
    assert_eq!(stats.subpasses, 3);
    assert_eq!(stats.draw_calls, 9);
    assert_eq!(orchestrator.state(), PassState::Idle);
    assert_eq!(binder.subpass_binds.get(), 3);

    let offsets: Vec<u64> = encoder
        .log
        .iter()
        .filter_map(|c| match c {
            Command::DrawIndirect { buffer, offset } if *buffer == COMMANDS => Some(*offset),
            _ => None,
        })
        .collect();
    let stride = DrawIndexedIndirectArgs::SIZE;
    assert_eq!(offsets, [0, stride, 2 * stride].repeat(3));
}

#[test]
fn test_camera_is_bound_first_in_every_subpass() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = three_batch_table();
    let mut encoder = RecordingEncoder::default();
    {
        let mut frame = orchestrator
            .begin_frame(
                &mut encoder,
                inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
            )
            .unwrap();
        frame.record_all(&CountingBinder::default()).unwrap();
        frame.finish().unwrap();
    }

    for (i, command) in encoder.log.iter().enumerate() {
        if matches!(command, Command::BeginRender { .. }) {
            assert_eq!(
                encoder.log[i + 1],
                Command::SetBindGroup {
                    index: 0,
                    group: CAMERA
                }
            );
        }
    }
}

#[test]
fn test_first_write_in_a_pass_clears_and_later_writes_load() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = BatchTable::new();
    let mut encoder = RecordingEncoder::default();
    {
        let mut frame = orchestrator
            .begin_frame(
                &mut encoder,
                inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
            )
            .unwrap();
        frame.record_all(&CountingBinder::default()).unwrap();
        frame.finish().unwrap();
    }

    let depth_view = orchestrator.attachment_view(DEPTH).unwrap();
    let gbuffer_view = orchestrator.attachment_view(GBUFFER).unwrap();
    let passes = render_passes(&encoder.log);
    assert_eq!(passes.len(), 3);

    assert_eq!(
        passes[0],
        &Command::BeginRender {
            label: Some("pass 0 subpass 0".into()),
            colors: vec![(gbuffer_view, LoadOp::Clear(Color::BLACK))],
            depth: Some((depth_view, LoadOp::Clear(1.0))),
        }
    );
    assert_eq!(
        passes[1],
        &Command::BeginRender {
            label: Some("pass 0 subpass 1".into()),
            colors: vec![(TARGET, LoadOp::Clear(Color::BLACK))],
            depth: Some((depth_view, LoadOp::Load)),
        }
    );
    assert_eq!(
        passes[2],
        &Command::BeginRender {
            label: Some("pass 1 subpass 0".into()),
            colors: vec![(TARGET, LoadOp::Clear(Color::BLACK))],
            depth: None,
        }
    );
}

#[test]
fn test_subpass_inputs_expose_sampled_views() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let gbuffer_view = orchestrator.attachment_view(GBUFFER).unwrap();
    let table = BatchTable::new();
    let mut encoder = RecordingEncoder::default();
    let mut frame = orchestrator
        .begin_frame(
            &mut encoder,
            inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
        )
        .unwrap();
    frame.begin_pass(0).unwrap();
    frame.record_subpass(0, &CountingBinder::default()).unwrap();
    let recorder = frame.begin_subpass(1).unwrap();
    assert_eq!(recorder.context().inputs, &[gbuffer_view]);
}

#[test]
fn test_shared_geometry_issues_one_multi_draw() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = three_batch_table();

    let mut gpu = RecordingEncoder::default();
    {
        let mut frame = orchestrator
            .begin_frame(&mut gpu, inputs(&table, DrawCount::Gpu, GeometryBinding::Shared))
            .unwrap();
        frame.record_all(&CountingBinder::default()).unwrap();
        assert_eq!(frame.finish().unwrap().draw_calls, 3);
    }
    assert_eq!(
        count(&gpu.log, |c| *c
            == Command::MultiDrawCount {
                buffer: COMMANDS,
                counter: COUNTER,
                max: 3
            }),
        3
    );

    let mut host = RecordingEncoder::default();
    {
        let mut frame = orchestrator
            .begin_frame(
                &mut host,
                inputs(&table, DrawCount::Host(3), GeometryBinding::Shared),
            )
            .unwrap();
        frame.record_all(&CountingBinder::default()).unwrap();
        frame.finish().unwrap();
    }
    assert_eq!(
        count(&host.log, |c| *c
            == Command::MultiDraw {
                buffer: COMMANDS,
                count: 3
            }),
        3
    );
}

#[test]
fn test_binder_may_skip_batches() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = three_batch_table();
    let binder = CountingBinder {
        skip_material: Some(MaterialId(2)),
        ..Default::default()
    };
    let mut encoder = RecordingEncoder::default();
    let mut frame = orchestrator
        .begin_frame(
            &mut encoder,
            inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
        )
        .unwrap();
    frame.begin_pass(0).unwrap();
    assert_eq!(frame.record_subpass(0, &binder).unwrap(), 2);
}

#[test]
fn test_zero_batches_issue_zero_draws() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = BatchTable::new();

    for (draw_count, geometry) in [
        (DrawCount::Gpu, GeometryBinding::PerMesh),
        (DrawCount::Gpu, GeometryBinding::Shared),
        (DrawCount::Host(0), GeometryBinding::Shared),
    ] {
        let mut encoder = RecordingEncoder::default();
        let stats = {
            let mut frame = orchestrator
                .begin_frame(&mut encoder, inputs(&table, draw_count, geometry))
                .unwrap();
            frame.record_all(&CountingBinder::default()).unwrap();
            frame.finish().unwrap()
        };
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.subpasses, 3);
        assert_eq!(count(&encoder.log, Command::is_draw), 0);
    }
}

#[test]
fn test_illegal_transitions_are_rejected() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = BatchTable::new();
    let binder = CountingBinder::default();
    let mut encoder = RecordingEncoder::default();
    let mut frame = orchestrator
        .begin_frame(
            &mut encoder,
            inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
        )
        .unwrap();

    assert!(matches!(
        frame.begin_subpass(0).err(),
        Some(DrawCoreError::State(PassStateError::NoActivePass))
    ));
    assert!(matches!(
        frame.begin_pass(1),
        Err(DrawCoreError::State(PassStateError::PassOutOfSequence {
            expected: 0,
            found: 1
        }))
    ));
    frame.begin_pass(0).unwrap();
    assert!(matches!(
        frame.begin_subpass(1).err(),
        Some(DrawCoreError::State(PassStateError::SubpassOutOfSequence { .. }))
    ));
    assert!(matches!(
        frame.begin_subpass(2).err(),
        Some(DrawCoreError::State(PassStateError::SubpassOutOfRange {
            pass: 0,
            index: 2,
            declared: 2
        }))
    ));
    frame.record_subpass(0, &binder).unwrap();
    assert!(matches!(
        frame.end_pass(),
        Err(DrawCoreError::State(PassStateError::IncompletePass {
            pass: 0,
            recorded: 1,
            declared: 2
        }))
    ));
    frame.record_subpass(1, &binder).unwrap();
    frame.end_pass().unwrap();
    assert!(matches!(
        frame.finish(),
        Err(DrawCoreError::State(PassStateError::IncompleteFrame {
            recorded: 1,
            declared: 2
        }))
    ));
    assert_eq!(orchestrator.state(), PassState::Idle);
}

#[test]
fn test_abandoned_frame_resets_state() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let table = BatchTable::new();
    let mut encoder = RecordingEncoder::default();
    {
        let mut frame = orchestrator
            .begin_frame(
                &mut encoder,
                inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
            )
            .unwrap();
        frame.begin_pass(0).unwrap();
        let _open = frame.begin_subpass(0).unwrap();
    }
    assert_eq!(orchestrator.state(), PassState::Idle);
    orchestrator
        .on_resize(&device, Extent2D::new(640, 480))
        .unwrap();
    assert!(orchestrator.is_built());
}

#[test]
fn test_resize_rebuilds_attachments() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    let before = orchestrator.attachment_view(DEPTH).unwrap();
    assert_eq!(device.live_textures().len(), 2);

    orchestrator
        .on_resize(&device, Extent2D::new(1920, 1080))
        .unwrap();
    let textures = device.live_textures();
    assert_eq!(textures.len(), 2);
    assert!(textures.iter().all(|t| t.size == Extent2D::new(1920, 1080)));
    assert_eq!(device.live_views(), 2);
    assert_ne!(orchestrator.attachment_view(DEPTH).unwrap(), before);
    assert_eq!(orchestrator.graph().unwrap().subpass_counts(), vec![2, 1]);
}

#[test]
fn test_zero_extent_tears_the_graph_down() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);

    orchestrator.on_resize(&device, Extent2D::new(0, 600)).unwrap();
    assert!(!orchestrator.is_built());
    assert!(device.live_textures().is_empty());
    assert_eq!(device.live_views(), 0);

    let table = BatchTable::new();
    let mut encoder = RecordingEncoder::default();
    let err = orchestrator
        .begin_frame(
            &mut encoder,
            inputs(&table, DrawCount::Gpu, GeometryBinding::PerMesh),
        )
        .err();
    assert!(matches!(
        err,
        Some(DrawCoreError::State(PassStateError::NotBuilt))
    ));

    orchestrator.on_resize(&device, Extent2D::new(800, 600)).unwrap();
    assert!(orchestrator.is_built());
    assert_eq!(device.live_textures().len(), 2);
}

#[test]
fn test_destroy_releases_every_texture() {
    let device = MockGraphicsDevice::default();
    let mut orchestrator = built(&device);
    orchestrator.destroy(&device);
    assert!(device.live_textures().is_empty());
    assert_eq!(device.live_views(), 0);
    assert!(!orchestrator.is_built());
}
