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

//! The per-frame driver tying the lanes together.
//!
//! ```text
//! acquire slot -> rebuild batch table -> upload camera + chain inputs
//!   -> encode compute chain -> acquire target -> record passes
//!   -> submit -> record fence -> present -> advance
//! ```

use crate::batch_lane::BatchTable;
use crate::compute_lane::IndirectDrawLane;
use crate::error::DrawCoreError;
use crate::frame_lane::FramePacer;
use crate::pass_lane::{
    AttachmentDescriptor, FrameInputs, FrameRecorder, FrameStats, MaterialBinder,
    PassDescriptor, PassOrchestrator,
};
use tessera_core::{
    renderer::{
        BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindGroupLayoutId,
        BufferBindingType, CommandEncoder, Extent2D, GraphicsDevice, ResourceError, ShaderStages,
        SubmissionId, SurfacePresenter, TextureViewId, UniformRingBuffer,
    },
    scene::{CameraUniformData, SceneSource},
    DrawCoreConfig,
};

/// What one submitted frame contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// The index of the frame, counted from 0.
    pub frame_index: u64,
    /// The frame slot whose resources the frame used.
    pub frame_slot: usize,
    /// The number of objects drawn.
    pub objects: u32,
    /// The number of batches.
    pub batches: u32,
    /// Pass and draw counters of the recording.
    pub stats: FrameStats,
    /// The submission carrying the frame's commands.
    pub submission: SubmissionId,
}

/// Drives batching, the compute chain and pass recording once per frame.
#[derive(Debug)]
pub struct DrawSubmitter {
    config: DrawCoreConfig,
    table: BatchTable,
    lane: IndirectDrawLane,
    pacer: FramePacer,
    camera_layout: BindGroupLayoutId,
    camera: UniformRingBuffer,
    orchestrator: PassOrchestrator,
}

impl DrawSubmitter {
    /// Creates the submitter and every per-frame resource.
    ///
    /// Attachments and the pass structure are declared afterwards through
    /// [`set_attachments`](Self::set_attachments) and
    /// [`set_structure`](Self::set_structure).
    pub fn new(
        device: &dyn GraphicsDevice,
        config: DrawCoreConfig,
        extent: Extent2D,
    ) -> Result<Self, DrawCoreError> {
        config.validate()?;
        let pacer = FramePacer::new(config.frames_in_flight)?;
        let lane = IndirectDrawLane::new(device, &config)?;

        let camera_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("camera_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BufferBindingType::Uniform,
            }],
        })?;
        let camera = UniformRingBuffer::new(
            device,
            camera_layout,
            0,
            std::mem::size_of::<CameraUniformData>() as u64,
            pacer.frames_in_flight(),
            "Camera",
        )?;

        log::info!(
            "DrawSubmitter ready: {} frames in flight, {:?} chain",
            pacer.frames_in_flight(),
            lane.strategy()
        );

        Ok(Self {
            config,
            table: BatchTable::new(),
            lane,
            pacer,
            camera_layout,
            camera,
            orchestrator: PassOrchestrator::new(extent),
        })
    }

    /// Declares the attachments. See [`PassOrchestrator::set_attachments`].
    pub fn set_attachments(
        &mut self,
        device: &dyn GraphicsDevice,
        attachments: Vec<AttachmentDescriptor>,
    ) -> Result<(), DrawCoreError> {
        self.orchestrator.set_attachments(device, attachments)
    }

    /// Declares the pass structure. See [`PassOrchestrator::set_structure`].
    pub fn set_structure(
        &mut self,
        device: &dyn GraphicsDevice,
        passes: Vec<PassDescriptor>,
    ) -> Result<(), DrawCoreError> {
        self.orchestrator.set_structure(device, passes)
    }

    /// Rebuilds the pass graph for a new target size.
    pub fn resize(
        &mut self,
        device: &dyn GraphicsDevice,
        extent: Extent2D,
    ) -> Result<(), DrawCoreError> {
        log::info!("DrawSubmitter: resize to {}x{}", extent.width, extent.height);
        self.orchestrator.on_resize(device, extent)
    }

    /// The configuration in use.
    pub fn config(&self) -> &DrawCoreConfig {
        &self.config
    }

    /// The batch table of the last frame.
    pub fn table(&self) -> &BatchTable {
        &self.table
    }

    /// The compute chain lane.
    pub fn lane(&self) -> &IndirectDrawLane {
        &self.lane
    }

    /// The frame pacer.
    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    /// The pass orchestrator.
    pub fn orchestrator(&self) -> &PassOrchestrator {
        &self.orchestrator
    }

    /// The layout of the camera bind group, for building render pipelines.
    pub fn camera_layout(&self) -> BindGroupLayoutId {
        self.camera_layout
    }

    /// Renders one frame, letting `record` drive the passes and subpasses.
    ///
    /// `record` receives the frame's [`FrameRecorder`] after the compute chain
    /// has been encoded. The frame is submitted only if `record` returns `Ok`
    /// and the recording is complete. Otherwise the acquired target is handed
    /// back through [`SurfacePresenter::release`].
    ///
    /// # Errors
    ///
    /// Capacity, state, structure and device errors abort the frame. A failed
    /// present happens after submission: the fence is kept but the frame index
    /// does not advance.
    pub fn render_frame<F>(
        &mut self,
        device: &dyn GraphicsDevice,
        presenter: &mut dyn SurfacePresenter,
        scene: &dyn SceneSource,
        camera: &CameraUniformData,
        record: F,
    ) -> Result<FrameReport, DrawCoreError>
    where
        F: FnOnce(&mut FrameRecorder<'_>) -> Result<(), DrawCoreError>,
    {
        let frame_slot = self.pacer.acquire(device)?;

        self.table.rebuild(scene, self.config.max_objects)?;
        if self.table.skipped() > 0 {
            log::debug!(
                "DrawSubmitter: skipped {} renderables without mesh or material",
                self.table.skipped()
            );
        }

        self.camera.select(frame_slot);
        self.camera.write(device, bytemuck::bytes_of(camera))?;
        let camera_group = *self
            .camera
            .current_bind_group()
            .ok_or(ResourceError::NotFound)?;

        self.lane.prepare(device, frame_slot, &self.table)?;

        let mut encoder = device.create_command_encoder(Some("draw_submitter"));
        self.lane.encode(encoder.as_mut(), frame_slot)?;

        let target = presenter.acquire()?;
        let submitted =
            self.record_and_submit(device, encoder, frame_slot, target, camera_group, record);
        let (stats, submission) = match submitted {
            Ok(submitted) => submitted,
            Err(e) => {
                presenter.release();
                return Err(e);
            }
        };
        self.pacer.record(submission);

        if let Err(e) = presenter.present() {
            log::error!("DrawSubmitter: present failed: {e}");
            return Err(e.into());
        }

        let report = FrameReport {
            frame_index: self.pacer.frame_index(),
            frame_slot,
            objects: self.table.object_count(),
            batches: self.table.batch_count(),
            stats,
            submission,
        };
        self.pacer.advance();
        Ok(report)
    }

    fn record_and_submit<F>(
        &mut self,
        device: &dyn GraphicsDevice,
        mut encoder: Box<dyn CommandEncoder>,
        frame_slot: usize,
        target: TextureViewId,
        camera: BindGroupId,
        record: F,
    ) -> Result<(FrameStats, SubmissionId), DrawCoreError>
    where
        F: FnOnce(&mut FrameRecorder<'_>) -> Result<(), DrawCoreError>,
    {
        let stats = {
            let draws = self.lane.draws(frame_slot, &self.table)?;
            let mut frame = self.orchestrator.begin_frame(
                encoder.as_mut(),
                FrameInputs {
                    target,
                    camera,
                    draws,
                },
            )?;
            record(&mut frame)?;
            frame.finish()?
        };
        let submission = device.submit_command_buffer(encoder.finish())?;
        Ok((stats, submission))
    }

    /// Renders one frame, recording every declared pass and subpass in order
    /// with `binder` supplying the materials.
    pub fn render_frame_with(
        &mut self,
        device: &dyn GraphicsDevice,
        presenter: &mut dyn SurfacePresenter,
        scene: &dyn SceneSource,
        camera: &CameraUniformData,
        binder: &dyn MaterialBinder,
    ) -> Result<FrameReport, DrawCoreError> {
        self.render_frame(device, presenter, scene, camera, |frame| {
            frame.record_all(binder)
        })
    }

    /// Waits for all outstanding frames, then destroys every GPU resource.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        if let Err(e) = self.pacer.wait_idle(device) {
            log::warn!("DrawSubmitter: wait before teardown failed: {e}");
        }
        self.orchestrator.destroy(device);
        self.lane.destroy(device);
        self.camera.destroy(device);
    }
}
