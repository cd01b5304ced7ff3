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

//! The render pass / subpass orchestrator.
//!
//! [`PassOrchestrator`] owns the declared attachments and structure, the built
//! [`PassGraph`] and the [`PassStateMachine`]. A frame is recorded through a
//! [`FrameRecorder`]; each open subpass is a [`SubpassRecorder`] holding the
//! backend render pass, through which the indirect draws are issued.

use super::attachments::{validate_attachments, AttachmentDescriptor};
use super::graph::{PassGraph, TargetSource};
use super::state::{PassState, PassStateMachine};
use super::structure::{validate_structure, PassDescriptor};
use crate::batch_lane::BatchInfo;
use crate::compute_lane::{DrawCount, FrameDraws};
use crate::error::{DrawCoreError, PassStateError, StructureError};
use tessera_core::{
    renderer::{
        BindGroupId, BufferId, CommandEncoder, DrawIndexedIndirectArgs, Extent2D, GraphicsDevice,
        Operations, RenderPass, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
        RenderPassDescriptor, ResourceError, StoreOp, TextureViewId,
    },
    GeometryBinding,
};

/// What a subpass exposes to the [`MaterialBinder`].
#[derive(Debug, Clone, Copy)]
pub struct SubpassContext<'a> {
    /// The active pass.
    pub pass: u32,
    /// The open subpass.
    pub subpass: u32,
    /// Views of the attachments the subpass samples, in declaration order.
    pub inputs: &'a [TextureViewId],
    /// The per-instance storage buffer of the frame.
    pub instances: BufferId,
}

/// Supplies pipelines, bind groups and geometry buffers for the draws of a subpass.
///
/// The camera bind group is already bound at group 0 when either method runs.
pub trait MaterialBinder {
    /// Binds the state shared by every draw of the subpass.
    ///
    /// With [`GeometryBinding::Shared`] this must bind the render pipeline and
    /// the shared index and vertex buffers.
    fn bind_subpass(
        &self,
        pass: &mut dyn RenderPass<'_>,
        context: &SubpassContext<'_>,
    ) -> Result<(), ResourceError>;

    /// Binds the material and mesh of one batch, in [`GeometryBinding::PerMesh`]
    /// mode. Returning `Ok(false)` skips the batch for this subpass.
    fn bind_batch(
        &self,
        pass: &mut dyn RenderPass<'_>,
        context: &SubpassContext<'_>,
        batch: &BatchInfo,
    ) -> Result<bool, ResourceError>;
}

/// Per-frame inputs of the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// The presentation image acquired for this frame.
    pub target: TextureViewId,
    /// The camera uniform bind group, bound at group 0 in every subpass.
    pub camera: BindGroupId,
    /// The frame's indirect draw source.
    pub draws: FrameDraws<'a>,
}

/// Counters of a recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// The number of passes recorded.
    pub passes: u32,
    /// The number of backend render passes (one per subpass).
    pub subpasses: u32,
    /// The number of draw calls recorded.
    pub draw_calls: u32,
}

/// Sequences passes and subpasses around the indirect draws.
#[derive(Debug)]
pub struct PassOrchestrator {
    attachments: Vec<AttachmentDescriptor>,
    structure: Vec<PassDescriptor>,
    graph: Option<PassGraph>,
    machine: PassStateMachine,
    extent: Extent2D,
}

impl PassOrchestrator {
    /// Creates an orchestrator rendering at `extent`, with nothing declared yet.
    pub fn new(extent: Extent2D) -> Self {
        Self {
            attachments: Vec::new(),
            structure: Vec::new(),
            graph: None,
            machine: PassStateMachine::new(),
            extent,
        }
    }

    /// Declares the attachments.
    ///
    /// If a structure is already set it is re-validated against the new list
    /// and the graph is rebuilt.
    pub fn set_attachments(
        &mut self,
        device: &dyn GraphicsDevice,
        attachments: Vec<AttachmentDescriptor>,
    ) -> Result<(), DrawCoreError> {
        validate_attachments(&attachments)?;
        if !self.structure.is_empty() {
            validate_structure(&attachments, &self.structure)?;
        }
        self.attachments = attachments;
        if !self.structure.is_empty() {
            self.rebuild(device)?;
        }
        Ok(())
    }

    /// Declares the pass structure, validates it and builds the graph.
    ///
    /// # Errors
    ///
    /// [`StructureError::MissingAttachments`] if called before
    /// [`set_attachments`](Self::set_attachments), or any other
    /// [`StructureError`] for a malformed structure.
    pub fn set_structure(
        &mut self,
        device: &dyn GraphicsDevice,
        passes: Vec<PassDescriptor>,
    ) -> Result<(), DrawCoreError> {
        if self.attachments.is_empty() {
            return Err(StructureError::MissingAttachments.into());
        }
        validate_structure(&self.attachments, &passes)?;
        self.structure = passes;
        self.rebuild(device)
    }

    /// Rebuilds the whole graph for a new target size.
    ///
    /// A zero-sized extent (e.g. a minimized window) tears the graph down until
    /// the next non-empty resize.
    pub fn on_resize(
        &mut self,
        device: &dyn GraphicsDevice,
        extent: Extent2D,
    ) -> Result<(), DrawCoreError> {
        self.extent = extent;
        if self.structure.is_empty() {
            return Ok(());
        }
        self.rebuild(device)
    }

    fn rebuild(&mut self, device: &dyn GraphicsDevice) -> Result<(), DrawCoreError> {
        self.machine.tear_down()?;
        if let Some(mut graph) = self.graph.take() {
            graph.destroy(device);
        }
        if self.extent.is_empty() {
            log::info!("Render target is empty, pass graph torn down");
            return Ok(());
        }
        let graph = PassGraph::build(device, &self.attachments, &self.structure, self.extent)?;
        self.machine.rebuild(graph.subpass_counts())?;
        self.graph = Some(graph);
        Ok(())
    }

    /// Destroys the graph and its textures.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        if let Err(e) = self.machine.tear_down() {
            log::warn!("PassOrchestrator destroyed mid-frame: {e}");
        }
        if let Some(mut graph) = self.graph.take() {
            graph.destroy(device);
        }
    }

    /// Returns `true` if the graph is built and frames can be recorded.
    pub fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    /// The current target size.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// The built graph, if any.
    pub fn graph(&self) -> Option<&PassGraph> {
        self.graph.as_ref()
    }

    /// The declared attachments.
    pub fn attachments(&self) -> &[AttachmentDescriptor] {
        &self.attachments
    }

    /// The view of a graph-owned attachment, e.g. to sample it elsewhere.
    pub fn attachment_view(&self, slot: u32) -> Option<TextureViewId> {
        self.graph.as_ref().and_then(|g| g.attachment_view(slot))
    }

    /// The number of declared passes.
    pub fn pass_count(&self) -> u32 {
        self.structure.len() as u32
    }

    /// The state of the pass state machine.
    pub fn state(&self) -> PassState {
        self.machine.state()
    }

    /// Starts recording a frame into `encoder`.
    ///
    /// # Errors
    ///
    /// [`PassStateError::NotBuilt`] if no graph is built.
    pub fn begin_frame<'a>(
        &'a mut self,
        encoder: &'a mut dyn CommandEncoder,
        inputs: FrameInputs<'a>,
    ) -> Result<FrameRecorder<'a>, DrawCoreError> {
        let Self { graph, machine, .. } = self;
        let graph = graph.as_ref().ok_or(PassStateError::NotBuilt)?;
        machine.begin_frame()?;
        Ok(FrameRecorder {
            graph,
            machine,
            encoder,
            inputs,
            stats: FrameStats::default(),
        })
    }
}

/// Records one frame's passes and subpasses.
pub struct FrameRecorder<'a> {
    graph: &'a PassGraph,
    machine: &'a mut PassStateMachine,
    encoder: &'a mut dyn CommandEncoder,
    inputs: FrameInputs<'a>,
    stats: FrameStats,
}

impl<'a> FrameRecorder<'a> {
    /// The current state.
    pub fn state(&self) -> PassState {
        self.machine.state()
    }

    /// Counters of the frame so far.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Begins pass `pass`.
    pub fn begin_pass(&mut self, pass: u32) -> Result<(), DrawCoreError> {
        self.machine.begin_pass(pass)?;
        log::trace!("Begin pass {pass}");
        Ok(())
    }

    /// Ends the active pass.
    pub fn end_pass(&mut self) -> Result<(), DrawCoreError> {
        self.machine.end_pass()?;
        self.stats.passes += 1;
        Ok(())
    }

    /// Opens subpass `subpass` of the active pass and begins its render pass.
    ///
    /// The camera is bound at group 0 before the recorder is returned. Drop
    /// the recorder, then call [`end_subpass`](Self::end_subpass).
    pub fn begin_subpass(&mut self, subpass: u32) -> Result<SubpassRecorder<'_>, DrawCoreError> {
        self.machine.begin_subpass(subpass)?;
        let PassState::SubpassActive { pass, .. } = self.machine.state() else {
            return Err(PassStateError::NoActivePass.into());
        };
        let graph: &'a PassGraph = self.graph;
        let node = graph
            .subpass(pass, subpass)
            .ok_or(PassStateError::NotBuilt)?;

        let swapchain = self.inputs.target;
        let mut colors = Vec::with_capacity(node.colors.len());
        for target in &node.colors {
            let view = match &target.source {
                TargetSource::Owned(view) => view,
                TargetSource::Swapchain => &swapchain,
            };
            colors.push(RenderPassColorAttachment {
                view,
                ops: Operations {
                    load: target.load,
                    store: StoreOp::Store,
                },
            });
        }
        let label = format!("pass {pass} subpass {subpass}");
        let descriptor = RenderPassDescriptor {
            label: Some(&label),
            color_attachments: &colors,
            depth_stencil_attachment: node.depth.as_ref().map(|depth| {
                RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Operations {
                        load: depth.load,
                        store: StoreOp::Store,
                    },
                }
            }),
        };

        let mut render_pass = self.encoder.begin_render_pass(&descriptor)?;
        render_pass.set_bind_group(0, &self.inputs.camera);
        self.stats.subpasses += 1;

        Ok(SubpassRecorder {
            render_pass,
            context: SubpassContext {
                pass,
                subpass,
                inputs: &node.inputs,
                instances: self.inputs.draws.instances,
            },
            draws: self.inputs.draws,
            draw_calls: &mut self.stats.draw_calls,
        })
    }

    /// Closes the open subpass.
    pub fn end_subpass(&mut self) -> Result<(), DrawCoreError> {
        self.machine.end_subpass()?;
        Ok(())
    }

    /// Opens subpass `subpass`, draws every batch through `binder`, and
    /// closes it again.
    pub fn record_subpass(
        &mut self,
        subpass: u32,
        binder: &dyn MaterialBinder,
    ) -> Result<u32, DrawCoreError> {
        let issued = {
            let mut recorder = self.begin_subpass(subpass)?;
            recorder.draw_batches(binder)?
        };
        self.end_subpass()?;
        Ok(issued)
    }

    /// Records every pass and subpass of the structure in order, drawing every
    /// batch in each subpass.
    pub fn record_all(&mut self, binder: &dyn MaterialBinder) -> Result<(), DrawCoreError> {
        let graph: &'a PassGraph = self.graph;
        for pass in graph.passes() {
            self.begin_pass(pass.id)?;
            for subpass in &pass.subpasses {
                self.record_subpass(subpass.id, binder)?;
            }
            self.end_pass()?;
        }
        Ok(())
    }

    /// Completes the frame.
    ///
    /// # Errors
    ///
    /// [`PassStateError::IncompleteFrame`] unless every pass was recorded and
    /// nothing is left open.
    pub fn finish(self) -> Result<FrameStats, DrawCoreError> {
        self.machine.finish_frame()?;
        log::debug!(
            "Frame recorded: {} passes, {} subpasses, {} draw calls",
            self.stats.passes,
            self.stats.subpasses,
            self.stats.draw_calls
        );
        Ok(self.stats)
    }
}

impl Drop for FrameRecorder<'_> {
    fn drop(&mut self) {
        if self.machine.state() != PassState::Idle {
            log::warn!(
                "Frame recording abandoned in state {:?}",
                self.machine.state()
            );
            self.machine.abort_frame();
        }
    }
}

/// An open subpass: the backend render pass plus the frame's draw source.
pub struct SubpassRecorder<'r> {
    render_pass: Box<dyn RenderPass<'r> + 'r>,
    context: SubpassContext<'r>,
    draws: FrameDraws<'r>,
    draw_calls: &'r mut u32,
}

impl<'r> SubpassRecorder<'r> {
    /// What the subpass exposes to binders.
    pub fn context(&self) -> &SubpassContext<'r> {
        &self.context
    }

    /// The backend render pass, for draws outside the batch table.
    pub fn render_pass(&mut self) -> &mut (dyn RenderPass<'r> + 'r) {
        &mut *self.render_pass
    }

    /// Issues the frame's indirect draws.
    ///
    /// In shared-geometry mode a single multi-draw covers every batch, with
    /// its count read from the output counter or taken from the host. In
    /// per-mesh mode every batch is bound and drawn from its own command slot.
    /// Returns the number of draw calls recorded; an empty frame records none.
    pub fn draw_batches(&mut self, binder: &dyn MaterialBinder) -> Result<u32, DrawCoreError> {
        binder.bind_subpass(&mut *self.render_pass, &self.context)?;
        let batch_count = self.draws.batch_count();
        if batch_count == 0 {
            return Ok(0);
        }

        let commands = self.draws.commands;
        let issued = match self.draws.geometry {
            GeometryBinding::Shared => {
                match self.draws.count {
                    DrawCount::Gpu => self.render_pass.multi_draw_indexed_indirect_count(
                        &commands,
                        0,
                        &self.draws.counter,
                        0,
                        batch_count,
                    ),
                    DrawCount::Host(count) => {
                        if count == 0 {
                            return Ok(0);
                        }
                        self.render_pass
                            .multi_draw_indexed_indirect(&commands, 0, count.min(batch_count))
                    }
                }
                1
            }
            GeometryBinding::PerMesh => {
                let mut issued = 0;
                for (index, batch) in self.draws.batches.iter().enumerate() {
                    if !binder.bind_batch(&mut *self.render_pass, &self.context, batch)? {
                        continue;
                    }
                    self.render_pass.draw_indexed_indirect(
                        &commands,
                        index as u64 * DrawIndexedIndirectArgs::SIZE,
                    );
                    issued += 1;
                }
                issued
            }
        };
        *self.draw_calls += issued;
        Ok(issued)
    }
}
