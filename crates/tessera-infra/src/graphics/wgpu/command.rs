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

use tessera_core::renderer::api::{
    BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor, ComputePipelineId,
    IndexFormat, RenderPassDescriptor, RenderPipelineId, TextureViewId,
};
use tessera_core::renderer::traits::{CommandEncoder, ComputePass, RenderPass};
use tessera_core::renderer::ResourceError;

use super::conversions::IntoWgpu;
use super::device::WgpuDevice;

/// A render pass recording into a wgpu encoder.
///
/// `pass` is `None` when the encoder was unusable; every command is then
/// dropped with a warning.
pub struct WgpuRenderPass<'a> {
    pub(crate) pass: Option<wgpu::RenderPass<'a>>,
    pub(crate) device: &'a WgpuDevice,
}

impl WgpuRenderPass<'_> {
    /// Looks up `buffer` and hands it to `op` together with the open pass.
    fn with_buffer(
        &mut self,
        buffer_id: &BufferId,
        what: &str,
        op: impl FnOnce(&mut wgpu::RenderPass<'_>, &wgpu::Buffer),
    ) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        if let Some(buffer) = self.device.get_wgpu_buffer(*buffer_id) {
            op(pass, &buffer);
        } else {
            log::warn!("WgpuRenderPass: {what} BufferId {buffer_id:?} not found.");
        }
    }
}

impl<'pass> RenderPass<'pass> for WgpuRenderPass<'pass> {
    fn set_pipeline(&mut self, pipeline_id: &RenderPipelineId) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        if let Some(pipeline) = self.device.get_wgpu_render_pipeline(*pipeline_id) {
            pass.set_pipeline(&pipeline);
        } else {
            log::warn!("WgpuRenderPass: RenderPipelineId {pipeline_id:?} not found.");
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group_id: &BindGroupId) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        if let Some(bind_group) = self.device.get_wgpu_bind_group(*bind_group_id) {
            pass.set_bind_group(index, bind_group.as_ref(), &[]);
        } else {
            log::warn!("WgpuRenderPass: BindGroupId {bind_group_id:?} not found.");
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer_id: &BufferId, offset: u64) {
        self.with_buffer(buffer_id, "Vertex", |pass, buffer| {
            pass.set_vertex_buffer(slot, buffer.slice(offset..));
        });
    }

    fn set_index_buffer(&mut self, buffer_id: &BufferId, offset: u64, index_format: IndexFormat) {
        self.with_buffer(buffer_id, "Index", |pass, buffer| {
            pass.set_index_buffer(buffer.slice(offset..), index_format.into_wgpu());
        });
    }

    fn draw_indexed_indirect(&mut self, indirect_buffer: &BufferId, indirect_offset: u64) {
        self.with_buffer(indirect_buffer, "Indirect", |pass, buffer| {
            pass.draw_indexed_indirect(buffer, indirect_offset);
        });
    }

    fn multi_draw_indexed_indirect(
        &mut self,
        indirect_buffer: &BufferId,
        indirect_offset: u64,
        count: u32,
    ) {
        self.with_buffer(indirect_buffer, "Indirect", |pass, buffer| {
            pass.multi_draw_indexed_indirect(buffer, indirect_offset, count);
        });
    }

    fn multi_draw_indexed_indirect_count(
        &mut self,
        indirect_buffer: &BufferId,
        indirect_offset: u64,
        count_buffer: &BufferId,
        count_offset: u64,
        max_count: u32,
    ) {
        let Some(counter) = self.device.get_wgpu_buffer(*count_buffer) else {
            log::warn!("WgpuRenderPass: Count BufferId {count_buffer:?} not found.");
            return;
        };
        self.with_buffer(indirect_buffer, "Indirect", |pass, buffer| {
            pass.multi_draw_indexed_indirect_count(
                buffer,
                indirect_offset,
                &counter,
                count_offset,
                max_count,
            );
        });
    }
}

pub struct WgpuComputePass<'a> {
    pub(crate) pass: Option<wgpu::ComputePass<'a>>,
    pub(crate) device: &'a WgpuDevice,
}

impl<'pass> ComputePass<'pass> for WgpuComputePass<'pass> {
    fn set_pipeline(&mut self, pipeline_id: &ComputePipelineId) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        if let Some(pipeline) = self.device.get_wgpu_compute_pipeline(*pipeline_id) {
            pass.set_pipeline(&pipeline);
        } else {
            log::warn!("WgpuComputePass: ComputePipelineId {pipeline_id:?} not found.");
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group_id: &BindGroupId) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        if let Some(bind_group) = self.device.get_wgpu_bind_group(*bind_group_id) {
            pass.set_bind_group(index, bind_group.as_ref(), &[]);
        } else {
            log::warn!("WgpuComputePass: BindGroupId {bind_group_id:?} not found.");
        }
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        if let Some(pass) = self.pass.as_mut() {
            pass.dispatch_workgroups(x, y, z);
        }
    }
}

pub struct WgpuCommandEncoder {
    pub(crate) encoder: Option<wgpu::CommandEncoder>,
    pub(crate) device: WgpuDevice,
}

impl WgpuCommandEncoder {
    /// Provides mutable access to the underlying `wgpu::CommandEncoder`.
    /// Returns `None` if the encoder has already been consumed by `finish()`.
    pub fn wgpu_encoder_mut(&mut self) -> Option<&mut wgpu::CommandEncoder> {
        self.encoder.as_mut()
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Result<Box<dyn RenderPass<'encoder> + 'encoder>, ResourceError> {
        let find_view = |id: &TextureViewId, what: &str| {
            self.device
                .get_wgpu_texture_view(id)
                .map(|view| (*view).clone())
                .ok_or_else(|| {
                    log::error!("WgpuCommandEncoder: {what} view {id:?} not found.");
                    ResourceError::NotFound
                })
        };

        // Collect all views first so the attachments can borrow them.
        let mut views: Vec<wgpu::TextureView> = Vec::new();
        let mut ops = Vec::new();
        for att in descriptor.color_attachments.iter() {
            views.push(find_view(att.view, "color")?);
            ops.push(att.ops.into_wgpu());
        }

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = views
            .iter()
            .zip(ops)
            .map(|(view, ops)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops,
                    depth_slice: None,
                })
            })
            .collect();

        let depth_view: Option<wgpu::TextureView> = descriptor
            .depth_stencil_attachment
            .as_ref()
            .map(|ds| find_view(ds.view, "depth"))
            .transpose()?;

        let depth_stencil_attachment = match (&descriptor.depth_stencil_attachment, &depth_view) {
            (Some(ds), Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(ds.depth_ops.into_wgpu()),
                stencil_ops: None,
            }),
            _ => None,
        };

        let wgpu_descriptor = wgpu::RenderPassDescriptor {
            label: descriptor.label,
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        };

        let pass = match self.encoder.as_mut() {
            Some(encoder) => Some(encoder.begin_render_pass(&wgpu_descriptor)),
            None => {
                log::error!("WgpuCommandEncoder: render pass begun on a finished encoder.");
                None
            }
        };

        Ok(Box::new(WgpuRenderPass {
            pass,
            device: &self.device,
        }))
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'_>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        let pass = match self.encoder.as_mut() {
            Some(encoder) => Some(encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: descriptor.label,
                timestamp_writes: None,
            })),
            None => {
                log::error!("WgpuCommandEncoder: compute pass begun on a finished encoder.");
                None
            }
        };

        Box::new(WgpuComputePass {
            pass,
            device: &self.device,
        })
    }

    fn clear_buffer(&mut self, buffer: &BufferId, offset: u64, size: Option<u64>) {
        let (Some(encoder), Some(wgpu_buffer)) =
            (self.encoder.as_mut(), self.device.get_wgpu_buffer(*buffer))
        else {
            log::warn!("WgpuCommandEncoder: cannot clear BufferId {buffer:?}.");
            return;
        };
        encoder.clear_buffer(&wgpu_buffer, offset, size);
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferId,
        source_offset: u64,
        destination: &BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        if let (Some(encoder), Some(source_buffer), Some(destination_buffer)) = (
            self.encoder.as_mut(),
            self.device.get_wgpu_buffer(*source),
            self.device.get_wgpu_buffer(*destination),
        ) {
            encoder.copy_buffer_to_buffer(
                &source_buffer,
                source_offset,
                &destination_buffer,
                destination_offset,
                size,
            );
        }
    }

    fn finish(mut self: Box<Self>) -> CommandBufferId {
        match self.encoder.take() {
            Some(finished_encoder) => self
                .device
                .register_command_buffer(finished_encoder.finish()),
            None => {
                // Never registered, so submission rejects it.
                log::error!("WgpuCommandEncoder: finishing an encoder that was never opened.");
                CommandBufferId(u64::MAX)
            }
        }
    }
}
