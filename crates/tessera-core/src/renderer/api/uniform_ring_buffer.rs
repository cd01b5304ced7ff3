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

//! Persistent per-frame ring of uniform buffers.
//!
//! The [`UniformRingBuffer`] pre-allocates one buffer and one bind group per
//! frame in flight. The slot written on the host is always the slot whose fence
//! was just waited on, so the GPU never reads a buffer while it is rewritten.
//!
//! ```text
//! Frame N:     [Slot 0: GPU reads] <- render pass uses this bind group
//! Frame N+1:   [Slot 1: CPU writes] -> write() updates this slot
//! Frame N+2:   [Slot 0: CPU writes] -> fence for slot 0 waited, GPU done reading
//! ```

use super::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, BufferDescriptor,
    BufferId, BufferUsage,
};
use crate::renderer::{error::ResourceError, traits::GraphicsDevice};
use std::borrow::Cow;

/// A single slot in the ring buffer, holding a GPU buffer and its associated bind group.
#[derive(Debug)]
struct RingSlot {
    buffer: BufferId,
    bind_group: BindGroupId,
}

/// A ring of uniform buffers, one per frame in flight.
///
/// The active slot is selected with [`select`](UniformRingBuffer::select) using
/// the frame-slot index handed out by the frame pacer, so slot reuse is covered
/// by the same fence that protects the rest of the frame's resources.
#[derive(Debug)]
pub struct UniformRingBuffer {
    slots: Vec<RingSlot>,
    current_index: usize,
    data_size: u64,
    label: &'static str,
}

impl UniformRingBuffer {
    /// Creates a new `UniformRingBuffer` with `slot_count` pre-allocated slots.
    ///
    /// # Arguments
    ///
    /// * `device` - The graphics device to allocate GPU resources on.
    /// * `layout` - The bind group layout that the bind groups should conform to.
    /// * `binding` - The binding index within the bind group layout.
    /// * `data_size` - The size of the uniform data in bytes.
    /// * `slot_count` - The number of frames in flight.
    /// * `label` - A debug label for the buffer (e.g., "Camera").
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if buffer or bind group creation fails.
    pub fn new(
        device: &dyn GraphicsDevice,
        layout: BindGroupLayoutId,
        binding: u32,
        data_size: u64,
        slot_count: usize,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let mut slots = Vec::with_capacity(slot_count);

        for i in 0..slot_count {
            let buffer = device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Owned(format!("{label} [slot {i}]"))),
                size: data_size,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            })?;

            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[BindGroupEntry::whole(binding, buffer)],
            })?;

            slots.push(RingSlot { buffer, bind_group });
        }

        Ok(Self {
            slots,
            current_index: 0,
            data_size,
            label,
        })
    }

    /// Makes `frame_slot` (modulo the slot count) the current slot.
    pub fn select(&mut self, frame_slot: usize) {
        self.current_index = frame_slot % self.slots.len().max(1);
    }

    /// Writes uniform data to the current slot's GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::OutOfBounds`] if `data` is not exactly the
    /// slot size, or any error reported by the device.
    pub fn write(&self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<(), ResourceError> {
        if data.len() as u64 != self.data_size {
            log::error!(
                "UniformRingBuffer({}): write size mismatch, expected {} bytes, got {}",
                self.label,
                self.data_size,
                data.len()
            );
            return Err(ResourceError::OutOfBounds);
        }
        let slot = self.slots.get(self.current_index).ok_or(ResourceError::NotFound)?;
        device.write_buffer(slot.buffer, 0, data)
    }

    /// Returns the bind group for the current slot, or `None` for an empty ring.
    pub fn current_bind_group(&self) -> Option<&BindGroupId> {
        self.slots.get(self.current_index).map(|s| &s.bind_group)
    }

    /// Returns the current slot index.
    pub fn current_slot_index(&self) -> usize {
        self.current_index
    }

    /// Returns the number of slots in the ring buffer.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Destroys all GPU resources owned by this ring buffer.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for slot in &self.slots {
            if let Err(e) = device.destroy_bind_group(slot.bind_group) {
                log::warn!(
                    "UniformRingBuffer({}): Failed to destroy bind group: {:?}",
                    self.label,
                    e
                );
            }
            if let Err(e) = device.destroy_buffer(slot.buffer) {
                log::warn!(
                    "UniformRingBuffer({}): Failed to destroy buffer: {:?}",
                    self.label,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::*;
    use crate::renderer::error::{RenderError, ResourceError};
    use crate::renderer::traits::{CommandEncoder, ComputePass, RenderPass};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A mock graphics device that hands out unique IDs and records buffer writes.
    #[derive(Debug, Default)]
    struct MockGraphicsDevice {
        next_id: AtomicUsize,
        writes: Mutex<Vec<(BufferId, usize)>>,
    }

    impl MockGraphicsDevice {
        fn next(&self) -> usize {
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        }
    }

    struct MockCommandEncoder;
    struct MockRenderPass;
    struct MockComputePass;

    impl RenderPass<'_> for MockRenderPass {
        fn set_pipeline(&mut self, _p: &RenderPipelineId) {}
        fn set_bind_group(&mut self, _i: u32, _bg: &BindGroupId) {}
        fn set_vertex_buffer(&mut self, _s: u32, _b: &BufferId, _o: u64) {}
        fn set_index_buffer(&mut self, _b: &BufferId, _o: u64, _f: IndexFormat) {}
        fn draw_indexed_indirect(&mut self, _b: &BufferId, _o: u64) {}
        fn multi_draw_indexed_indirect(&mut self, _b: &BufferId, _o: u64, _c: u32) {}
        fn multi_draw_indexed_indirect_count(
            &mut self,
            _b: &BufferId,
            _o: u64,
            _cb: &BufferId,
            _co: u64,
            _m: u32,
        ) {
        }
    }

    impl ComputePass<'_> for MockComputePass {
        fn set_pipeline(&mut self, _p: &ComputePipelineId) {}
        fn set_bind_group(&mut self, _i: u32, _bg: &BindGroupId) {}
        fn dispatch_workgroups(&mut self, _x: u32, _y: u32, _z: u32) {}
    }

    impl CommandEncoder for MockCommandEncoder {
        fn begin_render_pass<'enc>(
            &'enc mut self,
            _desc: &RenderPassDescriptor<'_>,
        ) -> Result<Box<dyn RenderPass<'enc> + 'enc>, ResourceError> {
            Ok(Box::new(MockRenderPass))
        }

        fn begin_compute_pass<'enc>(
            &'enc mut self,
            _desc: &ComputePassDescriptor<'_>,
        ) -> Box<dyn ComputePass<'enc> + 'enc> {
            Box::new(MockComputePass)
        }

        fn clear_buffer(&mut self, _b: &BufferId, _o: u64, _s: Option<u64>) {}

        fn copy_buffer_to_buffer(
            &mut self,
            _src: &BufferId,
            _src_off: u64,
            _dst: &BufferId,
            _dst_off: u64,
            _size: u64,
        ) {
        }

        fn finish(self: Box<Self>) -> CommandBufferId {
            CommandBufferId(0)
        }
    }

    impl GraphicsDevice for MockGraphicsDevice {
        fn create_shader_module(
            &self,
            _d: &ShaderModuleDescriptor,
        ) -> Result<ShaderModuleId, ResourceError> {
            Ok(ShaderModuleId(self.next()))
        }
        fn create_compute_pipeline(
            &self,
            _d: &ComputePipelineDescriptor,
        ) -> Result<ComputePipelineId, ResourceError> {
            Ok(ComputePipelineId(self.next()))
        }
        fn compute_pipeline_bind_group_layout(
            &self,
            _p: ComputePipelineId,
            _g: u32,
        ) -> Result<BindGroupLayoutId, ResourceError> {
            Ok(BindGroupLayoutId(self.next()))
        }
        fn create_bind_group_layout(
            &self,
            _d: &BindGroupLayoutDescriptor,
        ) -> Result<BindGroupLayoutId, ResourceError> {
            Ok(BindGroupLayoutId(self.next()))
        }
        fn create_bind_group(
            &self,
            _d: &BindGroupDescriptor,
        ) -> Result<BindGroupId, ResourceError> {
            Ok(BindGroupId(self.next()))
        }
        fn destroy_bind_group(&self, _id: BindGroupId) -> Result<(), ResourceError> {
            Ok(())
        }
        fn create_buffer(&self, _d: &BufferDescriptor) -> Result<BufferId, ResourceError> {
            Ok(BufferId(self.next()))
        }
        fn create_buffer_with_data(
            &self,
            _d: &BufferDescriptor,
            _data: &[u8],
        ) -> Result<BufferId, ResourceError> {
            Ok(BufferId(self.next()))
        }
        fn destroy_buffer(&self, _id: BufferId) -> Result<(), ResourceError> {
            Ok(())
        }
        fn write_buffer(&self, id: BufferId, _offset: u64, data: &[u8]) -> Result<(), ResourceError> {
            self.writes.lock().unwrap().push((id, data.len()));
            Ok(())
        }
        fn create_texture(&self, _d: &TextureDescriptor) -> Result<TextureId, ResourceError> {
            Ok(TextureId(self.next()))
        }
        fn destroy_texture(&self, _id: TextureId) -> Result<(), ResourceError> {
            Ok(())
        }
        fn create_texture_view(&self, _t: TextureId) -> Result<TextureViewId, ResourceError> {
            Ok(TextureViewId(self.next()))
        }
        fn destroy_texture_view(&self, _id: TextureViewId) -> Result<(), ResourceError> {
            Ok(())
        }
        fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
            Box::new(MockCommandEncoder)
        }
        fn submit_command_buffer(
            &self,
            _cb: CommandBufferId,
        ) -> Result<SubmissionId, RenderError> {
            Ok(SubmissionId(self.next() as u64))
        }
        fn wait_for_submission(&self, _s: SubmissionId) -> Result<(), RenderError> {
            Ok(())
        }
        fn supports_feature(&self, _f: DeviceFeature) -> bool {
            true
        }
    }

    #[test]
    fn test_one_slot_per_frame_in_flight() {
        let device = MockGraphicsDevice::default();
        let ring =
            UniformRingBuffer::new(&device, BindGroupLayoutId(0), 0, 192, 3, "Camera").unwrap();
        assert_eq!(ring.slot_count(), 3);
        assert_eq!(ring.current_slot_index(), 0);
    }

    #[test]
    fn test_select_follows_frame_slot() {
        let device = MockGraphicsDevice::default();
        let mut ring =
            UniformRingBuffer::new(&device, BindGroupLayoutId(0), 0, 64, 2, "Camera").unwrap();
        let first = *ring.current_bind_group().unwrap();
        ring.select(1);
        let second = *ring.current_bind_group().unwrap();
        assert_ne!(first, second);
        ring.select(2);
        assert_eq!(*ring.current_bind_group().unwrap(), first);
    }

    #[test]
    fn test_write_targets_current_slot_and_checks_size() {
        let device = MockGraphicsDevice::default();
        let mut ring =
            UniformRingBuffer::new(&device, BindGroupLayoutId(0), 0, 16, 2, "Params").unwrap();
        ring.select(1);
        ring.write(&device, &[0u8; 16]).unwrap();
        assert!(matches!(
            ring.write(&device, &[0u8; 8]),
            Err(ResourceError::OutOfBounds)
        ));
        let writes = device.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, 16);
    }
}
