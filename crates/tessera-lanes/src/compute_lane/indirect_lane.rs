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

//! The lane turning a [`BatchTable`] into a GPU-resident indirect command buffer.

use super::kernels;
use super::shaders::{self, ENTRY_POINT};
use crate::batch_lane::{BatchInfo, BatchTable};
use crate::error::DrawCoreError;
use std::borrow::Cow;
use tessera_core::{
    renderer::{
        BatchGeometry, BatchRecord, BindGroupDescriptor, BindGroupEntry, BindGroupId,
        BufferDescriptor, BufferId, BufferUsage, CapacityError, ChainParams, CommandEncoder,
        ComputePassDescriptor, ComputePipelineDescriptor, ComputePipelineId, DeviceFeature,
        DrawDescriptor, DrawIndexedIndirectArgs, GraphicsDevice, InstanceData, ResourceError,
        ShaderModuleDescriptor,
    },
    DrawCoreConfig, DrawCountMode, GeometryBinding,
};

/// Where the compute chain runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStrategy {
    /// Sort, compaction and emission run as compute dispatches.
    Gpu,
    /// The chain runs on the host with `rayon`; the results are uploaded.
    Host,
}

/// How the multi-draw obtains its draw count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCount {
    /// Read from the output counter on the GPU.
    Gpu,
    /// The host-known batch count.
    Host(u32),
}

/// Everything the orchestrator needs to issue a frame's indirect draws.
#[derive(Debug, Clone, Copy)]
pub struct FrameDraws<'a> {
    /// The indirect command buffer, one command per batch slot.
    pub commands: BufferId,
    /// The output counter.
    pub counter: BufferId,
    /// The per-instance storage buffer the vertex stage reads.
    pub instances: BufferId,
    /// The frame's batches, indexed by batch index.
    pub batches: &'a [BatchInfo],
    /// How the draw count is supplied.
    pub count: DrawCount,
    /// How mesh geometry is bound.
    pub geometry: GeometryBinding,
}

impl FrameDraws<'_> {
    /// The number of command slots that may hold a draw.
    pub fn batch_count(&self) -> u32 {
        self.batches.len() as u32
    }
}

#[derive(Debug, Clone, Copy)]
struct ChainPipelines {
    sort: ComputePipelineId,
    compact: ComputePipelineId,
    emit: ComputePipelineId,
}

#[derive(Debug, Clone, Copy)]
struct ChainBindGroups {
    sort: [BindGroupId; 2],
    compact: BindGroupId,
    emit: BindGroupId,
}

/// The buffers of one frame in flight.
#[derive(Debug)]
struct FrameBuffers {
    records: BufferId,
    order: BufferId,
    instances: BufferId,
    geometry: BufferId,
    descriptors: BufferId,
    commands: BufferId,
    counter: BufferId,
    params: [BufferId; 2],
    bind_groups: Option<ChainBindGroups>,
    object_count: u32,
    batch_count: u32,
}

impl FrameBuffers {
    fn buffers(&self) -> [BufferId; 9] {
        [
            self.records,
            self.order,
            self.instances,
            self.geometry,
            self.descriptors,
            self.commands,
            self.counter,
            self.params[0],
            self.params[1],
        ]
    }
}

/// Runs the batching chain (sort, compaction, emission) for each frame.
///
/// Buffers are allocated once per frame in flight, sized to `max_objects`, and
/// overwritten every frame.
#[derive(Debug)]
pub struct IndirectDrawLane {
    strategy: ChainStrategy,
    draw_count: DrawCountMode,
    geometry: GeometryBinding,
    capacity: u32,
    workgroup_size: u32,
    pipelines: Option<ChainPipelines>,
    frames: Vec<FrameBuffers>,
    last_host_output: Option<kernels::HostChainOutput>,
}

fn storage_buffer(
    device: &dyn GraphicsDevice,
    label: String,
    size: u64,
    extra: BufferUsage,
) -> Result<BufferId, DrawCoreError> {
    Ok(device.create_buffer(&BufferDescriptor {
        label: Some(Cow::Owned(label)),
        size,
        usage: BufferUsage::STORAGE | BufferUsage::COPY_DST | extra,
        mapped_at_creation: false,
    })?)
}

fn record_size<T>() -> u64 {
    std::mem::size_of::<T>() as u64
}

impl IndirectDrawLane {
    /// Creates the lane, its pipelines and every per-frame buffer.
    ///
    /// # Errors
    ///
    /// [`DrawCoreError::Config`] for an invalid configuration and
    /// [`DrawCoreError::MissingFeature`] if the device cannot honor it.
    pub fn new(device: &dyn GraphicsDevice, config: &DrawCoreConfig) -> Result<Self, DrawCoreError> {
        config.validate()?;

        if !device.supports_feature(DeviceFeature::IndirectFirstInstance) {
            return Err(DrawCoreError::MissingFeature("indirect_first_instance"));
        }

        let strategy = if device.supports_feature(DeviceFeature::Compute) {
            ChainStrategy::Gpu
        } else {
            log::warn!("Device has no compute support, running the batching chain on the host");
            ChainStrategy::Host
        };

        let has_count = device.supports_feature(DeviceFeature::MultiDrawIndirectCount);
        let draw_count = match config.draw_count {
            DrawCountMode::Indirect if !has_count => {
                return Err(DrawCoreError::MissingFeature("multi_draw_indexed_indirect_count"));
            }
            DrawCountMode::Auto if !has_count => {
                log::warn!("multi_draw_indexed_indirect_count unavailable, using host-side draw counts");
                DrawCountMode::Host
            }
            DrawCountMode::Auto => DrawCountMode::Indirect,
            mode => mode,
        };

        let pipelines = match strategy {
            ChainStrategy::Gpu => Some(Self::create_pipelines(device, config.workgroup_size)?),
            ChainStrategy::Host => None,
        };

        let mut lane = Self {
            strategy,
            draw_count,
            geometry: config.geometry,
            capacity: config.max_objects,
            workgroup_size: config.workgroup_size,
            pipelines,
            frames: Vec::with_capacity(config.frames_in_flight as usize),
            last_host_output: None,
        };
        for slot in 0..config.frames_in_flight as usize {
            let frame = lane.create_frame(device, slot)?;
            lane.frames.push(frame);
        }

        log::info!(
            "IndirectDrawLane ready: {:?} chain, {:?} draw count, {} objects x {} frames",
            lane.strategy,
            lane.draw_count,
            lane.capacity,
            lane.frames.len()
        );
        Ok(lane)
    }

    fn create_pipelines(
        device: &dyn GraphicsDevice,
        workgroup_size: u32,
    ) -> Result<ChainPipelines, DrawCoreError> {
        let create = |label: &str, source: &str| -> Result<ComputePipelineId, DrawCoreError> {
            let module = device.create_shader_module(&ShaderModuleDescriptor {
                label: Some(label),
                wgsl: shaders::with_workgroup_size(source, workgroup_size),
            })?;
            Ok(device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(label),
                module,
                entry_point: ENTRY_POINT,
            })?)
        };
        Ok(ChainPipelines {
            sort: create("batch_sort", shaders::BATCH_SORT_WGSL)?,
            compact: create("batch_compact", shaders::BATCH_COMPACT_WGSL)?,
            emit: create("batch_emit", shaders::BATCH_EMIT_WGSL)?,
        })
    }

    fn create_frame(&self, device: &dyn GraphicsDevice, slot: usize) -> Result<FrameBuffers, DrawCoreError> {
        let n = self.capacity as u64;
        let uniform = |label: String| {
            device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Owned(label)),
                size: record_size::<ChainParams>(),
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let mut frame = FrameBuffers {
            records: storage_buffer(
                device,
                format!("batch_records [slot {slot}]"),
                n * record_size::<BatchRecord>(),
                BufferUsage::empty(),
            )?,
            order: storage_buffer(
                device,
                format!("batch_order [slot {slot}]"),
                n * record_size::<u32>(),
                BufferUsage::empty(),
            )?,
            instances: storage_buffer(
                device,
                format!("instances [slot {slot}]"),
                n * record_size::<InstanceData>(),
                BufferUsage::empty(),
            )?,
            geometry: storage_buffer(
                device,
                format!("batch_geometry [slot {slot}]"),
                n * record_size::<BatchGeometry>(),
                BufferUsage::empty(),
            )?,
            descriptors: storage_buffer(
                device,
                format!("draw_descriptors [slot {slot}]"),
                n * record_size::<DrawDescriptor>(),
                BufferUsage::COPY_SRC,
            )?,
            commands: storage_buffer(
                device,
                format!("draw_commands [slot {slot}]"),
                n * DrawIndexedIndirectArgs::SIZE,
                BufferUsage::INDIRECT | BufferUsage::COPY_SRC,
            )?,
            counter: storage_buffer(
                device,
                format!("draw_counter [slot {slot}]"),
                record_size::<u32>(),
                BufferUsage::INDIRECT | BufferUsage::COPY_SRC,
            )?,
            params: [
                uniform(format!("chain_params even [slot {slot}]"))?,
                uniform(format!("chain_params odd [slot {slot}]"))?,
            ],
            bind_groups: None,
            object_count: 0,
            batch_count: 0,
        };

        if let Some(pipelines) = &self.pipelines {
            frame.bind_groups = Some(Self::create_bind_groups(device, pipelines, &frame)?);
        }
        Ok(frame)
    }

    fn create_bind_groups(
        device: &dyn GraphicsDevice,
        pipelines: &ChainPipelines,
        frame: &FrameBuffers,
    ) -> Result<ChainBindGroups, DrawCoreError> {
        let sort_layout = device.compute_pipeline_bind_group_layout(pipelines.sort, 0)?;
        let compact_layout = device.compute_pipeline_bind_group_layout(pipelines.compact, 0)?;
        let emit_layout = device.compute_pipeline_bind_group_layout(pipelines.emit, 0)?;

        let sort_group = |params: BufferId| {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("batch_sort"),
                layout: sort_layout,
                entries: &[
                    BindGroupEntry::whole(0, params),
                    BindGroupEntry::whole(1, frame.records),
                    BindGroupEntry::whole(2, frame.order),
                ],
            })
        };

        Ok(ChainBindGroups {
            sort: [sort_group(frame.params[0])?, sort_group(frame.params[1])?],
            compact: device.create_bind_group(&BindGroupDescriptor {
                label: Some("batch_compact"),
                layout: compact_layout,
                entries: &[
                    BindGroupEntry::whole(0, frame.params[0]),
                    BindGroupEntry::whole(1, frame.records),
                    BindGroupEntry::whole(2, frame.order),
                    BindGroupEntry::whole(3, frame.descriptors),
                    BindGroupEntry::whole(4, frame.counter),
                ],
            })?,
            emit: device.create_bind_group(&BindGroupDescriptor {
                label: Some("batch_emit"),
                layout: emit_layout,
                entries: &[
                    BindGroupEntry::whole(0, frame.params[0]),
                    BindGroupEntry::whole(1, frame.descriptors),
                    BindGroupEntry::whole(2, frame.geometry),
                    BindGroupEntry::whole(3, frame.commands),
                ],
            })?,
        })
    }

    /// Where the chain runs on this device.
    pub fn strategy(&self) -> ChainStrategy {
        self.strategy
    }

    /// The resolved draw-count mode: never [`DrawCountMode::Auto`].
    pub fn draw_count_mode(&self) -> DrawCountMode {
        self.draw_count
    }

    /// The maximum number of objects per frame.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The number of frame slots.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The output of the last host-side chain run, if the host strategy is active.
    pub fn last_host_output(&self) -> Option<&kernels::HostChainOutput> {
        self.last_host_output.as_ref()
    }

    fn frame(&self, frame_slot: usize) -> Result<&FrameBuffers, DrawCoreError> {
        self.frames
            .get(frame_slot % self.frames.len().max(1))
            .ok_or(DrawCoreError::Resource(ResourceError::NotFound))
    }

    /// Uploads the frame's inputs into the buffers of `frame_slot`.
    ///
    /// With the host strategy the whole chain runs here and its outputs are
    /// uploaded too. The caller must have waited for the slot's previous work.
    ///
    /// # Errors
    ///
    /// [`CapacityError`] if the table does not fit the pre-sized buffers; no
    /// buffer is written in that case.
    pub fn prepare(
        &mut self,
        device: &dyn GraphicsDevice,
        frame_slot: usize,
        table: &BatchTable,
    ) -> Result<(), DrawCoreError> {
        let object_count = table.object_count();
        let batch_count = table.batch_count();
        if object_count > self.capacity {
            return Err(CapacityError::TooManyObjects {
                requested: object_count as usize,
                capacity: self.capacity as usize,
            }
            .into());
        }
        if batch_count > self.capacity {
            return Err(CapacityError::TooManyBatches {
                requested: batch_count as usize,
                capacity: self.capacity as usize,
            }
            .into());
        }

        let geometry = table.geometry_table(self.geometry);
        let slot = frame_slot % self.frames.len().max(1);
        let frame = self.frame(slot)?;

        if !table.is_empty() {
            device.write_buffer(frame.records, 0, bytemuck::cast_slice(table.records()))?;
            device.write_buffer(frame.instances, 0, bytemuck::cast_slice(table.instances()))?;
            device.write_buffer(frame.geometry, 0, bytemuck::cast_slice(&geometry))?;
        }

        match self.strategy {
            ChainStrategy::Gpu => {
                let order = kernels::identity_order(object_count);
                if !order.is_empty() {
                    device.write_buffer(frame.order, 0, bytemuck::cast_slice(&order))?;
                }
                for (parity, params) in frame.params.iter().enumerate() {
                    let data = ChainParams {
                        object_count,
                        batch_count,
                        parity: parity as u32,
                        padding: 0,
                    };
                    device.write_buffer(*params, 0, bytemuck::bytes_of(&data))?;
                }
                self.last_host_output = None;
            }
            ChainStrategy::Host => {
                let output = kernels::run_chain(table.records(), &geometry, batch_count)?;
                if !output.order.is_empty() {
                    device.write_buffer(frame.order, 0, bytemuck::cast_slice(&output.order))?;
                    device.write_buffer(frame.descriptors, 0, bytemuck::cast_slice(&output.descriptors))?;
                    device.write_buffer(frame.commands, 0, bytemuck::cast_slice(&output.commands))?;
                }
                device.write_buffer(frame.counter, 0, bytemuck::bytes_of(&output.live_count))?;
                self.last_host_output = Some(output);
            }
        }

        let frame = &mut self.frames[slot];
        frame.object_count = object_count;
        frame.batch_count = batch_count;
        log::debug!(
            "IndirectDrawLane: prepared slot {slot} with {object_count} objects, {batch_count} batches"
        );
        Ok(())
    }

    /// Records the compute chain of `frame_slot` into `encoder`.
    ///
    /// The output counter is reset first. An empty frame dispatches nothing.
    /// Each sort pass and each stage is its own compute pass, so every stage
    /// sees all writes of the previous one.
    pub fn encode(
        &self,
        encoder: &mut dyn CommandEncoder,
        frame_slot: usize,
    ) -> Result<(), DrawCoreError> {
        let frame = self.frame(frame_slot)?;
        let (Some(pipelines), Some(groups)) = (&self.pipelines, &frame.bind_groups) else {
            // Host strategy: the chain already ran in `prepare`.
            return Ok(());
        };

        encoder.clear_buffer(&frame.counter, 0, None);
        let n = frame.object_count;
        if n == 0 {
            return Ok(());
        }
        encoder.clear_buffer(
            &frame.descriptors,
            0,
            Some(frame.batch_count as u64 * record_size::<DrawDescriptor>()),
        );

        let pairs_groups = self.workgroups_for(kernels::sort_rounds(n));
        for pass in 0..kernels::sort_pass_count(n) {
            let parity = kernels::pass_parity(pass) as usize;
            let mut compute = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("batch_sort"),
            });
            compute.set_pipeline(&pipelines.sort);
            compute.set_bind_group(0, &groups.sort[parity]);
            compute.dispatch_workgroups(pairs_groups, 1, 1);
        }

        {
            let mut compute = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("batch_compact"),
            });
            compute.set_pipeline(&pipelines.compact);
            compute.set_bind_group(0, &groups.compact);
            compute.dispatch_workgroups(self.workgroups_for(n), 1, 1);
        }

        {
            let mut compute = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("batch_emit"),
            });
            compute.set_pipeline(&pipelines.emit);
            compute.set_bind_group(0, &groups.emit);
            compute.dispatch_workgroups(self.workgroups_for(frame.batch_count), 1, 1);
        }
        Ok(())
    }

    fn workgroups_for(&self, items: u32) -> u32 {
        items.div_ceil(self.workgroup_size.max(1))
    }

    /// The draw source of `frame_slot` for the orchestrator.
    pub fn draws<'a>(
        &self,
        frame_slot: usize,
        table: &'a BatchTable,
    ) -> Result<FrameDraws<'a>, DrawCoreError> {
        let frame = self.frame(frame_slot)?;
        let count = match self.draw_count {
            DrawCountMode::Host => DrawCount::Host(frame.batch_count),
            _ => DrawCount::Gpu,
        };
        Ok(FrameDraws {
            commands: frame.commands,
            counter: frame.counter,
            instances: frame.instances,
            batches: table.batches(),
            count,
            geometry: self.geometry,
        })
    }

    /// Destroys every buffer and bind group owned by the lane.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for frame in &self.frames {
            if let Some(groups) = &frame.bind_groups {
                let all = [groups.sort[0], groups.sort[1], groups.compact, groups.emit];
                for group in all {
                    if let Err(e) = device.destroy_bind_group(group) {
                        log::warn!("IndirectDrawLane: Failed to destroy bind group: {:?}", e);
                    }
                }
            }
            for buffer in frame.buffers() {
                if let Err(e) = device.destroy_buffer(buffer) {
                    log::warn!("IndirectDrawLane: Failed to destroy buffer: {:?}", e);
                }
            }
        }
    }
}
