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

//! Data-parallel host versions of the three compute stages.
//!
//! Each function mirrors one WGSL entry point work item for work item, with
//! `rayon` standing in for the GPU's workgroups. They back the host strategy
//! of the [`IndirectDrawLane`](super::IndirectDrawLane) on devices without
//! compute support, and serve as the reference the shaders are tested against.

use crate::error::KernelError;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use tessera_core::renderer::{BatchGeometry, BatchRecord, DrawDescriptor, DrawIndexedIndirectArgs};

/// The number of even/odd rounds needed to sort `n` elements.
pub fn sort_rounds(n: u32) -> u32 {
    n.div_ceil(2)
}

/// The number of parity passes (dispatches) needed to sort `n` elements.
///
/// Arrays of fewer than two elements are already sorted and need none.
pub fn sort_pass_count(n: u32) -> u32 {
    if n < 2 {
        0
    } else {
        2 * sort_rounds(n)
    }
}

/// The parity of pass `pass` of the sort: even passes first.
pub fn pass_parity(pass: u32) -> u32 {
    pass % 2
}

/// Runs one odd-even transposition pass over `order`.
///
/// Pair `i` compares positions `2i + parity` and `2i + parity + 1` and swaps
/// them if the right one has the lower batch index. A trailing element with no
/// right neighbor is left in place.
pub fn odd_even_pass(order: &mut [u32], records: &[BatchRecord], parity: u32) {
    let start = parity as usize;
    if start >= order.len() {
        return;
    }
    order[start..].par_chunks_exact_mut(2).for_each(|pair| {
        let left = records[pair[0] as usize].batch_index;
        let right = records[pair[1] as usize].batch_index;
        if right < left {
            pair.swap(0, 1);
        }
    });
}

/// Sorts `order` by the batch index of the records it points at.
pub fn odd_even_sort(order: &mut [u32], records: &[BatchRecord]) {
    for pass in 0..sort_pass_count(order.len() as u32) {
        odd_even_pass(order, records, pass_parity(pass));
    }
}

/// The identity permutation over `n` records.
pub fn identity_order(n: u32) -> Vec<u32> {
    (0..n).collect()
}

/// The output of the compaction stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compaction {
    /// One slot per batch; `None` where no run claimed the slot.
    pub descriptors: Vec<Option<DrawDescriptor>>,
    /// The value of the output counter after every work item ran.
    pub live_count: u32,
}

impl Compaction {
    /// The descriptor slots as uploaded to the GPU: unclaimed slots are zero.
    pub fn descriptor_slots(&self) -> Vec<DrawDescriptor> {
        self.descriptors
            .iter()
            .map(|d| d.unwrap_or_default())
            .collect()
    }
}

/// Compacts the sorted records into one descriptor per run of equal batch
/// indices, written at slot `[batch_index]`.
///
/// Only the rightmost element of a run does any work: it walks left to the
/// run's start, then claims the run's descriptor slot and bumps the counter.
///
/// # Errors
///
/// [`KernelError::DuplicateDescriptor`] if `order` is not sorted by batch, so
/// that two runs share a batch. [`KernelError::BatchOutOfRange`] if a record
/// names a batch at or beyond `batch_count`.
pub fn compact(
    records: &[BatchRecord],
    order: &[u32],
    batch_count: u32,
) -> Result<Compaction, KernelError> {
    let n = order.len();
    let slots: Vec<OnceLock<DrawDescriptor>> =
        (0..batch_count).map(|_| OnceLock::new()).collect();
    let counter = AtomicU32::new(0);
    let sorted = |i: usize| &records[order[i] as usize];

    (0..n).into_par_iter().try_for_each(|i| {
        let batch = sorted(i).batch_index;
        if i + 1 < n && sorted(i + 1).batch_index == batch {
            return Ok(());
        }

        let mut first = sorted(i).first;
        let mut count = sorted(i).count;
        let mut start = i;
        while start > 0 && sorted(start - 1).batch_index == batch {
            start -= 1;
            first = first.min(sorted(start).first);
            count += sorted(start).count;
        }

        let slot = slots.get(batch as usize).ok_or(KernelError::BatchOutOfRange {
            batch,
            slots: slots.len(),
        })?;
        counter.fetch_add(1, Ordering::Relaxed);
        slot.set(DrawDescriptor {
            first,
            count,
            batch_index: batch,
            padding: 0,
        })
        .map_err(|_| KernelError::DuplicateDescriptor { slot: batch })
    })?;

    Ok(Compaction {
        descriptors: slots.into_iter().map(OnceLock::into_inner).collect(),
        live_count: counter.into_inner(),
    })
}

/// Translates descriptor slots into indexed indirect draw commands.
///
/// Slots are addressed by batch index, so a populated slot may lie past the
/// live count. Only an empty descriptor becomes a zero (no-op) command,
/// exactly like the emission shader.
pub fn emit_commands(
    descriptors: &[DrawDescriptor],
    geometry: &[BatchGeometry],
) -> Vec<DrawIndexedIndirectArgs> {
    let mut commands = vec![DrawIndexedIndirectArgs::default(); descriptors.len()];
    commands
        .par_iter_mut()
        .enumerate()
        .for_each(|(b, command)| {
            let descriptor = &descriptors[b];
            if descriptor.count == 0 {
                return;
            }
            let mesh = geometry.get(b).copied().unwrap_or_default();
            *command = DrawIndexedIndirectArgs {
                index_count: mesh.index_count,
                instance_count: descriptor.count,
                first_index: mesh.first_index,
                base_vertex: mesh.base_vertex,
                first_instance: descriptor.first,
            };
        });
    commands
}

/// The result of running the whole chain on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostChainOutput {
    /// The sorted permutation of the records.
    pub order: Vec<u32>,
    /// The compacted descriptor slots.
    pub descriptors: Vec<DrawDescriptor>,
    /// The emitted draw commands, one per batch slot.
    pub commands: Vec<DrawIndexedIndirectArgs>,
    /// The output counter.
    pub live_count: u32,
}

/// Runs sort, compaction and emission back to back.
pub fn run_chain(
    records: &[BatchRecord],
    geometry: &[BatchGeometry],
    batch_count: u32,
) -> Result<HostChainOutput, KernelError> {
    let mut order = identity_order(records.len() as u32);
    odd_even_sort(&mut order, records);
    let compaction = compact(records, &order, batch_count)?;
    let descriptors = compaction.descriptor_slots();
    let commands = emit_commands(&descriptors, geometry);
    Ok(HostChainOutput {
        order,
        descriptors,
        commands,
        live_count: compaction.live_count,
    })
}
