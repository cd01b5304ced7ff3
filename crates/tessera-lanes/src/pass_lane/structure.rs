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

//! The declared pass structure and its construction-time validation.

use super::attachments::{AttachmentDescriptor, AttachmentKind};
use crate::error::StructureError;

/// One subpass: the attachments it samples and the attachments it renders to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubpassDescriptor {
    /// The subpass id, dense and zero-based within its pass.
    pub id: u32,
    /// Attachment slots sampled by the subpass.
    pub reads: Vec<u32>,
    /// Attachment slots rendered to by the subpass.
    pub writes: Vec<u32>,
}

impl SubpassDescriptor {
    /// A subpass rendering to `writes` and sampling nothing.
    pub fn writing(id: u32, writes: &[u32]) -> Self {
        Self {
            id,
            reads: Vec::new(),
            writes: writes.to_vec(),
        }
    }

    /// Adds sampled attachments.
    pub fn reading(mut self, reads: &[u32]) -> Self {
        self.reads = reads.to_vec();
        self
    }
}

/// One pass: an ordered list of subpasses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PassDescriptor {
    /// The pass id, dense and zero-based.
    pub id: u32,
    /// The subpasses, in execution order.
    pub subpasses: Vec<SubpassDescriptor>,
}

impl PassDescriptor {
    /// Creates a pass from its subpasses.
    pub fn new(id: u32, subpasses: Vec<SubpassDescriptor>) -> Self {
        Self { id, subpasses }
    }
}

/// Validates a pass structure against its attachments.
///
/// Pass ids and subpass ids must both be 0, 1, 2, ... in declaration order.
/// Every subpass must write at least one attachment and at most one depth
/// attachment, may only reference declared slots, may not list a slot twice,
/// may not read what it writes, and may not sample the swapchain image.
pub fn validate_structure(
    attachments: &[AttachmentDescriptor],
    passes: &[PassDescriptor],
) -> Result<(), StructureError> {
    if attachments.is_empty() {
        return Err(StructureError::MissingAttachments);
    }
    if passes.is_empty() {
        return Err(StructureError::EmptyStructure);
    }

    let kind_of = |slot: u32| {
        attachments
            .iter()
            .find(|a| a.slot == slot)
            .map(|a| a.kind)
    };

    for (expected, pass) in passes.iter().enumerate() {
        let expected = expected as u32;
        if pass.id != expected {
            return Err(StructureError::NonDensePassId {
                expected,
                found: pass.id,
            });
        }
        if pass.subpasses.is_empty() {
            return Err(StructureError::EmptyPass { pass: pass.id });
        }

        for (expected_sub, subpass) in pass.subpasses.iter().enumerate() {
            let expected_sub = expected_sub as u32;
            if subpass.id != expected_sub {
                return Err(StructureError::NonDenseSubpassId {
                    pass: pass.id,
                    expected: expected_sub,
                    found: subpass.id,
                });
            }
            if subpass.writes.is_empty() {
                return Err(StructureError::NoWrites {
                    pass: pass.id,
                    subpass: subpass.id,
                });
            }

            for slots in [&subpass.writes, &subpass.reads] {
                if let Some(slot) = first_repeated(slots) {
                    return Err(StructureError::DuplicateSubpassSlot {
                        pass: pass.id,
                        subpass: subpass.id,
                        slot,
                    });
                }
            }

            let mut depth_writes = 0;
            for &slot in &subpass.writes {
                let kind = kind_of(slot).ok_or(StructureError::UnknownAttachment {
                    pass: pass.id,
                    subpass: subpass.id,
                    slot,
                })?;
                if kind == AttachmentKind::Depth {
                    depth_writes += 1;
                }
            }
            if depth_writes > 1 {
                return Err(StructureError::MultipleDepthWrites {
                    pass: pass.id,
                    subpass: subpass.id,
                });
            }

            for &slot in &subpass.reads {
                let kind = kind_of(slot).ok_or(StructureError::UnknownAttachment {
                    pass: pass.id,
                    subpass: subpass.id,
                    slot,
                })?;
                if kind == AttachmentKind::Swapchain {
                    return Err(StructureError::SwapchainRead {
                        pass: pass.id,
                        subpass: subpass.id,
                    });
                }
                if subpass.writes.contains(&slot) {
                    return Err(StructureError::ReadWriteConflict {
                        pass: pass.id,
                        subpass: subpass.id,
                        slot,
                    });
                }
            }
        }
    }
    Ok(())
}

fn first_repeated(slots: &[u32]) -> Option<u32> {
    slots
        .iter()
        .enumerate()
        .find(|&(i, slot)| slots[..i].contains(slot))
        .map(|(_, &slot)| slot)
}
