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

//! Error types of the draw-submission lanes.
//!
//! Construction errors ([`StructureError`]) are raised while the pass graph is
//! set up. State errors ([`PassStateError`]) flag a render pipeline that calls
//! the orchestrator out of order. Neither is ever retried or swallowed.

use tessera_core::config::ConfigError;
use tessera_core::renderer::{CapacityError, RenderError, ResourceError};
use thiserror::Error;

/// A malformed attachment list or pass structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// A structure was set before any attachment was declared.
    #[error("attachments must be set before the pass structure")]
    MissingAttachments,
    /// The structure holds no pass.
    #[error("the pass structure is empty")]
    EmptyStructure,
    /// A pass declares no subpass.
    #[error("pass {pass} declares no subpass")]
    EmptyPass {
        /// The offending pass.
        pass: u32,
    },
    /// Pass ids are not 0, 1, 2, ...
    #[error("pass ids must be dense and zero-based: expected {expected}, found {found}")]
    NonDensePassId {
        /// The id required at this position.
        expected: u32,
        /// The id actually declared.
        found: u32,
    },
    /// Subpass ids of a pass are not 0, 1, 2, ...
    #[error("subpass ids of pass {pass} must be dense and zero-based: expected {expected}, found {found}")]
    NonDenseSubpassId {
        /// The pass holding the subpass.
        pass: u32,
        /// The id required at this position.
        expected: u32,
        /// The id actually declared.
        found: u32,
    },
    /// Two attachments share a slot.
    #[error("attachment slot {slot} is declared twice")]
    DuplicateAttachmentSlot {
        /// The repeated slot.
        slot: u32,
    },
    /// An attachment's kind and format disagree.
    #[error("attachment '{name}' (slot {slot}) has a format that does not match its kind")]
    FormatMismatch {
        /// The attachment slot.
        slot: u32,
        /// The attachment name.
        name: String,
    },
    /// More than one swapchain attachment was declared.
    #[error("at most one swapchain attachment may be declared")]
    MultipleSwapchains,
    /// A subpass references an attachment slot that was never declared.
    #[error("pass {pass} subpass {subpass} references unknown attachment slot {slot}")]
    UnknownAttachment {
        /// The pass holding the subpass.
        pass: u32,
        /// The subpass.
        subpass: u32,
        /// The undeclared slot.
        slot: u32,
    },
    /// A subpass writes no attachment.
    #[error("pass {pass} subpass {subpass} writes no attachment")]
    NoWrites {
        /// The pass holding the subpass.
        pass: u32,
        /// The subpass.
        subpass: u32,
    },
    /// A subpass writes more than one depth attachment.
    #[error("pass {pass} subpass {subpass} writes more than one depth attachment")]
    MultipleDepthWrites {
        /// The pass holding the subpass.
        pass: u32,
        /// The subpass.
        subpass: u32,
    },
    /// A subpass lists the same slot twice among its reads or its writes.
    #[error("pass {pass} subpass {subpass} lists attachment slot {slot} more than once")]
    DuplicateSubpassSlot {
        /// The pass holding the subpass.
        pass: u32,
        /// The subpass.
        subpass: u32,
        /// The repeated slot.
        slot: u32,
    },
    /// A subpass reads an attachment it also writes.
    #[error("pass {pass} subpass {subpass} both reads and writes attachment slot {slot}")]
    ReadWriteConflict {
        /// The pass holding the subpass.
        pass: u32,
        /// The subpass.
        subpass: u32,
        /// The conflicting slot.
        slot: u32,
    },
    /// A subpass samples the swapchain image, which is write-only.
    #[error("pass {pass} subpass {subpass} reads the swapchain attachment")]
    SwapchainRead {
        /// The pass holding the subpass.
        pass: u32,
        /// The subpass.
        subpass: u32,
    },
}

/// A call to the pass orchestrator that is illegal in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassStateError {
    /// The pass graph has not been built, or was torn down by a zero-sized resize.
    #[error("the pass graph is not built")]
    NotBuilt,
    /// `begin_pass` was called while a pass is active.
    #[error("pass {active} is still active")]
    PassAlreadyActive {
        /// The pass currently active.
        active: u32,
    },
    /// `begin_pass` was called with an id other than the next expected one.
    #[error("pass {found} begun out of sequence, expected pass {expected}")]
    PassOutOfSequence {
        /// The next pass of the frame.
        expected: u32,
        /// The requested pass.
        found: u32,
    },
    /// A subpass or pass-end call was made with no active pass.
    #[error("no pass is active")]
    NoActivePass,
    /// `begin_subpass` was called while a subpass is open.
    #[error("subpass {open} of pass {pass} is still open")]
    SubpassAlreadyOpen {
        /// The active pass.
        pass: u32,
        /// The open subpass.
        open: u32,
    },
    /// `begin_subpass` index is not below the declared subpass count.
    #[error("subpass {index} is out of range for pass {pass}, which declares {declared}")]
    SubpassOutOfRange {
        /// The active pass.
        pass: u32,
        /// The requested subpass.
        index: u32,
        /// The declared subpass count.
        declared: u32,
    },
    /// `begin_subpass` was called with an id other than the next expected one.
    #[error("subpass {found} of pass {pass} begun out of sequence, expected {expected}")]
    SubpassOutOfSequence {
        /// The active pass.
        pass: u32,
        /// The next subpass.
        expected: u32,
        /// The requested subpass.
        found: u32,
    },
    /// `end_subpass` was called with no open subpass.
    #[error("no subpass is open")]
    NoOpenSubpass,
    /// `end_pass` was called while a subpass is open.
    #[error("cannot end pass {pass} while subpass {open} is open")]
    SubpassStillOpen {
        /// The active pass.
        pass: u32,
        /// The open subpass.
        open: u32,
    },
    /// `end_pass` was called before every declared subpass was recorded.
    #[error("pass {pass} ended after {recorded} of {declared} subpasses")]
    IncompletePass {
        /// The active pass.
        pass: u32,
        /// The subpasses recorded.
        recorded: u32,
        /// The subpasses declared.
        declared: u32,
    },
    /// A frame was finished before every pass was recorded, or mid-pass.
    #[error("frame finished after {recorded} of {declared} passes")]
    IncompleteFrame {
        /// The passes recorded.
        recorded: u32,
        /// The passes declared.
        declared: u32,
    },
    /// The graph was rebuilt while a frame was being recorded.
    #[error("the pass graph cannot be rebuilt while a pass is active")]
    RebuildDuringPass,
}

/// Errors raised by the host reference kernels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// Two work items claimed the same descriptor slot.
    #[error("descriptor slot {slot} was claimed twice")]
    DuplicateDescriptor {
        /// The slot claimed twice.
        slot: u32,
    },
    /// A record references a batch beyond the descriptor array.
    #[error("batch index {batch} is out of range for {slots} descriptor slots")]
    BatchOutOfRange {
        /// The offending batch index.
        batch: u32,
        /// The descriptor slot count.
        slots: usize,
    },
}

/// The error type of every fallible draw-core operation.
#[derive(Debug, Error)]
pub enum DrawCoreError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The pass structure or attachments are malformed.
    #[error(transparent)]
    Structure(#[from] StructureError),
    /// The orchestrator was driven out of order.
    #[error(transparent)]
    State(#[from] PassStateError),
    /// A frame exceeded a pre-sized buffer.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// A host kernel detected a broken invariant.
    #[error(transparent)]
    Kernel(#[from] KernelError),
    /// A GPU resource operation failed.
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
    /// The device or the presentation surface failed; fatal for the frame.
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    /// A required device feature is missing.
    #[error("missing device feature: {0}")]
    MissingFeature(&'static str),
}
