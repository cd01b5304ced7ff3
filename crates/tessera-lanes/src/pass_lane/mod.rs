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

//! Render pass orchestration: attachments, pass structure, the pass-node
//! graph and the pass/subpass state machine.

mod attachments;
mod graph;
mod orchestrator;
mod state;
mod structure;

pub use self::attachments::{validate_attachments, AttachmentDescriptor, AttachmentKind, ClearValue};
pub use self::graph::{ColorTarget, DepthTarget, PassGraph, PassNode, SubpassNode, TargetSource};
pub use self::orchestrator::{
    FrameInputs, FrameRecorder, FrameStats, MaterialBinder, PassOrchestrator, SubpassContext,
    SubpassRecorder,
};
pub use self::state::{PassState, PassStateMachine};
pub use self::structure::{validate_structure, PassDescriptor, SubpassDescriptor};
