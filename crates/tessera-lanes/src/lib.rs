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

//! # Tessera Lanes
//!
//! The hot path of GPU-driven draw submission: batch assembly, the compute
//! chain turning batch records into indirect draw commands, frame pacing and
//! the render pass orchestrator that issues the draws.

#![warn(missing_docs)]

pub mod batch_lane;
pub mod compute_lane;
pub mod error;
pub mod frame_lane;
pub mod pass_lane;
pub mod submitter;

pub use batch_lane::{BatchInfo, BatchKey, BatchTable};
pub use compute_lane::{ChainStrategy, DrawCount, FrameDraws, IndirectDrawLane};
pub use error::{DrawCoreError, KernelError, PassStateError, StructureError};
pub use frame_lane::FramePacer;
pub use pass_lane::{MaterialBinder, PassOrchestrator};
pub use submitter::{DrawSubmitter, FrameReport};
