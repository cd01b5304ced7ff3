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

//! The compute chain: index sort, run-length compaction and indirect command
//! emission.
//!
//! The three stages run back to back in one command buffer. The end of every
//! compute pass is a full barrier, so the chain records each sort parity pass
//! and each stage as its own pass.

mod indirect_lane;
pub mod kernels;
pub mod shaders;

pub use self::indirect_lane::{ChainStrategy, DrawCount, FrameDraws, IndirectDrawLane};
