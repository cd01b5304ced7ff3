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

//! Backend-agnostic data types of the rendering API.

pub mod command;
pub mod indirect;
pub mod pipeline;
pub mod resource;
pub mod uniform_ring_buffer;

pub use self::command::*;
pub use self::indirect::*;
pub use self::pipeline::*;
pub use self::resource::*;
pub use self::uniform_ring_buffer::UniformRingBuffer;

/// Optional device capabilities the draw core adapts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFeature {
    /// `multi_draw_indexed_indirect_count`: the draw count is read from a GPU buffer.
    MultiDrawIndirectCount,
    /// Indirect draws may use a non-zero `first_instance`.
    IndirectFirstInstance,
    /// Compute shaders with storage buffers and atomics.
    Compute,
}
