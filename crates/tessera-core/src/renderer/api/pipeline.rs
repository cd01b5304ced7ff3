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

//! Shader modules, pipelines and bind groups.

use super::resource::BufferId;
use std::borrow::Cow;

/// An opaque handle to a compiled shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleId(pub usize);

/// An opaque handle to a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputePipelineId(pub usize);

/// An opaque handle to a render pipeline.
///
/// Render pipelines are owned by the material system; the draw core only
/// binds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutId(pub usize);

/// An opaque handle to a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupId(pub usize);

/// A descriptor for a WGSL shader module.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The WGSL source code.
    pub wgsl: Cow<'a, str>,
}

/// A descriptor for a compute pipeline.
///
/// The pipeline layout is derived from the shader; use
/// [`GraphicsDevice::compute_pipeline_bind_group_layout`](crate::renderer::traits::GraphicsDevice::compute_pipeline_bind_group_layout)
/// to obtain layouts for bind group creation.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The shader module holding the entry point.
    pub module: ShaderModuleId,
    /// The name of the `@compute` entry point.
    pub entry_point: &'a str,
}

bitflags::bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// The vertex stage.
        const VERTEX = 1 << 0;
        /// The fragment stage.
        const FRAGMENT = 1 << 1;
        /// The compute stage.
        const COMPUTE = 1 << 2;
    }
}

/// The kind of buffer a binding expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBindingType {
    /// A uniform buffer.
    Uniform,
    /// A storage buffer.
    Storage {
        /// If true, the buffer is read-only in the shader.
        read_only: bool,
    },
}

/// One buffer binding in a [`BindGroupLayoutDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    /// The binding index in the shader.
    pub binding: u32,
    /// The stages that can access the binding.
    pub visibility: ShaderStages,
    /// The buffer type.
    pub ty: BufferBindingType,
}

/// A descriptor for a bind group layout.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The bindings in the layout.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// One buffer bound into a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupEntry {
    /// The binding index in the shader.
    pub binding: u32,
    /// The bound buffer.
    pub buffer: BufferId,
    /// The byte offset into the buffer.
    pub offset: u64,
    /// The bound size, or `None` for the rest of the buffer.
    pub size: Option<u64>,
}

impl BindGroupEntry {
    /// Binds the whole of `buffer` at `binding`.
    pub fn whole(binding: u32, buffer: BufferId) -> Self {
        Self {
            binding,
            buffer,
            offset: 0,
            size: None,
        }
    }
}

/// A descriptor for a bind group.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The layout the bind group conforms to.
    pub layout: BindGroupLayoutId,
    /// The bound resources.
    pub entries: &'a [BindGroupEntry],
}
