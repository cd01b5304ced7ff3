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

//! Command buffers, submissions and pass descriptors.

use super::resource::TextureViewId;

/// An opaque handle to a finished command buffer, ready for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// An opaque handle to one queue submission.
///
/// Waiting on a `SubmissionId` is the fence primitive used to bound the number
/// of frames in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

/// An RGBA color with `f64` channels, used as a clear value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
    /// Alpha channel.
    pub a: f64,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
}

/// What happens to an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    /// Clear the attachment to the given value.
    Clear(V),
    /// Keep the previous contents.
    Load,
}

/// What happens to an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Write the results to memory.
    Store,
    /// The results may be discarded.
    Discard,
}

/// A pair of load and store operations for one attachment aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    /// The load operation.
    pub load: LoadOp<V>,
    /// The store operation.
    pub store: StoreOp,
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassColorAttachment<'a> {
    /// The texture view rendered into.
    pub view: &'a TextureViewId,
    /// The color load/store operations.
    pub ops: Operations<Color>,
}

/// The depth attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassDepthStencilAttachment<'a> {
    /// The depth texture view.
    pub view: &'a TextureViewId,
    /// The depth load/store operations.
    pub depth_ops: Operations<f32>,
}

/// A descriptor for beginning a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The color attachments, in location order.
    pub color_attachments: &'a [RenderPassColorAttachment<'a>],
    /// The optional depth attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a>>,
}

/// A descriptor for beginning a compute pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputePassDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
}
