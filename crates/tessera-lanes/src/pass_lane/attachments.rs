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

//! Attachment declarations of the pass graph.

use crate::error::StructureError;
use ahash::AHashSet;
use tessera_core::renderer::{Color, TextureFormat};

/// The role of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// A depth buffer owned by the pass graph.
    Depth,
    /// A color target owned by the pass graph.
    Color,
    /// The presentation image acquired each frame.
    Swapchain,
}

/// The value an attachment is cleared to on its first write in a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// A color clear value, for color and swapchain attachments.
    Color(Color),
    /// A depth clear value, for depth attachments.
    Depth(f32),
}

/// One attachment of the pass graph.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDescriptor {
    /// The slot subpasses refer to the attachment by.
    pub slot: u32,
    /// A debug name, also used as the texture label.
    pub name: String,
    /// The role of the attachment.
    pub kind: AttachmentKind,
    /// The pixel format.
    pub format: TextureFormat,
    /// The clear value.
    pub clear: ClearValue,
}

impl AttachmentDescriptor {
    /// A color target cleared to `clear`.
    pub fn color(slot: u32, name: impl Into<String>, format: TextureFormat, clear: Color) -> Self {
        Self {
            slot,
            name: name.into(),
            kind: AttachmentKind::Color,
            format,
            clear: ClearValue::Color(clear),
        }
    }

    /// A depth buffer cleared to `clear`.
    pub fn depth(slot: u32, name: impl Into<String>, format: TextureFormat, clear: f32) -> Self {
        Self {
            slot,
            name: name.into(),
            kind: AttachmentKind::Depth,
            format,
            clear: ClearValue::Depth(clear),
        }
    }

    /// The presentation image, cleared to `clear`.
    pub fn swapchain(slot: u32, name: impl Into<String>, format: TextureFormat, clear: Color) -> Self {
        Self {
            slot,
            name: name.into(),
            kind: AttachmentKind::Swapchain,
            format,
            clear: ClearValue::Color(clear),
        }
    }

    fn is_consistent(&self) -> bool {
        match (self.kind, self.clear) {
            (AttachmentKind::Depth, ClearValue::Depth(_)) => self.format.is_depth(),
            (AttachmentKind::Color | AttachmentKind::Swapchain, ClearValue::Color(_)) => {
                !self.format.is_depth()
            }
            _ => false,
        }
    }

    /// The color clear value, or black for a depth attachment.
    pub fn clear_color(&self) -> Color {
        match self.clear {
            ClearValue::Color(color) => color,
            ClearValue::Depth(_) => Color::BLACK,
        }
    }

    /// The depth clear value, or 1.0 for a color attachment.
    pub fn clear_depth(&self) -> f32 {
        match self.clear {
            ClearValue::Depth(depth) => depth,
            ClearValue::Color(_) => 1.0,
        }
    }
}

/// Checks an attachment list on its own.
///
/// Slots must be unique, at most one swapchain attachment may exist, and each
/// attachment's format and clear value must agree with its kind.
pub fn validate_attachments(attachments: &[AttachmentDescriptor]) -> Result<(), StructureError> {
    if attachments.is_empty() {
        return Err(StructureError::MissingAttachments);
    }

    let mut slots = AHashSet::with_capacity(attachments.len());
    let mut swapchains = 0;
    for attachment in attachments {
        if !slots.insert(attachment.slot) {
            return Err(StructureError::DuplicateAttachmentSlot {
                slot: attachment.slot,
            });
        }
        if !attachment.is_consistent() {
            return Err(StructureError::FormatMismatch {
                slot: attachment.slot,
                name: attachment.name.clone(),
            });
        }
        if attachment.kind == AttachmentKind::Swapchain {
            swapchains += 1;
        }
    }
    if swapchains > 1 {
        return Err(StructureError::MultipleSwapchains);
    }
    Ok(())
}
