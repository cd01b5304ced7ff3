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

//! The rebuildable pass-node graph.
//!
//! A [`PassGraph`] is derived entirely from the attachment list, the pass
//! structure and the target extent. It owns the textures of every depth and
//! color attachment. Resizing destroys the graph and builds a new one; nothing
//! is patched in place.

use super::attachments::{AttachmentDescriptor, AttachmentKind};
use super::structure::PassDescriptor;
use crate::error::DrawCoreError;
use ahash::AHashMap;
use std::borrow::Cow;
use tessera_core::renderer::{
    Color, Extent2D, GraphicsDevice, LoadOp, ResourceError, TextureDescriptor, TextureId,
    TextureUsage, TextureViewId,
};

/// Where a subpass target's image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    /// A texture owned by the graph.
    Owned(TextureViewId),
    /// The presentation image of the current frame.
    Swapchain,
}

/// A color target of a subpass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTarget {
    /// The attachment slot.
    pub slot: u32,
    /// The image rendered into.
    pub source: TargetSource,
    /// `Clear` on the attachment's first write in the pass, `Load` after.
    pub load: LoadOp<Color>,
}

/// The depth target of a subpass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTarget {
    /// The attachment slot.
    pub slot: u32,
    /// The depth view.
    pub view: TextureViewId,
    /// `Clear` on the attachment's first write in the pass, `Load` after.
    pub load: LoadOp<f32>,
}

/// A subpass node with its resolved targets.
#[derive(Debug, Clone, PartialEq)]
pub struct SubpassNode {
    /// The subpass id.
    pub id: u32,
    /// The color targets, in declaration order.
    pub colors: Vec<ColorTarget>,
    /// The depth target, if the subpass writes one.
    pub depth: Option<DepthTarget>,
    /// Views of the attachments the subpass samples.
    pub inputs: Vec<TextureViewId>,
}

/// A pass node: its subpasses in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct PassNode {
    /// The pass id.
    pub id: u32,
    /// The subpass nodes.
    pub subpasses: Vec<SubpassNode>,
}

#[derive(Debug, Clone, Copy)]
struct OwnedAttachment {
    texture: TextureId,
    view: TextureViewId,
}

/// The pass nodes plus the attachment textures they render into.
#[derive(Debug)]
pub struct PassGraph {
    passes: Vec<PassNode>,
    owned: AHashMap<u32, OwnedAttachment>,
    extent: Extent2D,
}

impl PassGraph {
    /// Builds the graph for an already validated structure.
    ///
    /// On failure every texture created so far is destroyed again.
    pub fn build(
        device: &dyn GraphicsDevice,
        attachments: &[AttachmentDescriptor],
        passes: &[PassDescriptor],
        extent: Extent2D,
    ) -> Result<Self, DrawCoreError> {
        let mut graph = Self {
            passes: Vec::with_capacity(passes.len()),
            owned: AHashMap::new(),
            extent,
        };
        if let Err(e) = graph.populate(device, attachments, passes) {
            graph.destroy(device);
            return Err(e);
        }
        log::info!(
            "Pass graph built: {} passes, {} owned attachments at {}x{}",
            graph.passes.len(),
            graph.owned.len(),
            extent.width,
            extent.height
        );
        Ok(graph)
    }

    fn populate(
        &mut self,
        device: &dyn GraphicsDevice,
        attachments: &[AttachmentDescriptor],
        passes: &[PassDescriptor],
    ) -> Result<(), DrawCoreError> {
        for attachment in attachments {
            if attachment.kind == AttachmentKind::Swapchain {
                continue;
            }
            let texture = device.create_texture(&TextureDescriptor {
                label: Some(Cow::Borrowed(attachment.name.as_str())),
                size: self.extent,
                format: attachment.format,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            })?;
            let view = match device.create_texture_view(texture) {
                Ok(view) => view,
                Err(e) => {
                    let _ = device.destroy_texture(texture);
                    return Err(e.into());
                }
            };
            self.owned.insert(attachment.slot, OwnedAttachment { texture, view });
        }

        let by_slot: AHashMap<u32, &AttachmentDescriptor> =
            attachments.iter().map(|a| (a.slot, a)).collect();

        for pass in passes {
            let mut written: Vec<u32> = Vec::new();
            let mut subpasses = Vec::with_capacity(pass.subpasses.len());
            for subpass in &pass.subpasses {
                let mut node = SubpassNode {
                    id: subpass.id,
                    colors: Vec::new(),
                    depth: None,
                    inputs: Vec::new(),
                };
                for &slot in &subpass.writes {
                    let Some(attachment) = by_slot.get(&slot) else {
                        continue;
                    };
                    let first_write = !written.contains(&slot);
                    if first_write {
                        written.push(slot);
                    }
                    match attachment.kind {
                        AttachmentKind::Depth => {
                            let view = self.owned_view(slot)?;
                            node.depth = Some(DepthTarget {
                                slot,
                                view,
                                load: if first_write {
                                    LoadOp::Clear(attachment.clear_depth())
                                } else {
                                    LoadOp::Load
                                },
                            });
                        }
                        AttachmentKind::Color | AttachmentKind::Swapchain => {
                            let source = if attachment.kind == AttachmentKind::Swapchain {
                                TargetSource::Swapchain
                            } else {
                                TargetSource::Owned(self.owned_view(slot)?)
                            };
                            node.colors.push(ColorTarget {
                                slot,
                                source,
                                load: if first_write {
                                    LoadOp::Clear(attachment.clear_color())
                                } else {
                                    LoadOp::Load
                                },
                            });
                        }
                    }
                }
                for &slot in &subpass.reads {
                    node.inputs.push(self.owned_view(slot)?);
                }
                subpasses.push(node);
            }
            self.passes.push(PassNode {
                id: pass.id,
                subpasses,
            });
        }
        Ok(())
    }

    fn owned_view(&self, slot: u32) -> Result<TextureViewId, DrawCoreError> {
        self.owned
            .get(&slot)
            .map(|a| a.view)
            .ok_or(DrawCoreError::Resource(ResourceError::NotFound))
    }

    /// The pass nodes.
    pub fn passes(&self) -> &[PassNode] {
        &self.passes
    }

    /// Looks up a subpass node.
    pub fn subpass(&self, pass: u32, subpass: u32) -> Option<&SubpassNode> {
        self.passes
            .get(pass as usize)
            .and_then(|p| p.subpasses.get(subpass as usize))
    }

    /// The subpass count of each pass, for the state machine.
    pub fn subpass_counts(&self) -> Vec<u32> {
        self.passes
            .iter()
            .map(|p| p.subpasses.len() as u32)
            .collect()
    }

    /// The view of a graph-owned attachment.
    pub fn attachment_view(&self, slot: u32) -> Option<TextureViewId> {
        self.owned.get(&slot).map(|a| a.view)
    }

    /// The extent the attachments were created at.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Destroys every texture owned by the graph.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for (slot, attachment) in self.owned.drain() {
            if let Err(e) = device.destroy_texture_view(attachment.view) {
                log::warn!("PassGraph: Failed to destroy view of attachment {slot}: {:?}", e);
            }
            if let Err(e) = device.destroy_texture(attachment.texture) {
                log::warn!("PassGraph: Failed to destroy attachment {slot}: {:?}", e);
            }
        }
        self.passes.clear();
    }
}
