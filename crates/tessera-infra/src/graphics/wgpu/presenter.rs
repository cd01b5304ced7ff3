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

//! An offscreen presentation target.

use tessera_core::renderer::api::{
    Extent2D, TextureDescriptor, TextureFormat, TextureId, TextureUsage, TextureViewId,
};
use tessera_core::renderer::{GraphicsDevice, RenderError, ResourceError, SurfacePresenter};

/// Presents into a texture owned by the presenter instead of a window surface.
///
/// Used for headless runs and tests; the rendered image stays readable through
/// [`Self::texture`].
#[derive(Debug)]
pub struct OffscreenPresenter {
    texture: TextureId,
    view: TextureViewId,
    extent: Extent2D,
    format: TextureFormat,
    acquired: bool,
    presented_frames: u64,
}

impl OffscreenPresenter {
    /// Creates the target texture and its view.
    pub fn new(
        device: &dyn GraphicsDevice,
        extent: Extent2D,
        format: TextureFormat,
    ) -> Result<Self, ResourceError> {
        let (texture, view) = Self::create_target(device, extent, format)?;
        log::info!(
            "OffscreenPresenter: {}x{} {:?} target ready",
            extent.width,
            extent.height,
            format
        );
        Ok(Self {
            texture,
            view,
            extent,
            format,
            acquired: false,
            presented_frames: 0,
        })
    }

    fn create_target(
        device: &dyn GraphicsDevice,
        extent: Extent2D,
        format: TextureFormat,
    ) -> Result<(TextureId, TextureViewId), ResourceError> {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("offscreen_target".into()),
            // wgpu rejects zero-sized textures.
            size: Extent2D::new(extent.width.max(1), extent.height.max(1)),
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
        })?;
        let view = device.create_texture_view(texture)?;
        Ok((texture, view))
    }

    /// Recreates the target at a new size. The draw core must be resized too.
    pub fn resize(
        &mut self,
        device: &dyn GraphicsDevice,
        extent: Extent2D,
    ) -> Result<(), ResourceError> {
        let (texture, view) = Self::create_target(device, extent, self.format)?;
        self.destroy_target(device);
        self.texture = texture;
        self.view = view;
        self.extent = extent;
        self.acquired = false;
        Ok(())
    }

    /// The texture rendered into.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// The number of frames presented so far.
    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    /// Destroys the target texture and view.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.destroy_target(device);
    }

    fn destroy_target(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_texture_view(self.view) {
            log::warn!("OffscreenPresenter: failed to destroy view: {e}");
        }
        if let Err(e) = device.destroy_texture(self.texture) {
            log::warn!("OffscreenPresenter: failed to destroy texture: {e}");
        }
    }
}

impl SurfacePresenter for OffscreenPresenter {
    fn acquire(&mut self) -> Result<TextureViewId, RenderError> {
        if self.extent.is_empty() {
            return Err(RenderError::SurfaceAcquisitionFailed(
                "offscreen target has a zero extent".to_string(),
            ));
        }
        self.acquired = true;
        Ok(self.view)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if !self.acquired {
            return Err(RenderError::PresentationFailed(
                "present without an acquired target".to_string(),
            ));
        }
        self.acquired = false;
        self.presented_frames += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}
