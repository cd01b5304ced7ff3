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

use anyhow::anyhow;
use anyhow::Result;
use wgpu::{Adapter, Features, Instance};

/// Optional features the draw core takes advantage of when the adapter has them.
pub fn optional_features() -> Features {
    Features::MULTI_DRAW_INDIRECT_COUNT | Features::INDIRECT_FIRST_INSTANCE
}

/// Holds the core WGPU state objects required for rendering.
///
/// The context renders offscreen: no surface is created. It is initialized with
/// a pre-selected adapter, or picks one itself through [`Self::new_headless`].
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    #[allow(dead_code)]
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    // Store info for easy access
    pub adapter_name: String,
    pub adapter_backend: wgpu::Backend,
    pub adapter_device_type: wgpu::DeviceType,
    pub active_device_features: wgpu::Features,
    pub supports_compute: bool,
    pub device_limits: wgpu::Limits,
}

impl WgpuGraphicsContext {
    /// Asynchronously creates the logical device and queue on `adapter`.
    ///
    /// Every feature of [`optional_features`] the adapter offers is enabled.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context, or an error if device creation failed.
    pub async fn new(adapter: Adapter) -> Result<Self> {
        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let features_to_enable: Features = adapter.features() & optional_features();
        if !features_to_enable.contains(Features::MULTI_DRAW_INDIRECT_COUNT) {
            log::warn!("Adapter lacks MULTI_DRAW_INDIRECT_COUNT; draw counts come from the host");
        }

        let supports_compute = adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Tessera Logical Device"),
                required_features: features_to_enable,
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let active_device_features = device.features();
        let device_limits = device.limits();
        log::info!("Active device features: {active_device_features:?}");
        log::debug!("Device limits: {device_limits:?}");

        Ok(WgpuGraphicsContext {
            adapter,
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
            adapter_device_type: adapter_info.device_type,
            active_device_features,
            supports_compute,
            device_limits,
        })
    }

    /// Picks a high-performance adapter without a compatible surface and creates
    /// the context on it, blocking the calling thread.
    pub fn new_headless() -> Result<Self> {
        let instance = Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| anyhow!("Failed to find a suitable adapter: {}", e))?;
            Self::new(adapter).await
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
