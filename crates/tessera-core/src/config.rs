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

//! Configuration of the draw-submission core.
//!
//! The configuration is a plain [`serde`] struct stored as RON:
//!
//! ```ron
//! (
//!     max_objects: 16384,
//!     frames_in_flight: 3,
//!     workgroup_size: 64,
//!     draw_count: Auto,
//!     geometry: Shared,
//! )
//! ```
//!
//! Missing fields take their [`Default`] value.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The largest workgroup size the compute shaders are compiled for.
pub const MAX_WORKGROUP_SIZE: u32 = 256;

/// The per-dimension dispatch limit guaranteed by every backend.
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// How the draw count of the indirect multi-draw is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawCountMode {
    /// Read the count from the GPU when the device allows it, otherwise fall
    /// back to the host-known count.
    #[default]
    Auto,
    /// Always read the count from the GPU-side output counter. Fails at setup
    /// on devices without `multi_draw_indexed_indirect_count`.
    Indirect,
    /// Always use the batch count known on the host when recording. Every batch
    /// holds at least one object, so this equals the GPU-side count.
    Host,
}

/// How meshes are laid out in index and vertex buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryBinding {
    /// Every mesh has its own buffers; each batch binds its buffers and draws
    /// one command. `first_index` and `base_vertex` are zero.
    #[default]
    PerMesh,
    /// All meshes share one index and one vertex buffer; a single multi-draw
    /// covers every batch and commands carry the mesh's offsets.
    Shared,
}

/// Errors raised while loading or validating a [`DrawCoreConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    /// The RON text is malformed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A field holds a value outside its valid range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables of the draw-submission core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawCoreConfig {
    /// Capacity of the per-frame object, record and command buffers.
    pub max_objects: u32,
    /// The number of frames whose GPU work may be outstanding (2 or 3).
    pub frames_in_flight: u32,
    /// The compute workgroup size of the batching shaders.
    pub workgroup_size: u32,
    /// How the multi-draw count is supplied.
    pub draw_count: DrawCountMode,
    /// How mesh geometry is bound.
    pub geometry: GeometryBinding,
}

impl Default for DrawCoreConfig {
    fn default() -> Self {
        Self {
            max_objects: 65_536,
            frames_in_flight: 2,
            workgroup_size: 64,
            draw_count: DrawCountMode::Auto,
            geometry: GeometryBinding::PerMesh,
        }
    }
}

impl DrawCoreConfig {
    /// Parses and validates a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&text)?;
        log::info!("Loaded draw core configuration from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Checks every field against its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_objects == 0 {
            return Err(ConfigError::Invalid("max_objects must be at least 1".into()));
        }
        if !(2..=3).contains(&self.frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight must be 2 or 3, got {}",
                self.frames_in_flight
            )));
        }
        if self.workgroup_size == 0 || self.workgroup_size > MAX_WORKGROUP_SIZE {
            return Err(ConfigError::Invalid(format!(
                "workgroup_size must be in 1..={MAX_WORKGROUP_SIZE}, got {}",
                self.workgroup_size
            )));
        }
        let groups = self.max_objects.div_ceil(self.workgroup_size);
        if groups > MAX_WORKGROUPS_PER_DIMENSION {
            return Err(ConfigError::Invalid(format!(
                "max_objects {} needs {groups} workgroups of {}, above the dispatch limit",
                self.max_objects, self.workgroup_size
            )));
        }
        Ok(())
    }

    /// The number of workgroups covering `items` work items.
    pub fn workgroups_for(&self, items: u32) -> u32 {
        items.div_ceil(self.workgroup_size.max(1))
    }
}
