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

//! # Tessera Core
//!
//! Foundational contracts of the Tessera GPU-driven draw-submission core.
//!
//! This crate holds no rendering logic. It defines the vocabulary shared by the
//! other crates: math primitives, the GPU-visible record layouts, the
//! backend-agnostic device traits, the scene collaborator interface, errors and
//! configuration. The batching and orchestration logic lives in
//! `tessera-lanes`; a concrete `wgpu` backend lives in `tessera-infra`.

#![warn(missing_docs)]

pub mod config;
pub mod math;
pub mod renderer;
pub mod scene;

pub use config::{DrawCoreConfig, DrawCountMode, GeometryBinding};
