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

//! Built-in compute shaders of the batching chain.
//!
//! # Available Shaders
//!
//! - [`BATCH_SORT_WGSL`] - One odd-even transposition pass over the record order
//! - [`BATCH_COMPACT_WGSL`] - Run-length compaction into per-batch descriptor slots
//! - [`BATCH_EMIT_WGSL`] - Indexed indirect command emission
//!
//! Every shader declares `const WORKGROUP_SIZE: u32 = 64u;`;
//! [`with_workgroup_size`] rewrites that line for other configured sizes.

use std::borrow::Cow;

/// Odd-even transposition sort pass. The parity comes from the `ChainParams` uniform.
pub const BATCH_SORT_WGSL: &str = include_str!("batch_sort.wgsl");

/// Run-length compaction with an atomic output counter.
///
/// Writes each run's descriptor at slot `[batch_index]`.
pub const BATCH_COMPACT_WGSL: &str = include_str!("batch_compact.wgsl");

/// Draw command emission, one work item per batch slot.
pub const BATCH_EMIT_WGSL: &str = include_str!("batch_emit.wgsl");

/// The entry point shared by every shader of the chain.
pub const ENTRY_POINT: &str = "main";

const DEFAULT_WORKGROUP_LINE: &str = "const WORKGROUP_SIZE: u32 = 64u;";

/// Returns `source` compiled for `workgroup_size` invocations per workgroup.
pub fn with_workgroup_size(source: &str, workgroup_size: u32) -> Cow<'_, str> {
    if workgroup_size == 64 {
        Cow::Borrowed(source)
    } else {
        Cow::Owned(source.replace(
            DEFAULT_WORKGROUP_LINE,
            &format!("const WORKGROUP_SIZE: u32 = {workgroup_size}u;"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shaders_are_not_empty() {
        assert!(!BATCH_SORT_WGSL.is_empty());
        assert!(!BATCH_COMPACT_WGSL.is_empty());
        assert!(!BATCH_EMIT_WGSL.is_empty());
    }

    #[test]
    fn test_shaders_have_compute_entry_point() {
        for source in [BATCH_SORT_WGSL, BATCH_COMPACT_WGSL, BATCH_EMIT_WGSL] {
            assert!(source.contains("@compute"));
            assert!(source.contains("fn main("));
            assert!(source.contains(DEFAULT_WORKGROUP_LINE));
        }
    }

    #[test]
    fn test_compaction_uses_atomic_counter() {
        assert!(BATCH_COMPACT_WGSL.contains("atomicAdd(&counter, 1u)"));
        assert!(BATCH_COMPACT_WGSL.contains("descriptors[batch]"));
    }

    #[test]
    fn test_emission_gates_on_descriptor_count_only() {
        assert!(BATCH_EMIT_WGSL.contains("if (d.count == 0u)"));
        assert!(!BATCH_EMIT_WGSL.contains("counter"));
    }

    #[test]
    fn test_workgroup_size_substitution() {
        let source = with_workgroup_size(BATCH_SORT_WGSL, 128);
        assert!(source.contains("const WORKGROUP_SIZE: u32 = 128u;"));
        assert!(!source.contains(DEFAULT_WORKGROUP_LINE));
        assert!(matches!(
            with_workgroup_size(BATCH_SORT_WGSL, 64),
            Cow::Borrowed(_)
        ));
    }
}
