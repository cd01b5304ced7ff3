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

//! Batch assembly: groups the frame's drawable objects by (mesh, material).
//!
//! The [`BatchTable`] is rebuilt from scratch every frame. It assigns dense
//! batch indices in encounter order and lays the instance buffer out so that
//! every batch owns one contiguous range of instance slots. The per-object
//! [`BatchRecord`]s are kept in encounter order; putting them in batch order is
//! the job of the sort stage.

use ahash::AHashMap;
use tessera_core::{
    renderer::{BatchGeometry, BatchRecord, CapacityError, DrawDescriptor, InstanceData},
    scene::{MaterialId, MeshGeometry, MeshId, Renderable, SceneSource},
    GeometryBinding,
};

/// The identity of a batch: objects with equal keys are drawn by one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    /// The mesh shared by the batch.
    pub mesh: MeshId,
    /// The material shared by the batch.
    pub material: MaterialId,
}

/// Host-side metadata of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    /// The (mesh, material) pair of the batch.
    pub key: BatchKey,
    /// Where the batch's mesh lives in its index and vertex buffers.
    pub geometry: MeshGeometry,
    /// The first instance slot of the batch.
    pub first: u32,
    /// The number of objects in the batch.
    pub count: u32,
}

/// The per-frame mapping from (mesh, material) pairs to dense batch indices.
#[derive(Debug, Default)]
pub struct BatchTable {
    lookup: AHashMap<BatchKey, u32>,
    geometry_cache: AHashMap<MeshId, Option<MeshGeometry>>,
    batches: Vec<BatchInfo>,
    records: Vec<BatchRecord>,
    instances: Vec<InstanceData>,
    skipped: usize,
}

impl BatchTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the table from the scene's active renderables.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::TooManyObjects`] if more than `capacity`
    /// objects are drawable. The table is left empty in that case.
    pub fn rebuild(
        &mut self,
        scene: &dyn SceneSource,
        capacity: u32,
    ) -> Result<(), CapacityError> {
        let renderables = scene.active_renderables();
        self.rebuild_from(&renderables, |mesh| scene.mesh_geometry(mesh), capacity)
    }

    /// Rebuilds the table from an explicit list of renderables.
    ///
    /// `geometry_of` resolves a mesh to its location in the geometry buffers;
    /// objects whose mesh it does not know are skipped like objects without a
    /// mesh.
    pub fn rebuild_from<F>(
        &mut self,
        renderables: &[Renderable],
        mut geometry_of: F,
        capacity: u32,
    ) -> Result<(), CapacityError>
    where
        F: FnMut(MeshId) -> Option<MeshGeometry>,
    {
        self.clear();

        // Pass 1: assign batch indices in encounter order and count members.
        let mut members: Vec<(u32, usize)> = Vec::with_capacity(renderables.len());
        for (position, renderable) in renderables.iter().enumerate() {
            let (mesh, material) = match (renderable.active, renderable.mesh, renderable.material) {
                (true, Some(mesh), Some(material)) => (mesh, material),
                _ => {
                    self.skipped += 1;
                    continue;
                }
            };

            let geometry = *self
                .geometry_cache
                .entry(mesh)
                .or_insert_with(|| geometry_of(mesh));
            let Some(geometry) = geometry else {
                log::debug!("Skipping object {position}: mesh {:?} is unknown", mesh);
                self.skipped += 1;
                continue;
            };

            let key = BatchKey { mesh, material };
            let next_index = self.batches.len() as u32;
            let batch_index = *self.lookup.entry(key).or_insert(next_index);
            if batch_index == next_index {
                self.batches.push(BatchInfo {
                    key,
                    geometry,
                    first: 0,
                    count: 0,
                });
            }
            self.batches[batch_index as usize].count += 1;
            members.push((batch_index, position));
        }

        if members.len() > capacity as usize {
            let requested = members.len();
            self.clear();
            return Err(CapacityError::TooManyObjects {
                requested,
                capacity: capacity as usize,
            });
        }

        // Pass 2: give every batch a contiguous range of instance slots.
        let mut next_first = 0u32;
        for batch in &mut self.batches {
            batch.first = next_first;
            next_first += batch.count;
        }

        // Pass 3: place each object in its batch's range, in encounter order.
        let mut cursors: Vec<u32> = self.batches.iter().map(|b| b.first).collect();
        self.instances
            .resize(members.len(), InstanceData { model: Default::default() });
        self.records.reserve(members.len());
        for (batch_index, position) in members {
            let slot = cursors[batch_index as usize];
            cursors[batch_index as usize] += 1;
            self.instances[slot as usize] = InstanceData {
                model: renderables[position].transform,
            };
            self.records.push(BatchRecord {
                first: slot,
                count: 1,
                index_count: self.batches[batch_index as usize].geometry.index_count,
                batch_index,
            });
        }

        log::debug!(
            "Batch table rebuilt: {} objects in {} batches, {} skipped",
            self.records.len(),
            self.batches.len(),
            self.skipped
        );
        Ok(())
    }

    fn clear(&mut self) {
        self.lookup.clear();
        self.geometry_cache.clear();
        self.batches.clear();
        self.records.clear();
        self.instances.clear();
        self.skipped = 0;
    }

    /// The per-object records, in encounter order.
    pub fn records(&self) -> &[BatchRecord] {
        &self.records
    }

    /// The per-instance data, indexed by instance slot.
    pub fn instances(&self) -> &[InstanceData] {
        &self.instances
    }

    /// The batches, indexed by batch index.
    pub fn batches(&self) -> &[BatchInfo] {
        &self.batches
    }

    /// Looks up the batch index of a (mesh, material) pair.
    pub fn batch_index(&self, key: &BatchKey) -> Option<u32> {
        self.lookup.get(key).copied()
    }

    /// The number of drawable objects.
    pub fn object_count(&self) -> u32 {
        self.records.len() as u32
    }

    /// The number of distinct batches.
    pub fn batch_count(&self) -> u32 {
        self.batches.len() as u32
    }

    /// Returns `true` if nothing is drawable this frame.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The number of renderables excluded by the last rebuild.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// The per-batch geometry read by the emission stage.
    ///
    /// In [`GeometryBinding::PerMesh`] mode each mesh has its own buffers, so
    /// the index and vertex offsets are zero.
    pub fn geometry_table(&self, binding: GeometryBinding) -> Vec<BatchGeometry> {
        self.batches
            .iter()
            .map(|batch| match binding {
                GeometryBinding::PerMesh => BatchGeometry {
                    index_count: batch.geometry.index_count,
                    ..Default::default()
                },
                GeometryBinding::Shared => BatchGeometry {
                    index_count: batch.geometry.index_count,
                    first_index: batch.geometry.first_index,
                    base_vertex: batch.geometry.base_vertex,
                    padding: 0,
                },
            })
            .collect()
    }

    /// The descriptors a correct compaction of this table produces, one per
    /// batch slot.
    pub fn expected_descriptors(&self) -> Vec<DrawDescriptor> {
        self.batches
            .iter()
            .enumerate()
            .map(|(index, batch)| DrawDescriptor {
                first: batch.first,
                count: batch.count,
                batch_index: index as u32,
                padding: 0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::math::{Mat4, Vec3};

    fn geometry(mesh: MeshId) -> Option<MeshGeometry> {
        (mesh.0 < 100).then(|| MeshGeometry {
            index_count: 36 + mesh.0 as u32,
            first_index: mesh.0 as u32 * 100,
            base_vertex: mesh.0 as i32 * 10,
        })
    }

    fn object(mesh: u64, material: u64) -> Renderable {
        Renderable::new(MeshId(mesh), MaterialId(material), Mat4::IDENTITY)
    }

    #[test]
    fn test_batches_are_assigned_in_encounter_order() {
        let mut table = BatchTable::new();
        let objects = [object(1, 1), object(2, 1), object(1, 1), object(1, 2)];
        table.rebuild_from(&objects, geometry, 16).unwrap();

        assert_eq!(table.batch_count(), 3);
        assert_eq!(table.object_count(), 4);
        let batch_indices: Vec<u32> = table.records().iter().map(|r| r.batch_index).collect();
        assert_eq!(batch_indices, vec![0, 1, 0, 2]);
        assert_eq!(
            table.batch_index(&BatchKey {
                mesh: MeshId(1),
                material: MaterialId(2)
            }),
            Some(2)
        );
    }

    #[test]
    fn test_instance_slots_are_grouped_by_batch() {
        let mut table = BatchTable::new();
        let objects = [object(1, 1), object(2, 1), object(1, 1), object(2, 1), object(1, 1)];
        table.rebuild_from(&objects, geometry, 16).unwrap();

        let firsts: Vec<u32> = table.records().iter().map(|r| r.first).collect();
        assert_eq!(firsts, vec![0, 3, 1, 4, 2]);
        assert_eq!(table.batches()[0].first, 0);
        assert_eq!(table.batches()[0].count, 3);
        assert_eq!(table.batches()[1].first, 3);
        assert_eq!(table.batches()[1].count, 2);
    }

    #[test]
    fn test_instance_data_follows_slot() {
        let mut table = BatchTable::new();
        let moved = Renderable::new(
            MeshId(2),
            MaterialId(1),
            Mat4::from_translation(Vec3::new(4.0, 5.0, 6.0)),
        );
        let objects = [moved, object(1, 1)];
        table.rebuild_from(&objects, geometry, 16).unwrap();

        let slot = table.records()[0].first as usize;
        assert_eq!(table.instances()[slot].model, moved.transform);
    }

    #[test]
    fn test_incomplete_and_inactive_objects_are_excluded() {
        let mut table = BatchTable::new();
        let mut inactive = object(1, 1);
        inactive.active = false;
        let mut no_material = object(1, 1);
        no_material.material = None;
        let mut no_mesh = object(1, 1);
        no_mesh.mesh = None;
        let unknown_mesh = object(500, 1);

        let objects = [inactive, no_material, no_mesh, unknown_mesh, object(3, 3)];
        table.rebuild_from(&objects, geometry, 16).unwrap();

        assert_eq!(table.object_count(), 1);
        assert_eq!(table.batch_count(), 1);
        assert_eq!(table.skipped(), 4);
    }

    #[test]
    fn test_capacity_overflow_is_an_error() {
        let mut table = BatchTable::new();
        let objects = vec![object(1, 1); 5];
        let err = table.rebuild_from(&objects, geometry, 4).unwrap_err();
        assert_eq!(
            err,
            CapacityError::TooManyObjects {
                requested: 5,
                capacity: 4
            }
        );
        assert!(table.is_empty());
        assert_eq!(table.batch_count(), 0);
    }

    #[test]
    fn test_rebuild_is_stateless() {
        let mut table = BatchTable::new();
        table
            .rebuild_from(&[object(1, 1), object(2, 2)], geometry, 16)
            .unwrap();
        table.rebuild_from(&[object(2, 2)], geometry, 16).unwrap();

        assert_eq!(table.batch_count(), 1);
        assert_eq!(table.batches()[0].key.mesh, MeshId(2));
        assert_eq!(table.records()[0].batch_index, 0);
    }

    #[test]
    fn test_geometry_table_modes() {
        let mut table = BatchTable::new();
        table.rebuild_from(&[object(2, 1)], geometry, 16).unwrap();

        let per_mesh = table.geometry_table(GeometryBinding::PerMesh);
        assert_eq!(per_mesh[0].index_count, 38);
        assert_eq!(per_mesh[0].first_index, 0);
        assert_eq!(per_mesh[0].base_vertex, 0);

        let shared = table.geometry_table(GeometryBinding::Shared);
        assert_eq!(shared[0].first_index, 200);
        assert_eq!(shared[0].base_vertex, 20);
    }

    #[test]
    fn test_expected_descriptors_cover_every_object() {
        let mut table = BatchTable::new();
        let objects = [object(1, 1), object(2, 1), object(1, 1)];
        table.rebuild_from(&objects, geometry, 16).unwrap();

        let descriptors = table.expected_descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors.iter().map(|d| d.count).sum::<u32>(), 3);
        assert_eq!(descriptors[1].first, 2);
        assert_eq!(descriptors[1].batch_index, 1);
    }
}
