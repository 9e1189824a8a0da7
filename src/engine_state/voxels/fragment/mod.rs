//! # Fragment Module
//!
//! A `Fragment` is the generated block data for one rectangular `(x, z)`
//! footprint of the world: one instance batch per block type present, a
//! coordinate index that maps every occupied cell to its instance, and an
//! optional batch of cloud instances.
//!
//! ## Baked and temporary blocks
//!
//! Blocks produced by synthesis are *baked* into the per-type batches. Edits
//! made while the fragment is live are not baked: a placement becomes a
//! standalone *temporary* mesh layered over the batches, and a removal parks the
//! baked instance far below the world instead of compacting the batch, so no
//! instance index ever shifts. The next regeneration of the slot bakes every
//! edit from the log and discards the temporary meshes.
//!
//! ## Invariants
//!
//! * Every occupied cell appears at most once in `index`.
//! * Parked instances are absent from `index`.
//! * `batches` holds no empty batch.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use cgmath::Point3;

use crate::engine_state::rendering::{BatchHandle, MeshHandle, Renderer};
use crate::engine_state::voxels::block::block_type::BlockType;

pub mod synthesis;

/// Y coordinate removed instances are parked at.
pub const PARKED_Y: f32 = -1_000_000.0;

/// Integer world coordinate of one block cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    /// World x.
    pub x: i32,
    /// World y.
    pub y: i32,
    /// World z.
    pub z: i32,
}

impl BlockKey {
    /// Creates a key from its components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        BlockKey { x, y, z }
    }

    /// The cell containing a world-space point (blocks are centred on integers).
    pub fn containing(point: Point3<f32>) -> Self {
        BlockKey::new(
            point.x.round() as i32,
            point.y.round() as i32,
            point.z.round() as i32,
        )
    }

    /// Centre of the cell in world space.
    pub fn center(self) -> Point3<f32> {
        Point3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

/// GPU-facing position of one instance.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstancePosition {
    /// World position of the instance centre.
    pub position: [f32; 3],
}

impl InstancePosition {
    /// Where removed instances are moved to.
    pub const PARKED: InstancePosition = InstancePosition {
        position: [0.0, PARKED_Y, 0.0],
    };

    /// Position of the block at `key`.
    pub fn at(key: BlockKey) -> Self {
        InstancePosition {
            position: [key.x as f32, key.y as f32, key.z as f32],
        }
    }

    /// Whether this instance has been parked.
    pub fn is_parked(&self) -> bool {
        self.position[1] <= PARKED_Y
    }
}

/// All instances of one block type in a fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceBatch {
    /// The block type drawn by this batch.
    pub block_type: BlockType,
    /// One position per instance, parked ones included.
    pub positions: Vec<InstancePosition>,
}

impl InstanceBatch {
    /// Number of instances, parked ones included.
    pub fn count(&self) -> usize {
        self.positions.len()
    }
}

/// Where the block at a given cell is drawn from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstanceSlot {
    /// `true` for an unbaked edit drawn as a standalone mesh.
    pub temporary: bool,
    /// Instance index in the batch, or temporary mesh index.
    pub instance_index: usize,
    /// Batch index in `Fragment::batches`. Unused for temporary slots.
    pub type_index: usize,
    /// The block occupying the cell.
    pub block_type: BlockType,
}

/// An edit rendered outside the baked batches.
#[derive(Copy, Clone, Debug, PartialEq)]
struct TemporaryMesh {
    key: BlockKey,
    block_type: BlockType,
    handle: Option<MeshHandle>,
}

/// Generated block data for one rectangular region.
#[derive(Clone, Debug)]
pub struct Fragment {
    /// Generation timestamp. Newer results replace older ones in a grid slot.
    pub timestamp: u64,
    /// Minimum x of the footprint.
    pub origin_x: i32,
    /// Minimum z of the footprint.
    pub origin_z: i32,
    /// One batch per block type present.
    pub batches: Vec<InstanceBatch>,
    /// Occupied cell to instance.
    pub index: HashMap<BlockKey, InstanceSlot>,
    /// Cloud instance positions. Empty when no cloud survived.
    pub clouds: Vec<InstancePosition>,
    temporary_meshes: Vec<Option<TemporaryMesh>>,
    batch_handles: Vec<BatchHandle>,
    cloud_handle: Option<BatchHandle>,
    uploaded: bool,
}

impl Fragment {
    /// An empty fragment with its footprint origin at `(origin_x, origin_z)`.
    pub fn empty(origin_x: i32, origin_z: i32, timestamp: u64) -> Self {
        Fragment {
            timestamp,
            origin_x,
            origin_z,
            batches: Vec::new(),
            index: HashMap::new(),
            clouds: Vec::new(),
            temporary_meshes: Vec::new(),
            batch_handles: Vec::new(),
            cloud_handle: None,
            uploaded: false,
        }
    }

    /// Number of occupied cells.
    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    /// Whether `key` is occupied.
    pub fn contains(&self, key: BlockKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Block type at `key`, baked or temporary.
    pub fn block_at(&self, key: BlockKey) -> Option<BlockType> {
        self.index.get(&key).map(|slot| slot.block_type)
    }

    /// Number of live temporary meshes.
    pub fn temporary_count(&self) -> usize {
        self.temporary_meshes.iter().flatten().count()
    }

    /// Whether drawable resources have been created for this fragment.
    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    /// Hands every batch, cloud batch and temporary mesh to the renderer.
    pub fn upload<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        if self.uploaded {
            return;
        }
        self.batch_handles = self
            .batches
            .iter()
            .map(|batch| renderer.upload_batch(batch.block_type, &batch.positions))
            .collect();
        if !self.clouds.is_empty() {
            self.cloud_handle = Some(renderer.upload_clouds(&self.clouds));
        }
        for mesh in self.temporary_meshes.iter_mut().flatten() {
            if mesh.handle.is_none() {
                mesh.handle = Some(renderer.add_mesh(mesh.block_type, InstancePosition::at(mesh.key)));
            }
        }
        self.uploaded = true;
    }

    /// Releases every drawable resource this fragment holds and empties it.
    pub fn dispose<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        for handle in self.batch_handles.drain(..) {
            renderer.dispose_batch(handle);
        }
        if let Some(handle) = self.cloud_handle.take() {
            renderer.dispose_batch(handle);
        }
        for mesh in self.temporary_meshes.iter_mut().flatten() {
            if let Some(handle) = mesh.handle.take() {
                renderer.remove_mesh(handle);
            }
        }
        self.batches.clear();
        self.index.clear();
        self.clouds.clear();
        self.temporary_meshes.clear();
        self.uploaded = false;
    }

    /// Removes the block at `key`, if any.
    ///
    /// A temporary mesh is removed outright; a baked instance is parked.
    pub fn remove_block<R: Renderer + ?Sized>(&mut self, key: BlockKey, renderer: &mut R) -> bool {
        let Some(slot) = self.index.remove(&key) else {
            return false;
        };
        if slot.temporary {
            let mesh = self
                .temporary_meshes
                .get_mut(slot.instance_index)
                .and_then(Option::take);
            if let Some(handle) = mesh.and_then(|mesh| mesh.handle) {
                renderer.remove_mesh(handle);
            }
        } else {
            if let Some(position) = self
                .batches
                .get_mut(slot.type_index)
                .and_then(|batch| batch.positions.get_mut(slot.instance_index))
            {
                *position = InstancePosition::PARKED;
            }
            if let Some(&handle) = self.batch_handles.get(slot.type_index) {
                renderer.update_instance(handle, slot.instance_index, InstancePosition::PARKED);
            }
        }
        true
    }

    /// Places `block_type` at `key` as a temporary mesh, replacing any block
    /// already there.
    pub fn place_block<R: Renderer + ?Sized>(
        &mut self,
        key: BlockKey,
        block_type: BlockType,
        renderer: &mut R,
    ) {
        self.remove_block(key, renderer);
        let handle = self
            .uploaded
            .then(|| renderer.add_mesh(block_type, InstancePosition::at(key)));
        let instance_index = self.temporary_meshes.len();
        self.temporary_meshes.push(Some(TemporaryMesh {
            key,
            block_type,
            handle,
        }));
        self.index.insert(
            key,
            InstanceSlot {
                temporary: true,
                instance_index,
                type_index: 0,
                block_type,
            },
        );
    }

    /// Whether the footprint `[origin, origin + size)` contains `(x, z)`.
    pub fn covers(&self, x: i32, z: i32, size: i32) -> bool {
        (self.origin_x..self.origin_x + size).contains(&x)
            && (self.origin_z..self.origin_z + size).contains(&z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::HeadlessRenderer;

    fn fragment_with_stone() -> Fragment {
        let mut fragment = Fragment::empty(0, 0, 1);
        let key = BlockKey::new(1, 2, 3);
        fragment.batches.push(InstanceBatch {
            block_type: BlockType::STONE,
            positions: vec![InstancePosition::at(key)],
        });
        fragment.index.insert(
            key,
            InstanceSlot {
                temporary: false,
                instance_index: 0,
                type_index: 0,
                block_type: BlockType::STONE,
            },
        );
        fragment
    }

    #[test]
    fn removal_parks_baked_instances() {
        let mut renderer = HeadlessRenderer::default();
        let mut fragment = fragment_with_stone();
        fragment.upload(&mut renderer);
        assert!(fragment.remove_block(BlockKey::new(1, 2, 3), &mut renderer));
        assert!(!fragment.contains(BlockKey::new(1, 2, 3)));
        assert!(fragment.batches[0].positions[0].is_parked());
        assert_eq!(renderer.parked_instances(), 1);
        assert!(!fragment.remove_block(BlockKey::new(1, 2, 3), &mut renderer));
    }

    #[test]
    fn placement_replaces_and_dispose_releases_everything() {
        let mut renderer = HeadlessRenderer::default();
        let mut fragment = fragment_with_stone();
        fragment.upload(&mut renderer);
        fragment.place_block(BlockKey::new(1, 2, 3), BlockType::GLASS, &mut renderer);
        fragment.place_block(BlockKey::new(1, 3, 3), BlockType::BRICK, &mut renderer);
        assert_eq!(fragment.block_at(BlockKey::new(1, 2, 3)), Some(BlockType::GLASS));
        assert_eq!(fragment.temporary_count(), 2);
        assert_eq!(renderer.live_meshes(), 2);

        fragment.remove_block(BlockKey::new(1, 3, 3), &mut renderer);
        assert_eq!(fragment.temporary_count(), 1);
        assert_eq!(renderer.live_meshes(), 1);

        fragment.dispose(&mut renderer);
        assert_eq!(renderer.live_batches(), 0);
        assert_eq!(renderer.live_meshes(), 0);
        assert_eq!(fragment.block_count(), 0);
        assert_eq!(fragment.temporary_count(), 0);
    }
}
