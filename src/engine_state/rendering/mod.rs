//! Rendering collaborator for the voxel world.
//!
//! The world engine never draws anything itself. It hands instance batches and
//! standalone meshes to a [`Renderer`] and holds on to the returned handles so
//! it can release them when a fragment is replaced or evicted.
//!
//! [`HeadlessRenderer`] keeps the uploaded data in memory and counts what is
//! live. It backs the demo binary and makes resource discipline testable.

use std::collections::HashMap;

use log::trace;

use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::fragment::InstancePosition;

/// Opaque id of an uploaded instance batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BatchHandle(pub u64);

/// Opaque id of a standalone mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Accepts geometry from the world engine and draws it.
///
/// Every handle returned must stay valid until it is passed back to
/// [`dispose_batch`](Renderer::dispose_batch) or
/// [`remove_mesh`](Renderer::remove_mesh).
pub trait Renderer {
    /// Uploads one instanced batch of `block_type`.
    fn upload_batch(&mut self, block_type: BlockType, positions: &[InstancePosition]) -> BatchHandle;

    /// Uploads the cloud instances of a fragment.
    fn upload_clouds(&mut self, positions: &[InstancePosition]) -> BatchHandle;

    /// Moves one instance of an uploaded batch.
    fn update_instance(&mut self, batch: BatchHandle, index: usize, position: InstancePosition);

    /// Releases an uploaded batch.
    fn dispose_batch(&mut self, batch: BatchHandle);

    /// Adds a standalone single-block mesh.
    fn add_mesh(&mut self, block_type: BlockType, position: InstancePosition) -> MeshHandle;

    /// Removes a standalone mesh.
    fn remove_mesh(&mut self, mesh: MeshHandle);
}

#[derive(Clone, Debug)]
struct StoredBatch {
    block_type: Option<BlockType>,
    positions: Vec<InstancePosition>,
}

/// An in-memory renderer that draws nothing.
#[derive(Default, Debug)]
pub struct HeadlessRenderer {
    next_id: u64,
    batches: HashMap<u64, StoredBatch>,
    meshes: HashMap<u64, (BlockType, InstancePosition)>,
    bytes_uploaded: usize,
}

impl HeadlessRenderer {
    /// Creates an empty renderer.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn store(&mut self, block_type: Option<BlockType>, positions: &[InstancePosition]) -> u64 {
        let id = self.allocate_id();
        self.bytes_uploaded += bytemuck::cast_slice::<InstancePosition, u8>(positions).len();
        self.batches.insert(
            id,
            StoredBatch {
                block_type,
                positions: positions.to_vec(),
            },
        );
        id
    }

    /// Number of batches (clouds included) not yet disposed.
    pub fn live_batches(&self) -> usize {
        self.batches.len()
    }

    /// Number of standalone meshes not yet removed.
    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Number of live block instances, parked ones excluded.
    pub fn visible_instances(&self) -> usize {
        self.batches
            .values()
            .filter(|batch| batch.block_type.is_some())
            .flat_map(|batch| batch.positions.iter())
            .filter(|position| !position.is_parked())
            .count()
    }

    /// Number of parked instances in live batches.
    pub fn parked_instances(&self) -> usize {
        self.batches
            .values()
            .flat_map(|batch| batch.positions.iter())
            .filter(|position| position.is_parked())
            .count()
    }

    /// Total bytes of instance data ever uploaded.
    pub fn bytes_uploaded(&self) -> usize {
        self.bytes_uploaded
    }
}

impl Renderer for HeadlessRenderer {
    fn upload_batch(&mut self, block_type: BlockType, positions: &[InstancePosition]) -> BatchHandle {
        BatchHandle(self.store(Some(block_type), positions))
    }

    fn upload_clouds(&mut self, positions: &[InstancePosition]) -> BatchHandle {
        BatchHandle(self.store(None, positions))
    }

    fn update_instance(&mut self, batch: BatchHandle, index: usize, position: InstancePosition) {
        if let Some(slot) = self
            .batches
            .get_mut(&batch.0)
            .and_then(|stored| stored.positions.get_mut(index))
        {
            *slot = position;
        }
    }

    fn dispose_batch(&mut self, batch: BatchHandle) {
        if self.batches.remove(&batch.0).is_none() {
            trace!("Disposing unknown batch {:?}", batch);
        }
    }

    fn add_mesh(&mut self, block_type: BlockType, position: InstancePosition) -> MeshHandle {
        let id = self.allocate_id();
        self.meshes.insert(id, (block_type, position));
        MeshHandle(id)
    }

    fn remove_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::fragment::BlockKey;

    #[test]
    fn counts_live_resources() {
        let mut renderer = HeadlessRenderer::new();
        let positions = [
            InstancePosition::at(BlockKey::new(0, 0, 0)),
            InstancePosition::at(BlockKey::new(1, 0, 0)),
        ];
        let batch = renderer.upload_batch(BlockType::DIRT, &positions);
        let clouds = renderer.upload_clouds(&positions[..1]);
        let mesh = renderer.add_mesh(BlockType::GLASS, positions[0]);
        assert_eq!(renderer.live_batches(), 2);
        assert_eq!(renderer.visible_instances(), 2);
        assert_eq!(renderer.bytes_uploaded(), 3 * 12);

        renderer.update_instance(batch, 1, InstancePosition::PARKED);
        assert_eq!(renderer.visible_instances(), 1);
        assert_eq!(renderer.parked_instances(), 1);

        renderer.dispose_batch(batch);
        renderer.dispose_batch(clouds);
        renderer.remove_mesh(mesh);
        assert_eq!(renderer.live_batches(), 0);
        assert_eq!(renderer.live_meshes(), 0);
    }
}
