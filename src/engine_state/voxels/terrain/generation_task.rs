//! # Fragment Generation Task
//!
//! The payload a worker receives and the message it sends back. A request
//! covers one sub-rectangle of the fragment grid, a whole number of fragments
//! wide and deep, and is answered with one fragment per grid cell.

use std::sync::Arc;

use crate::engine_state::settings::GenerationContext;
use crate::engine_state::task_management::task::Task;
use crate::engine_state::voxels::edit_log::BlockEdit;
use crate::engine_state::voxels::fragment::synthesis::{synthesize, Region};
use crate::engine_state::voxels::fragment::Fragment;
use crate::engine_state::voxels::noise::PerlinNoise;

/// Work order for one worker.
pub struct GenerationRequest {
    /// Dispatch time, shared by every piece of one batch.
    pub timestamp: u64,
    /// World restart counter at dispatch.
    pub generation: u64,
    /// Columns to generate. Both extents are multiples of `fragment_size`.
    pub region: Region,
    /// Fragment edge length at dispatch.
    pub fragment_size: usize,
    /// Settings frozen at dispatch.
    pub context: Arc<GenerationContext>,
    /// Copy of every edit overlapping `region`.
    pub edits: Vec<BlockEdit>,
    /// Noise source.
    pub noise: PerlinNoise,
}

/// What a worker sends back: every fragment of one request.
#[derive(Debug)]
pub struct GenerationResponse {
    /// Fragment edge length the request was made with.
    pub fragment_size: usize,
    /// World restart counter the request was made with.
    pub generation: u64,
    /// The generated fragments, in no particular order.
    pub fragments: Vec<Fragment>,
}

impl GenerationRequest {
    /// Origins of every fragment this request produces.
    pub fn fragment_origins(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let step = self.fragment_size.max(1);
        let region = self.region;
        (region.stx..region.edx)
            .step_by(step)
            .flat_map(move |x| (region.stz..region.edz).step_by(step).map(move |z| (x, z)))
    }
}

impl Task for GenerationRequest {
    type Output = GenerationResponse;

    fn process(self) -> GenerationResponse {
        let size = self.fragment_size as i32;
        let fragments = self
            .fragment_origins()
            .map(|(x, z)| {
                let region = Region::columns(x, x + size, z, z + size);
                let edits: Vec<BlockEdit> = self
                    .edits
                    .iter()
                    .filter(|edit| region.contains_column(edit.x, edit.z))
                    .copied()
                    .collect();
                synthesize(region, &self.context, false, &edits, &self.noise, self.timestamp)
            })
            .collect();
        GenerationResponse {
            fragment_size: self.fragment_size,
            generation: self.generation,
            fragments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::settings::{Seeds, WorldSettings};
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::fragment::BlockKey;

    #[test]
    fn one_fragment_per_grid_cell() {
        let settings = WorldSettings {
            seeds: Some(Seeds {
                terrain: 5,
                cloud: 6,
                tree: 7,
            }),
            biome: Some(1),
            ..WorldSettings::default()
        };
        let request = GenerationRequest {
            timestamp: 11,
            generation: 2,
            region: Region::columns(-8, 8, 0, 4),
            fragment_size: 4,
            context: GenerationContext::snapshot(&settings).unwrap(),
            edits: vec![BlockEdit::place(-3, 30, 2, BlockType::BRICK)],
            noise: PerlinNoise::new(),
        };
        let response = request.process();
        assert_eq!(response.fragment_size, 4);
        assert_eq!(response.generation, 2);
        assert_eq!(response.fragments.len(), 4);
        assert!(response.fragments.iter().all(|f| f.timestamp == 11));

        let owner = response
            .fragments
            .iter()
            .find(|f| f.origin_x == -4 && f.origin_z == 0)
            .unwrap();
        assert_eq!(owner.block_at(BlockKey::new(-3, 30, 2)), Some(BlockType::BRICK));
        let others = response.fragments.iter().filter(|f| f.origin_x != -4);
        assert!(others.into_iter().all(|f| !f.contains(BlockKey::new(-3, 30, 2))));
    }
}
