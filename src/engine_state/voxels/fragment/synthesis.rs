//! # Fragment Synthesis
//!
//! Turns a rectangular region, a [`GenerationContext`] and the edit-log entries
//! overlapping the region into a [`Fragment`].
//!
//! Synthesis is a pure function: every height, tree and cloud decision is a
//! noise sample at `(i, j, seed)`, so the same inputs give bit-identical output
//! on any thread. Workers and the collision engine therefore always agree with
//! the rendered world.
//!
//! ## Passes
//!
//! 1. Terrain: per column, a ground block at the noise height, flooded up to
//!    the horizon when below it.
//! 2. Clouds: sparse instances above the sky height (playable fragments only).
//! 3. Trees: trunks, then canopies, for every root close enough to reach the
//!    footprint. Roots are visited in `(x, z)` order.
//! 4. Edits: applied last, overriding procedural output cell by cell.
//! 5. Compaction: empty per-type lists are dropped and batches renumbered.
//!
//! A fragment holds only cells inside its own footprint. Canopies that cross
//! a fragment border are split between the neighbours, and every cell comes
//! out the same whichever fragment generates it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{BlockKey, Fragment, InstanceBatch, InstancePosition, InstanceSlot};
use crate::engine_state::settings::GenerationContext;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::block::TreeType;
use crate::engine_state::voxels::edit_log::BlockEdit;
use crate::engine_state::voxels::noise::NoiseSource;

/// Cloud noise magnitude above which a cloud instance is placed.
const CLOUD_THRESHOLD: f64 = 0.8;

/// Half-open block bounds of a synthesis request.
///
/// `x` in `[stx, edx)`, `z` in `[stz, edz)`, `y` in `[sty, edy)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub stx: i32,
    pub edx: i32,
    pub stz: i32,
    pub edz: i32,
    pub sty: i32,
    pub edy: i32,
}

impl Region {
    /// A footprint with unbounded height.
    pub fn columns(stx: i32, edx: i32, stz: i32, edz: i32) -> Self {
        Region {
            stx,
            edx,
            stz,
            edz,
            sty: i32::MIN,
            edy: i32::MAX,
        }
    }

    /// The same footprint clipped to `[sty, edy)`.
    pub fn with_height(self, sty: i32, edy: i32) -> Self {
        Region { sty, edy, ..self }
    }

    /// Whether `(x, z)` lies in the footprint.
    pub fn contains_column(&self, x: i32, z: i32) -> bool {
        (self.stx..self.edx).contains(&x) && (self.stz..self.edz).contains(&z)
    }

    /// Whether `y` lies in the height range.
    pub fn contains_y(&self, y: i32) -> bool {
        (self.sty..self.edy).contains(&y)
    }

    /// Whether the footprint has no columns.
    pub fn is_empty(&self) -> bool {
        self.stx >= self.edx || self.stz >= self.edz
    }
}

/// Procedural ground height of the column at `(x, z)`.
pub fn terrain_height<N: NoiseSource + ?Sized>(
    ctx: &GenerationContext,
    noise: &N,
    x: i32,
    z: i32,
) -> i32 {
    let gap = ctx.noise_gaps.seed_gap;
    let value = noise.noise3(x as f64 / gap, z as f64 / gap, ctx.seeds.terrain as f64);
    (value * ctx.stage.max_height as f64).floor() as i32
}

/// Builds the fragment for `region`.
///
/// `access` requests collision-only geometry: clouds are skipped, and so are
/// water and canopy fills whose block type is passable. `edits` may contain
/// entries outside the region; they are ignored.
pub fn synthesize<N: NoiseSource + ?Sized>(
    region: Region,
    ctx: &GenerationContext,
    access: bool,
    edits: &[BlockEdit],
    noise: &N,
    timestamp: u64,
) -> Fragment {
    let mut builder = FragmentBuilder::new(region);

    for i in region.stx..region.edx {
        for j in region.stz..region.edz {
            builder.column(ctx, noise, access, i, j);
            if !access {
                builder.cloud(ctx, noise, i, j);
            }
        }
    }

    let roots = tree_roots(region, ctx, noise);
    for root in &roots {
        builder.trunk(root);
    }
    for root in &roots {
        builder.canopy(ctx, noise, access, root);
    }

    for edit in edits {
        if !region.contains_column(edit.x, edit.z) || !region.contains_y(edit.y) {
            continue;
        }
        let key = BlockKey::new(edit.x, edit.y, edit.z);
        if edit.is_removal() || builder.index.contains_key(&key) {
            builder.park(key);
        }
        if let Some(block_type) = edit.block_type {
            builder.insert(block_type, key);
        }
    }

    builder.finish(timestamp)
}

/// Widest canopy radius any tree can have.
fn canopy_reach(ctx: &GenerationContext) -> i32 {
    (1.5 * ctx.stage.max_height as f64 / 3.5).ceil() as i32
}

/// A column that grows a tree.
#[derive(Copy, Clone, Debug)]
struct TreeRoot {
    x: i32,
    z: i32,
    /// Ground height under the trunk.
    ground: i32,
    /// Trunk length minus one.
    height: i32,
    tree_type: TreeType,
}

/// Every tree whose trunk or canopy may reach the footprint of `region`.
fn tree_roots<N: NoiseSource + ?Sized>(
    region: Region,
    ctx: &GenerationContext,
    noise: &N,
) -> Vec<TreeRoot> {
    let reach = canopy_reach(ctx);
    let gap = ctx.noise_gaps.tree_seed_gap;
    let seed = ctx.seeds.tree as f64;
    let max_height = ctx.stage.max_height as f64;

    let mut roots = Vec::new();
    for i in region.stx - reach..region.edx + reach {
        for j in region.stz - reach..region.edz + reach {
            let h = terrain_height(ctx, noise, i, j);
            if h < ctx.stage.horizon_height || h <= ctx.stage.tree_base_height {
                continue;
            }
            let height = (noise.noise3(i as f64 / gap, j as f64 / gap, seed) * max_height * 1.5)
                .floor() as i32;
            let parity = height.rem_euclid(2);
            if height <= 4 || parity != i.rem_euclid(3) || parity != j.rem_euclid(3) {
                continue;
            }
            roots.push(TreeRoot {
                x: i,
                z: j,
                ground: h,
                height,
                tree_type: ctx.tree_types[h.rem_euclid(ctx.tree_types.len() as i32) as usize],
            });
        }
    }
    roots
}

struct FragmentBuilder {
    region: Region,
    // Indexed by block type id until `finish`.
    lists: Vec<Vec<InstancePosition>>,
    index: HashMap<BlockKey, InstanceSlot>,
    clouds: Vec<InstancePosition>,
}

impl FragmentBuilder {
    fn new(region: Region) -> Self {
        FragmentBuilder {
            region,
            lists: vec![Vec::new(); BlockType::COUNT],
            index: HashMap::new(),
            clouds: Vec::new(),
        }
    }

    /// Adds a block unless the cell is outside the region or occupied.
    fn insert(&mut self, block_type: BlockType, key: BlockKey) {
        if !self.region.contains_column(key.x, key.z)
            || !self.region.contains_y(key.y)
            || self.index.contains_key(&key)
        {
            return;
        }
        let list = &mut self.lists[block_type.id() as usize];
        self.index.insert(
            key,
            InstanceSlot {
                temporary: false,
                instance_index: list.len(),
                type_index: block_type.id() as usize,
                block_type,
            },
        );
        list.push(InstancePosition::at(key));
    }

    fn park(&mut self, key: BlockKey) {
        if let Some(slot) = self.index.remove(&key) {
            self.lists[slot.type_index][slot.instance_index] = InstancePosition::PARKED;
        }
    }

    fn column<N: NoiseSource + ?Sized>(
        &mut self,
        ctx: &GenerationContext,
        noise: &N,
        access: bool,
        i: i32,
        j: i32,
    ) {
        let stage = ctx.stage;
        let biome = ctx.biome;
        let h = terrain_height(ctx, noise, i, j);

        if h < stage.horizon_height {
            self.insert(biome.base, BlockKey::new(i, h, j));
            if !access || !biome.water.is_passable() {
                let from = (h + 1).max(self.region.sty);
                for y in from..=stage.horizon_height {
                    self.insert(biome.water, BlockKey::new(i, y, j));
                }
            }
            return;
        }

        self.insert(biome.surface, BlockKey::new(i, h, j));
    }

    fn trunk(&mut self, root: &TreeRoot) {
        if !self.region.contains_column(root.x, root.z) {
            return;
        }
        for wl in 0..=root.height {
            self.insert(root.tree_type.trunk, BlockKey::new(root.x, root.ground + 1 + wl, root.z));
        }
    }

    fn canopy<N: NoiseSource + ?Sized>(
        &mut self,
        ctx: &GenerationContext,
        noise: &N,
        access: bool,
        root: &TreeRoot,
    ) {
        if access && root.tree_type.leaves.is_passable() {
            return;
        }
        let gap = ctx.noise_gaps.tree_seed_gap;
        let seed = ctx.seeds.tree as f64;
        let max_height = ctx.stage.max_height as f64;
        let leaves = root.tree_type.leaves;
        let (i, j) = (root.x, root.z);

        let radius = (root.height as f64 / 3.5).floor() as i32;
        let crown = root.ground + 1 + root.height;
        let lx_range = (i - radius).max(self.region.stx)..=(i + radius).min(self.region.edx - 1);
        for lx in lx_range {
            let lz_range = (j - radius).max(self.region.stz)..=(j + radius).min(self.region.edz - 1);
            for lz in lz_range {
                let sample = noise.noise3(lx as f64 / gap / 10.0, lz as f64 / gap / 10.0, seed);
                let delta_y = ((sample * max_height / 2.0).floor() as i32).abs().max(2);
                let from_y = crown - delta_y;
                let end_y = crown + delta_y;
                let perimeter =
                    lx == i - radius || lx == i + radius || lz == j - radius || lz == j + radius;
                if perimeter {
                    for ly in from_y + 1..end_y {
                        self.insert(leaves, BlockKey::new(lx, ly, lz));
                    }
                }
                self.insert(leaves, BlockKey::new(lx, from_y, lz));
                self.insert(leaves, BlockKey::new(lx, end_y, lz));
            }
        }
    }

    fn cloud<N: NoiseSource + ?Sized>(&mut self, ctx: &GenerationContext, noise: &N, i: i32, j: i32) {
        let gap = ctx.noise_gaps.cloud_seed_gap;
        let value = noise.noise3(i as f64 / gap, j as f64 / gap, ctx.seeds.cloud as f64);
        if value.abs() <= CLOUD_THRESHOLD {
            return;
        }
        let y = value * ctx.stage.max_height as f64 + ctx.stage.sky_height as f64;
        if !self.region.contains_y(y.floor() as i32) {
            return;
        }
        let region = self.region;
        self.clouds.push(InstancePosition {
            position: [
                (region.stx + (i - region.stx) * 4) as f32,
                y as f32,
                (region.stz + (j - region.stz) * 3) as f32,
            ],
        });
    }

    fn finish(self, timestamp: u64) -> Fragment {
        let FragmentBuilder {
            region,
            lists,
            mut index,
            clouds,
        } = self;

        let mut renumbered = vec![usize::MAX; lists.len()];
        let mut batches = Vec::new();
        for (id, positions) in lists.into_iter().enumerate() {
            if positions.is_empty() {
                continue;
            }
            let Some(block_type) = BlockType::from_id(id as u8) else {
                continue;
            };
            renumbered[id] = batches.len();
            batches.push(InstanceBatch {
                block_type,
                positions,
            });
        }
        for slot in index.values_mut() {
            slot.type_index = renumbered[slot.type_index];
        }

        let mut fragment = Fragment::empty(region.stx, region.stz, timestamp);
        fragment.batches = batches;
        fragment.index = index;
        fragment.clouds = clouds;
        fragment
    }
}
