//! # Terrain Streaming
//!
//! `Terrain` owns the fragment grid around the player and everything needed to
//! keep it populated: the worker pool, the noise source and the renderer the
//! fragments are drawn with.
//!
//! ## Fragment grid
//!
//! The grid is `fragment_size × fragment_size` fragments of `fragment_size²`
//! columns each, centred on `origin`. It is toroidal: a world column maps to
//! slot `((x + half) mod fragment_size²) / fragment_size` on each axis, so a
//! fragment leaving the window on one side is replaced in place by the one
//! entering on the other.
//!
//! ```text
//!           window_start            origin           window_end
//!  behind  |    |    |    |    |    |    |    |    |    |  ahead
//!   line   |<------------- fragment_size² ------------->|  line
//! ```
//!
//! ## Streaming
//!
//! When the player is more than one fragment past `origin` along an axis, the
//! origin shifts by one fragment and only the newly exposed line is requested.
//! Workers answer in any order; a result is installed only when it is still
//! inside the window and not older than what its slot already shows.
//!
//! ## Edits on live fragments
//!
//! Edits are drawn immediately as temporary meshes (or parked instances) on
//! the fragment that covers them. Edits made while a regeneration of that
//! fragment is in flight are replayed onto the result when it is installed,
//! since its edit-log slice was copied before they happened.

use std::sync::Arc;

use cgmath::Point3;
use log::{debug, info, trace};
use web_time::Instant;

use crate::engine_state::rendering::Renderer;
use crate::engine_state::settings::{GenerationContext, WorldSettings};
use crate::engine_state::task_management::TaskManager;
use crate::engine_state::voxels::block::block_type::BlockType;
use crate::engine_state::voxels::edit_log::{BlockEdit, EditLog};
use crate::engine_state::voxels::fragment::synthesis::{terrain_height, Region};
use crate::engine_state::voxels::fragment::{BlockKey, Fragment};
use crate::engine_state::voxels::noise::PerlinNoise;
use crate::error::WorldResult;

pub mod generation_task;

use generation_task::{GenerationRequest, GenerationResponse};

/// Lifecycle of one grid slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing requested yet.
    Empty,
    /// A request covering the slot is in flight.
    Generating,
    /// A fragment is installed and nothing newer is pending.
    Live,
}

#[derive(Debug, Default)]
struct GridSlot {
    fragment: Option<Fragment>,
    // Timestamp of the newest request covering this slot, until answered.
    pending: Option<u64>,
}

/// The chunk streaming coordinator.
pub struct Terrain<R: Renderer> {
    renderer: R,
    task_manager: TaskManager<GenerationRequest>,
    noise: PerlinNoise,
    context: Option<Arc<GenerationContext>>,
    fragment_size: i32,
    origin_x: i32,
    origin_z: i32,
    grid: Vec<GridSlot>,
    generation: u64,
    epoch: Instant,
    last_timestamp: u64,
    recent_edits: Vec<(u64, BlockEdit)>,
}

impl<R: Renderer> Terrain<R> {
    /// Creates an idle coordinator with `threads` workers. Nothing is generated
    /// until [`update_state`](Self::update_state) succeeds.
    pub fn new(renderer: R, threads: usize) -> WorldResult<Self> {
        Ok(Terrain {
            renderer,
            task_manager: TaskManager::new(threads)?,
            noise: PerlinNoise::new(),
            context: None,
            fragment_size: 0,
            origin_x: 0,
            origin_z: 0,
            grid: Vec::new(),
            generation: 0,
            epoch: Instant::now(),
            last_timestamp: 0,
            recent_edits: Vec::new(),
        })
    }

    /// The renderer fragments are drawn with.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Mutable access to the renderer.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// The settings snapshot of the running world, if started.
    pub fn context(&self) -> Option<&Arc<GenerationContext>> {
        self.context.as_ref()
    }

    /// The noise source every fragment is generated from.
    pub fn noise(&self) -> &PerlinNoise {
        &self.noise
    }

    /// Fragment edge length. Zero before the world is started.
    pub fn fragment_size(&self) -> usize {
        self.fragment_size as usize
    }

    /// Current grid centre.
    pub fn origin(&self) -> (i32, i32) {
        (self.origin_x, self.origin_z)
    }

    /// World restart counter. Results from earlier generations are dropped.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of synthesis workers.
    pub fn worker_count(&self) -> usize {
        self.task_manager.worker_count()
    }

    /// Whether no generation request is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.task_manager.is_idle()
    }

    /// Resizes the worker pool. In-flight results of removed workers are lost;
    /// the next streaming trigger supersedes them.
    pub fn set_worker_count(&mut self, threads: usize) -> WorldResult<()> {
        self.task_manager.set_worker_count(threads)
    }

    /// Restarts the world from `settings`.
    ///
    /// Disposes every fragment, re-centres the grid on the player and requests
    /// the whole grid.
    ///
    /// # Returns
    /// `Ok(false)` without requesting anything while seeds or biome are unset.
    pub fn update_state(&mut self, settings: &WorldSettings, log: &mut EditLog) -> WorldResult<bool> {
        self.clear();
        let Some(context) = GenerationContext::snapshot(settings) else {
            info!("World settings have no seeds or biome yet, not generating");
            return Ok(false);
        };
        self.task_manager.set_worker_count(settings.threads)?;

        let size = settings.fragment_size() as i32;
        let [x, _, z] = settings.player_position;
        self.fragment_size = size;
        self.origin_x = (x / size as f32).floor() as i32 * size;
        self.origin_z = (z / size as f32).floor() as i32 * size;
        self.grid = (0..size * size).map(|_| GridSlot::default()).collect();
        self.context = Some(context);
        info!(
            "Starting world: fragment size {}, origin ({}, {}), {} workers",
            size,
            self.origin_x,
            self.origin_z,
            self.task_manager.worker_count()
        );

        self.try_update_all(log);
        Ok(true)
    }

    /// Disposes every fragment and forgets the running world.
    pub fn clear(&mut self) {
        for slot in &mut self.grid {
            if let Some(mut fragment) = slot.fragment.take() {
                fragment.dispose(&mut self.renderer);
            }
        }
        self.grid.clear();
        self.context = None;
        self.fragment_size = 0;
        self.recent_edits.clear();
        self.generation += 1;
    }

    fn half_extent(&self) -> i32 {
        self.fragment_size * self.fragment_size / 2
    }

    fn window(&self, origin: i32) -> (i32, i32) {
        let start = origin - self.half_extent();
        (start, start + self.fragment_size * self.fragment_size)
    }

    /// Whether the fragment at `(x, z)` lies inside the current window.
    pub fn in_window(&self, x: i32, z: i32) -> bool {
        let (stx, edx) = self.window(self.origin_x);
        let (stz, edz) = self.window(self.origin_z);
        self.fragment_size > 0 && (stx..edx).contains(&x) && (stz..edz).contains(&z)
    }

    /// Grid slot `(x, z)` the world column `(x, z)` maps to.
    pub fn fragment_index(&self, x: i32, z: i32) -> Option<(usize, usize)> {
        if self.fragment_size == 0 {
            return None;
        }
        let size = self.fragment_size;
        let half = self.half_extent();
        let axis = |v: i32| ((v + half).rem_euclid(size * size) / size) as usize;
        Some((axis(x), axis(z)))
    }

    fn slot_index(&self, x: i32, z: i32) -> Option<usize> {
        let (ix, iz) = self.fragment_index(x, z)?;
        Some(iz * self.fragment_size as usize + ix)
    }

    /// Lifecycle state of the slot covering column `(x, z)`.
    pub fn slot_state(&self, x: i32, z: i32) -> SlotState {
        let Some(slot) = self.slot_index(x, z).and_then(|idx| self.grid.get(idx)) else {
            return SlotState::Empty;
        };
        match (&slot.fragment, slot.pending) {
            (_, Some(_)) => SlotState::Generating,
            (Some(_), None) => SlotState::Live,
            (None, None) => SlotState::Empty,
        }
    }

    /// The live fragment covering column `(x, z)`.
    pub fn fragment_at(&self, x: i32, z: i32) -> Option<&Fragment> {
        let idx = self.slot_index(x, z)?;
        let size = self.fragment_size;
        self.grid[idx]
            .fragment
            .as_ref()
            .filter(|fragment| fragment.covers(x, z, size))
    }

    /// Every installed fragment.
    pub fn live_fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.grid.iter().filter_map(|slot| slot.fragment.as_ref())
    }

    /// Procedural ground height at `(x, z)`. Zero before the world starts.
    pub fn floor_height(&self, x: i32, z: i32) -> i32 {
        match &self.context {
            Some(context) => terrain_height(context, &self.noise, x, z),
            None => 0,
        }
    }

    /// Whether a live fragment shows a block at `(x, y, z)`.
    pub fn has_block(&self, x: i32, y: i32, z: i32) -> bool {
        self.fragment_at(x, z)
            .is_some_and(|fragment| fragment.contains(BlockKey::new(x, y, z)))
    }

    fn next_timestamp(&mut self) -> u64 {
        let now = self.epoch.elapsed().as_micros() as u64 + 1;
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    /// Requests the whole grid, split across the workers along Z.
    pub fn try_update_all(&mut self, log: &mut EditLog) -> bool {
        let (stx, edx) = self.window(self.origin_x);
        let (stz, edz) = self.window(self.origin_z);
        self.dispatch(Region::columns(stx, edx, stz, edz), false, log)
    }

    /// Shifts the window after the player and requests the exposed lines.
    ///
    /// Z is handled before X, and each axis moves at most one fragment per
    /// call.
    ///
    /// # Returns
    /// Whether the origin moved.
    pub fn try_update_scene(&mut self, position: Point3<f32>, log: &mut EditLog) -> bool {
        if self.context.is_none() {
            return false;
        }
        let size = self.fragment_size;
        let mut shifted = false;

        if (position.z - self.origin_z as f32).abs() > size as f32 {
            let (stz, edz) = self.window(self.origin_z);
            let line = if position.z < self.origin_z as f32 {
                self.origin_z -= size;
                (stz - size, stz)
            } else {
                self.origin_z += size;
                (edz, edz + size)
            };
            let (stx, edx) = self.window(self.origin_x);
            debug!("Origin shifted to z = {}", self.origin_z);
            self.dispatch(Region::columns(stx, edx, line.0, line.1), true, log);
            shifted = true;
        }

        if (position.x - self.origin_x as f32).abs() > size as f32 {
            let (stx, edx) = self.window(self.origin_x);
            let line = if position.x < self.origin_x as f32 {
                self.origin_x -= size;
                (stx - size, stx)
            } else {
                self.origin_x += size;
                (edx, edx + size)
            };
            let (stz, edz) = self.window(self.origin_z);
            debug!("Origin shifted to x = {}", self.origin_x);
            self.dispatch(Region::columns(line.0, line.1, stz, edz), false, log);
            shifted = true;
        }

        shifted
    }

    /// Splits `region` into one piece per worker and publishes them.
    fn dispatch(&mut self, region: Region, split_along_x: bool, log: &mut EditLog) -> bool {
        let Some(context) = self.context.clone() else {
            return false;
        };
        let size = self.fragment_size;
        let timestamp = self.next_timestamp();
        let threads = self.task_manager.worker_count().max(1) as i32;
        let (start, end) = if split_along_x {
            (region.stx, region.edx)
        } else {
            (region.stz, region.edz)
        };
        let count = (end - start) / size;

        let mut current = 0;
        for i in 0..threads {
            let next = (i + 1) * count / threads;
            let piece_start = start + current * size;
            let piece_end = if i == threads - 1 { end } else { start + next * size };
            current = next;
            if piece_start >= piece_end {
                continue;
            }

            let piece = if split_along_x {
                Region::columns(piece_start, piece_end, region.stz, region.edz)
            } else {
                Region::columns(region.stx, region.edx, piece_start, piece_end)
            };
            let edits = log.query_area(piece.stx, piece.edx - 1, piece.stz, piece.edz - 1);
            let request = GenerationRequest {
                timestamp,
                generation: self.generation,
                region: piece,
                fragment_size: size as usize,
                context: Arc::clone(&context),
                edits,
                noise: self.noise.clone(),
            };
            for (x, z) in request.fragment_origins() {
                if let Some(idx) = self.slot_index(x, z) {
                    self.grid[idx].pending = Some(timestamp);
                }
            }
            trace!(
                "Dispatching x [{}, {}) z [{}, {}) with {} edits",
                piece.stx,
                piece.edx,
                piece.stz,
                piece.edz,
                request.edits.len()
            );
            self.task_manager.publish_task(request);
        }
        true
    }

    /// Installs the fragments of one worker response.
    ///
    /// # Returns
    /// The number of fragments installed.
    pub fn on_update_line(&mut self, response: GenerationResponse) -> usize {
        if response.generation != self.generation
            || response.fragment_size != self.fragment_size as usize
        {
            debug!(
                "Discarding {} fragment(s) generated for another grid",
                response.fragments.len()
            );
            return 0;
        }

        let size = self.fragment_size;
        let mut installed = 0;
        for mut fragment in response.fragments {
            let (x, z) = (fragment.origin_x, fragment.origin_z);
            if !self.in_window(x, z) {
                debug!("Discarding fragment ({}, {}) outside the window", x, z);
                continue;
            }
            let Some(idx) = self.slot_index(x, z) else {
                continue;
            };
            let slot = &mut self.grid[idx];
            if let Some(old) = &slot.fragment {
                if fragment.timestamp < old.timestamp {
                    debug!("Discarding stale fragment ({}, {})", x, z);
                    continue;
                }
            }
            if let Some(mut old) = slot.fragment.take() {
                old.dispose(&mut self.renderer);
            }
            fragment.upload(&mut self.renderer);
            for (stamp, edit) in &self.recent_edits {
                if *stamp > fragment.timestamp && fragment.covers(edit.x, edit.z, size) {
                    apply_to_fragment(&mut fragment, edit, &mut self.renderer);
                }
            }
            if slot.pending.is_some_and(|pending| pending <= fragment.timestamp) {
                slot.pending = None;
            }
            slot.fragment = Some(fragment);
            installed += 1;
        }
        installed
    }

    /// Hands queued requests to free workers and installs finished results.
    ///
    /// # Returns
    /// The number of fragments installed.
    pub fn process_tasks(&mut self) -> usize {
        self.task_manager.process_queued_tasks();
        let mut installed = 0;
        for response in self.task_manager.process_completed_tasks() {
            installed += self.on_update_line(response);
        }
        if self.task_manager.is_idle() {
            self.recent_edits.clear();
        }
        installed
    }

    /// Blocks until every request is answered or `timeout` passes, installing
    /// results as they arrive.
    pub fn wait_until_idle(&mut self, timeout: web_time::Duration) -> usize {
        let mut installed = 0;
        for response in self.task_manager.wait_until_idle(timeout) {
            installed += self.on_update_line(response);
        }
        installed
    }

    /// Draws `edit` on the live fragment covering it.
    ///
    /// # Returns
    /// Whether a live fragment covered the edit.
    pub fn apply_edit(&mut self, edit: &BlockEdit) -> bool {
        if !self.task_manager.is_idle() {
            let stamp = self.next_timestamp();
            self.recent_edits.push((stamp, *edit));
        }
        let idx = match self.slot_index(edit.x, edit.z) {
            Some(idx) => idx,
            None => return false,
        };
        let size = self.fragment_size;
        match self.grid[idx].fragment.as_mut() {
            Some(fragment) if fragment.covers(edit.x, edit.z, size) => {
                apply_to_fragment(fragment, edit, &mut self.renderer);
                true
            }
            _ => false,
        }
    }

    /// Shows `block_type` at `(x, y, z)` as a temporary mesh.
    pub fn place_block(&mut self, x: i32, y: i32, z: i32, block_type: BlockType) -> bool {
        self.apply_edit(&BlockEdit::place(x, y, z, block_type))
    }

    /// Hides whatever block is shown at `(x, y, z)`.
    pub fn remove_block(&mut self, x: i32, y: i32, z: i32) -> bool {
        self.apply_edit(&BlockEdit::remove(x, y, z))
    }

    /// Back-fills the ground around a removed block.
    ///
    /// Each of the six neighbours of `(x, y, z)` that lies below the procedural
    /// surface, has no edit and shows no block gets a `base` block edit, so
    /// digging never opens a hollow under the terrain.
    ///
    /// # Returns
    /// The edits inserted into `log` (already drawn).
    pub fn check_remove_floor(&mut self, x: i32, y: i32, z: i32, log: &mut EditLog) -> Vec<BlockEdit> {
        let Some(base) = self.context.as_ref().map(|context| context.biome.base) else {
            return Vec::new();
        };
        let neighbours = [
            (x + 1, y, z),
            (x - 1, y, z),
            (x, y, z + 1),
            (x, y, z - 1),
            (x, y - 1, z),
            (x, y + 1, z),
        ];
        let mut inserted = Vec::new();
        for (nx, ny, nz) in neighbours {
            if self.floor_height(nx, nz) <= ny
                || log.query(nx, ny, nz).is_some()
                || self.has_block(nx, ny, nz)
            {
                continue;
            }
            let edit = BlockEdit::place(nx, ny, nz, base);
            log.insert(edit);
            self.apply_edit(&edit);
            inserted.push(edit);
        }
        inserted
    }
}

fn apply_to_fragment<R: Renderer + ?Sized>(fragment: &mut Fragment, edit: &BlockEdit, renderer: &mut R) {
    let key = BlockKey::new(edit.x, edit.y, edit.z);
    match edit.block_type {
        Some(block_type) => fragment.place_block(key, block_type, renderer),
        None => {
            fragment.remove_block(key, renderer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::HeadlessRenderer;

    fn started(stage_size: usize, threads: usize) -> Terrain<HeadlessRenderer> {
        let mut terrain = Terrain::new(HeadlessRenderer::new(), 0).unwrap();
        let settings = WorldSettings {
            seeds: Some(crate::engine_state::settings::Seeds {
                terrain: 1,
                cloud: 1,
                tree: 1,
            }),
            biome: Some(1),
            stage_size,
            threads,
            player_position: [0.0, 30.0, 0.0],
            ..WorldSettings::default()
        };
        let mut log = EditLog::new();
        assert!(terrain.update_state(&settings, &mut log).unwrap());
        terrain
    }

    #[test]
    fn refuses_to_start_without_seeds() {
        let mut terrain = Terrain::new(HeadlessRenderer::new(), 1).unwrap();
        let mut log = EditLog::new();
        assert!(!terrain.update_state(&WorldSettings::default(), &mut log).unwrap());
        assert!(!terrain.try_update_all(&mut log));
        assert!(!terrain.try_update_scene(Point3::new(100.0, 0.0, 0.0), &mut log));
        assert_eq!(terrain.fragment_index(0, 0), None);
        assert_eq!(terrain.floor_height(3, 3), 0);
    }

    #[test]
    fn columns_map_onto_the_torus() {
        let terrain = started(16, 0);
        // Fragment size 4, window [-8, 8) on both axes.
        assert_eq!(terrain.fragment_index(-8, -8), Some((0, 0)));
        assert_eq!(terrain.fragment_index(-5, 7), Some((0, 3)));
        assert_eq!(terrain.fragment_index(0, 0), Some((2, 2)));
        assert_eq!(terrain.fragment_index(8, -9), Some((0, 3)));
        assert!(terrain.in_window(-8, 4));
        assert!(!terrain.in_window(8, 0));
    }

    #[test]
    fn whole_grid_is_requested_at_start() {
        let terrain = started(16, 0);
        for x in (-8..8).step_by(4) {
            for z in (-8..8).step_by(4) {
                assert_eq!(terrain.slot_state(x, z), SlotState::Generating);
            }
        }
        assert_eq!(terrain.task_manager.queued_len(), 1);
    }

    #[test]
    fn moving_past_a_fragment_requests_one_line() {
        let mut terrain = started(16, 0);
        let mut log = EditLog::new();
        assert!(!terrain.try_update_scene(Point3::new(3.0, 0.0, -4.0), &mut log));
        assert!(terrain.try_update_scene(Point3::new(0.0, 0.0, 4.5), &mut log));
        assert_eq!(terrain.origin(), (0, 4));
        assert!(terrain.in_window(-8, 8));
        assert!(!terrain.in_window(-8, -8));
        assert_eq!(terrain.task_manager.queued_len(), 2);

        assert!(terrain.try_update_scene(Point3::new(-4.5, 0.0, 4.0), &mut log));
        assert_eq!(terrain.origin(), (-4, 4));
        assert!(terrain.in_window(-12, -4));
    }
}
