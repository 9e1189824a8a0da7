//! # Engine State Module
//!
//! The core engine module that ties the world together.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container, driven once per frame
//! * `camera_state` - Camera orientation and the movement controller
//! * `collision` - Raycasts and per-axis movement checks
//! * `rendering` - The renderer collaborator trait and a headless renderer
//! * `settings` - The world settings record and generation snapshots
//! * `task_management` - The synthesis worker pool
//! * `voxels` - Block tables, the edit log, fragments and terrain streaming
//!
//! ## Frame Loop
//!
//! Each call to [`EngineState::update`]:
//! 1. applies edits received from the network layer
//! 2. turns the camera and moves the player, resolving collisions
//! 3. performs the requested block action, if any
//! 4. shifts the fragment grid after the player
//! 5. installs finished fragments and hands out queued requests
//!
//! Everything runs on the calling thread except fragment synthesis, which
//! happens on the worker pool.

use std::sync::mpsc::{channel, Receiver, Sender};

use cgmath::Point3;
use log::{debug, info};

use camera_state::camera::{Camera, MoveIntent, ViewIntent};
use camera_state::MovementController;
use collision::{relative_operate_collision_check, CollisionScene};
use rendering::Renderer;
use settings::WorldSettings;
use voxels::edit_log::{BlockEdit, EditLog};
use voxels::fragment::BlockKey;
use voxels::terrain::Terrain;

use crate::error::WorldResult;

pub mod camera_state;
pub mod collision;
pub mod rendering;
pub mod settings;
pub mod task_management;
pub mod voxels;

/// A block edit requested by the player.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockAction {
    /// Place the active block against the targeted face.
    Add,
    /// Remove the targeted block.
    Remove,
}

/// Player input for one frame.
///
/// # Fields
/// - `movement`: camera-relative movement
/// - `view`: view rotation
/// - `block_action`: an edit to perform on the targeted block
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PlayerAction {
    pub movement: MoveIntent,
    pub view: ViewIntent,
    pub block_action: Option<BlockAction>,
}

/// The main state container of the world.
///
/// Owns the settings, the edit log, the streamed terrain and the player. The
/// edit log is written only here, by local block actions and by edits drained
/// from [`remote_sender`](Self::remote_sender).
pub struct EngineState<R: Renderer> {
    settings: WorldSettings,
    edit_log: EditLog,
    terrain: Terrain<R>,
    /// The player's eye
    pub camera: Camera,
    movement: MovementController,
    remote_sender: Sender<BlockEdit>,
    remote_receiver: Receiver<BlockEdit>,
}

impl<R: Renderer> EngineState<R> {
    /// Creates the engine with the player at `settings.player_position`.
    ///
    /// The world is not generated until [`start`](Self::start).
    ///
    /// # Errors
    /// `InvalidSettings` if `settings` fail validation, `WorkerSpawn` if the
    /// worker pool cannot be created.
    pub fn new(renderer: R, settings: WorldSettings, edit_log: EditLog) -> WorldResult<Self> {
        settings.validate()?;
        let terrain = Terrain::new(renderer, settings.threads)?;
        let camera = Camera::new(Point3::from(settings.player_position));
        let (remote_sender, remote_receiver) = channel();
        Ok(EngineState {
            settings,
            edit_log,
            terrain,
            camera,
            movement: MovementController::new(),
            remote_sender,
            remote_receiver,
        })
    }

    /// The current settings.
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// The edit log.
    pub fn edit_log(&self) -> &EditLog {
        &self.edit_log
    }

    /// The streamed terrain.
    pub fn terrain(&self) -> &Terrain<R> {
        &self.terrain
    }

    /// Mutable access to the streamed terrain.
    pub fn terrain_mut(&mut self) -> &mut Terrain<R> {
        &mut self.terrain
    }

    /// The player's jump state.
    pub fn movement(&self) -> &MovementController {
        &self.movement
    }

    /// A handle the network layer sends remote edits through.
    pub fn remote_sender(&self) -> Sender<BlockEdit> {
        self.remote_sender.clone()
    }

    /// (Re)starts the world around the player.
    ///
    /// # Returns
    /// `Ok(false)` while seeds or biome are unset.
    pub fn start(&mut self) -> WorldResult<bool> {
        self.settings.player_position = self.camera.position.into();
        self.terrain.update_state(&self.settings, &mut self.edit_log)
    }

    /// Replaces the settings and restarts the world with them.
    ///
    /// # Errors
    /// `InvalidSettings` if `settings` fail validation; the running world is
    /// left untouched in that case.
    pub fn apply_settings(&mut self, settings: WorldSettings) -> WorldResult<bool> {
        settings.validate()?;
        info!("Applying new world settings");
        self.settings = settings;
        self.start()
    }

    /// Advances the world by one frame of `dt` seconds.
    pub fn update(&mut self, dt: f32, action: PlayerAction) {
        self.receive_remote_edits();

        self.movement
            .view_direction_move(&mut self.camera, action.view, dt, &self.settings);
        self.move_player(action.movement, dt);

        if let Some(block_action) = action.block_action {
            self.handle_block_action(block_action);
        }

        self.terrain
            .try_update_scene(self.camera.position, &mut self.edit_log);
        self.terrain.process_tasks();
    }

    fn move_player(&mut self, intent: MoveIntent, dt: f32) {
        let Some(context) = self.terrain.context().cloned() else {
            return;
        };
        let scene = CollisionScene {
            context: &context,
            noise: self.terrain.noise(),
        };
        self.movement.position_move(
            &mut self.camera,
            intent,
            dt,
            &self.settings,
            &scene,
            &mut self.edit_log,
        );
    }

    /// Applies every edit received from the network layer since the last call.
    ///
    /// # Returns
    /// The number of edits applied.
    pub fn receive_remote_edits(&mut self) -> usize {
        let mut received = 0;
        while let Ok(edit) = self.remote_receiver.try_recv() {
            self.commit_edit(edit);
            received += 1;
        }
        if received > 0 {
            debug!("Applied {} remote edit(s)", received);
        }
        received
    }

    /// Records `edit` and draws it on the live grid.
    pub fn commit_edit(&mut self, edit: BlockEdit) {
        self.edit_log.insert(edit);
        self.terrain.apply_edit(&edit);
    }

    /// Edits the block the camera is looking at, up to `op_range` away.
    ///
    /// Removal first back-fills the ground around the removed block.
    ///
    /// # Returns
    /// The edit made, or `None` when nothing is targeted or an add hits an
    /// edge or corner.
    pub fn handle_block_action(&mut self, action: BlockAction) -> Option<BlockEdit> {
        let context = self.terrain.context()?.clone();
        let hit = {
            let scene = CollisionScene {
                context: &context,
                noise: self.terrain.noise(),
            };
            let reach = MoveIntent::new(self.settings.op_range, 0.0, 0.0);
            relative_operate_collision_check(&scene, &mut self.edit_log, &self.camera, reach, false)?
        };
        let target = BlockKey::containing(hit.position);

        let edit = match action {
            BlockAction::Add => {
                let normal = hit.normal?;
                BlockEdit::place(
                    target.x + normal.x,
                    target.y + normal.y,
                    target.z + normal.z,
                    self.settings.active_block,
                )
            }
            BlockAction::Remove => {
                self.terrain
                    .check_remove_floor(target.x, target.y, target.z, &mut self.edit_log);
                BlockEdit::remove(target.x, target.y, target.z)
            }
        };
        debug!("{:?} at ({}, {}, {})", action, edit.x, edit.y, edit.z);
        self.commit_edit(edit);
        Some(edit)
    }

    /// Blocks until every generation request is answered or `timeout` passes.
    pub fn wait_until_idle(&mut self, timeout: web_time::Duration) -> usize {
        self.terrain.wait_until_idle(timeout)
    }

    /// The edit log in its persisted form.
    pub fn export_edit_log(&self) -> WorldResult<String> {
        self.edit_log.to_json()
    }
}
