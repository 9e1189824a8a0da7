#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! The world core of a block-building game: a persistent log of player edits,
//! deterministic terrain synthesis, a streamed fragment grid around the player
//! and voxel collision for walking and block targeting.
//!
//! ## Key Modules
//!
//! * `engine_state` - The world itself: edit log, synthesizer, streaming,
//!   collision and the per-frame orchestrator
//! * `error` - Errors of the fallible loaders
//!
//! ## Architecture
//!
//! The crate keeps a clear separation between:
//! * World description (block tables, settings, the edit log)
//! * Generation (a pure synthesizer run on a worker pool)
//! * Presentation (a `Renderer` collaborator the host application implements)
//! * Interaction (movement and block actions resolved by raycasts)
//!
//! ## Usage
//!
//! ```ignore
//! voxel_world::init_logger();
//! let settings = WorldSettings::from_path("world.json")?;
//! let mut engine = EngineState::new(HeadlessRenderer::new(), settings, EditLog::new())?;
//! engine.start()?;
//! loop {
//!     engine.update(dt, PlayerAction::default());
//! }
//! ```

use log::info;

pub mod engine_state;
pub mod error;

pub use engine_state::camera_state::camera::{Camera, MoveIntent, ViewIntent};
pub use engine_state::rendering::{HeadlessRenderer, Renderer};
pub use engine_state::settings::{Seeds, WorldSettings};
pub use engine_state::voxels::edit_log::{BlockEdit, EditLog};
pub use engine_state::{BlockAction, EngineState, PlayerAction};
pub use error::{WorldError, WorldResult};

/// Initializes `env_logger` on stdout, filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger() {
    let mut log_builder = env_logger::Builder::new();
    let initialized = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok();
    if initialized {
        info!("Logger initialized");
    }
}
