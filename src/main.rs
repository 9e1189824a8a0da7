//! # Voxel World Headless Driver
//!
//! Loads a world, walks the player forward for a number of frames while the
//! terrain streams around it, then writes the edit log back out.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [settings.json] [edits.json] [frames]
//! ```
//!
//! Missing settings fall back to defaults with random seeds. A missing edit log
//! starts the world unedited.

use std::path::Path;
use std::{env, fs};

use log::{error, info, warn};
use voxel_world::{
    BlockAction, EditLog, EngineState, HeadlessRenderer, MoveIntent, PlayerAction, Seeds,
    WorldError, WorldResult, WorldSettings,
};
use web_time::{Duration, Instant};

const FRAME_SECONDS: f32 = 1.0 / 60.0;
const DEFAULT_FRAMES: usize = 600;

fn load_settings(path: Option<&str>) -> WorldSettings {
    let mut settings = match path {
        Some(path) => match WorldSettings::from_path(path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Could not load settings from {}: {}", path, err);
                WorldSettings::default()
            }
        },
        None => WorldSettings::default(),
    };
    if settings.seeds.is_none() {
        settings.seeds = Some(Seeds::random());
    }
    if settings.biome.is_none() {
        settings.biome = Some(fastrand::usize(..settings.biomes.len().max(1)));
    }
    settings
}

fn load_edit_log(path: Option<&str>) -> EditLog {
    let Some(path) = path.filter(|path| Path::new(path).exists()) else {
        return EditLog::new();
    };
    match fs::read_to_string(path)
        .map_err(WorldError::from)
        .and_then(|json| EditLog::from_json(&json))
    {
        Ok(log) => {
            info!("Loaded {} edits from {}", log.len(), path);
            log
        }
        Err(err) => {
            warn!("Could not load edit log from {}: {}", path, err);
            EditLog::new()
        }
    }
}

fn run(args: &[String]) -> WorldResult<()> {
    let settings = load_settings(args.get(1).map(String::as_str));
    let log_path = args.get(2).map(String::as_str);
    let frames = args
        .get(3)
        .and_then(|frames| frames.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);

    let edit_log = load_edit_log(log_path);
    let mut engine = EngineState::new(HeadlessRenderer::new(), settings, edit_log)?;
    engine.start()?;
    engine.wait_until_idle(Duration::from_secs(30));

    let started = Instant::now();
    for frame in 0..frames {
        let action = PlayerAction {
            movement: MoveIntent::new(1.0, 0.0, 0.0),
            block_action: (frame % 120 == 119).then_some(BlockAction::Remove),
            ..PlayerAction::default()
        };
        engine.update(FRAME_SECONDS, action);
    }
    let renderer = engine.terrain().renderer();
    info!(
        "{} frames in {:?}: player at {:?}, {} batches, {} visible instances, {} temporary meshes",
        frames,
        started.elapsed(),
        engine.camera.position,
        renderer.live_batches(),
        renderer.visible_instances(),
        renderer.live_meshes()
    );

    if let Some(path) = log_path {
        fs::write(path, engine.export_edit_log()?)?;
        info!("Saved {} edits to {}", engine.edit_log().len(), path);
    }
    Ok(())
}

fn main() {
    voxel_world::init_logger();
    let args: Vec<String> = env::args().collect();
    if let Err(err) = run(&args) {
        error!("{}", err);
        std::process::exit(1);
    }
}
