//! # World Settings
//!
//! The one mutable, process-owned settings record, and the immutable snapshot of
//! it that every generation batch and collision query is handed.
//!
//! Settings are plain serde data so a launcher can ship them as JSON. Every
//! field has a default, so a partial file (or `{}`) is valid.
//!
//! Generation never reads `WorldSettings` directly. The coordinator calls
//! [`GenerationContext::snapshot`] once per batch and ships the resulting `Arc`
//! to the workers, so a settings change can never be observed half way through
//! a batch.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::block::{
    block_type::BlockType, default_biomes, default_tree_types, Biome, TreeType,
};
use crate::error::{WorldError, WorldResult};

/// The three integer seeds a world is generated from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seeds {
    /// Drives the heightmap.
    pub terrain: i32,
    /// Drives cloud placement.
    pub cloud: i32,
    /// Drives tree placement, trunk height and canopy shape.
    pub tree: i32,
}

impl Seeds {
    /// Draws three random seeds.
    pub fn random() -> Self {
        Seeds {
            terrain: fastrand::i32(0..1_000_000),
            cloud: fastrand::i32(0..1_000_000),
            tree: fastrand::i32(0..1_000_000),
        }
    }
}

/// Horizontal scale of each noise channel. Larger gaps give smoother features.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseGaps {
    /// Heightmap scale.
    pub seed_gap: f64,
    /// Cloud scale.
    pub cloud_seed_gap: f64,
    /// Tree scale.
    pub tree_seed_gap: f64,
}

impl Default for NoiseGaps {
    fn default() -> Self {
        NoiseGaps {
            seed_gap: 35.0,
            cloud_seed_gap: 2.0,
            tree_seed_gap: 2.0,
        }
    }
}

/// Vertical constants of the generated stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageHeights {
    /// Amplitude of the heightmap.
    pub max_height: i32,
    /// Water level. Columns below it are flooded.
    pub horizon_height: i32,
    /// Trees only grow on columns strictly above this height.
    pub tree_base_height: i32,
    /// Base altitude of the cloud layer.
    pub sky_height: i32,
}

impl Default for StageHeights {
    fn default() -> Self {
        StageHeights {
            max_height: 11,
            horizon_height: -3,
            tree_base_height: 0,
            sky_height: 40,
        }
    }
}

/// Movement speed constants.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionScales {
    /// Horizontal speed in blocks per second.
    pub walking: f32,
    /// Vertical speed in blocks per second.
    pub jump: f32,
    /// Falling speed in blocks per second.
    pub fall: f32,
    /// Speed multiplier in cheat (fly) mode.
    pub cheat_factor: f32,
    /// Global movement multiplier.
    pub move_scale: f32,
    /// View rotation multiplier.
    pub view_scale: f32,
    /// Vertical speed lost per update.
    pub gravity: f32,
}

impl Default for ActionScales {
    fn default() -> Self {
        ActionScales {
            walking: 8.0,
            jump: 9.0,
            fall: 9.0,
            cheat_factor: 2.0,
            move_scale: 1.0,
            view_scale: 0.5,
            gravity: 0.027,
        }
    }
}

/// Player bounding box, measured from the eye.
///
/// ```text
///   7_____________6
///   /| width=0.8 /|
///  /_|__________/ |height=2
/// 3| |         2| |
///  | | *    *   | |
///  | |   /  |   | |
///  | |  1.75|   | |
///  |4|______|___|_|5
///  |/_______|___|/length
///  0            1
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyDimensions {
    /// Front-to-back extent.
    pub length: f32,
    /// Side-to-side extent.
    pub width: f32,
    /// Feet-to-crown extent.
    pub height: f32,
    /// Eye to feet.
    pub eye_bottom: f32,
    /// Eye to crown.
    pub eye_up: f32,
    /// Eye to left side.
    pub eye_left: f32,
    /// Eye to right side.
    pub eye_right: f32,
    /// Eye to front face.
    pub eye_front: f32,
    /// Eye to back face.
    pub eye_back: f32,
}

impl Default for BodyDimensions {
    fn default() -> Self {
        BodyDimensions {
            length: 0.6,
            width: 0.8,
            height: 2.0,
            eye_bottom: 1.75,
            eye_up: 0.25,
            eye_left: 0.4,
            eye_right: 0.4,
            eye_front: 0.1,
            eye_back: 0.4,
        }
    }
}

/// The process-wide, mutable world settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// `None` until a world is chosen. Generation refuses to run without seeds.
    pub seeds: Option<Seeds>,
    /// Index into `biomes`. `None` until a world is chosen.
    pub biome: Option<usize>,
    /// Number of blocks along one edge of the streamed stage, squared into
    /// fragments of `floor(sqrt(stage_size))` blocks.
    pub stage_size: usize,
    /// Number of synthesis worker threads.
    pub threads: usize,
    /// Player eye position.
    pub player_position: [f32; 3],
    /// Noise channel scales.
    pub noise_gaps: NoiseGaps,
    /// Vertical stage constants.
    pub stage: StageHeights,
    /// Movement speeds.
    pub actions: ActionScales,
    /// Player bounding box.
    pub body: BodyDimensions,
    /// Reach of block targeting, in blocks.
    pub op_range: f32,
    /// Input sensitivity multiplier.
    pub op_sens: f32,
    /// Fly mode: movement ignores collisions and gravity.
    pub cheat: bool,
    /// The block placed by an add action.
    pub active_block: BlockType,
    /// Biome table.
    pub biomes: Vec<Biome>,
    /// Tree species table.
    pub tree_types: Vec<TreeType>,
}

impl Default for WorldSettings {
    fn default() -> Self {
        WorldSettings {
            seeds: None,
            biome: None,
            stage_size: 144,
            threads: 4,
            player_position: [0.0, 30.0, 0.0],
            noise_gaps: NoiseGaps::default(),
            stage: StageHeights::default(),
            actions: ActionScales::default(),
            body: BodyDimensions::default(),
            op_range: 8.0,
            op_sens: 1.0,
            cheat: false,
            active_block: BlockType::STONE,
            biomes: default_biomes(),
            tree_types: default_tree_types(),
        }
    }
}

impl WorldSettings {
    /// Parses and validates settings from JSON.
    pub fn from_json_str(json: &str) -> WorldResult<Self> {
        let settings: WorldSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a settings file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> WorldResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes the settings as pretty JSON.
    pub fn to_json(&self) -> WorldResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks value ranges that the rest of the engine relies on.
    pub fn validate(&self) -> WorldResult<()> {
        if self.fragment_size() < 2 {
            return Err(WorldError::InvalidSettings(format!(
                "stage_size {} yields fragments smaller than 2 blocks",
                self.stage_size
            )));
        }
        if self.threads == 0 {
            return Err(WorldError::InvalidSettings(
                "at least one worker thread is required".to_string(),
            ));
        }
        let gaps = self.noise_gaps;
        if gaps.seed_gap <= 0.0 || gaps.cloud_seed_gap <= 0.0 || gaps.tree_seed_gap <= 0.0 {
            return Err(WorldError::InvalidSettings(
                "noise gaps must be positive".to_string(),
            ));
        }
        if let Some(biome) = self.biome {
            if biome >= self.biomes.len() {
                return Err(WorldError::InvalidSettings(format!(
                    "biome index {} out of range ({} biomes)",
                    biome,
                    self.biomes.len()
                )));
            }
        }
        if self.tree_types.is_empty() {
            return Err(WorldError::InvalidSettings(
                "tree type table is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Edge length, in blocks, of one fragment (and, in fragments, of the grid).
    pub fn fragment_size(&self) -> usize {
        (self.stage_size as f64).sqrt().floor() as usize
    }
}

/// Immutable snapshot of everything synthesis depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationContext {
    /// World seeds.
    pub seeds: Seeds,
    /// Noise channel scales.
    pub noise_gaps: NoiseGaps,
    /// Vertical stage constants.
    pub stage: StageHeights,
    /// Index of the active biome in the settings' table.
    pub biome_index: usize,
    /// The active biome.
    pub biome: Biome,
    /// Tree species table.
    pub tree_types: Vec<TreeType>,
}

impl GenerationContext {
    /// Freezes the generation-relevant settings.
    ///
    /// # Returns
    /// `None` while seeds or biome are unassigned, or the biome index is out
    /// of range. Callers treat that as "world not started".
    pub fn snapshot(settings: &WorldSettings) -> Option<Arc<GenerationContext>> {
        let seeds = settings.seeds?;
        let biome_index = settings.biome?;
        let biome = *settings.biomes.get(biome_index)?;
        if settings.tree_types.is_empty() {
            return None;
        }
        Some(Arc::new(GenerationContext {
            seeds,
            noise_gaps: settings.noise_gaps,
            stage: settings.stage,
            biome_index,
            biome,
            tree_types: settings.tree_types.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_the_default() {
        let settings = WorldSettings::from_json_str("{}").unwrap();
        assert_eq!(settings, WorldSettings::default());
        assert_eq!(settings.fragment_size(), 12);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings = WorldSettings::from_json_str(
            r#"{ "seeds": { "terrain": 1, "cloud": 2, "tree": 3 }, "biome": 0, "stage": { "max_height": 4 } }"#,
        )
        .unwrap();
        assert_eq!(settings.stage.max_height, 4);
        assert_eq!(settings.stage.horizon_height, -3);
        assert_eq!(settings.threads, 4);
        let ctx = GenerationContext::snapshot(&settings).unwrap();
        assert_eq!(ctx.biome.surface, BlockType::SNOW);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            WorldSettings::from_json_str(r#"{ "stage_size": 3 }"#),
            Err(WorldError::InvalidSettings(_))
        ));
        assert!(matches!(
            WorldSettings::from_json_str(r#"{ "biome": 99 }"#),
            Err(WorldError::InvalidSettings(_))
        ));
        assert!(matches!(
            WorldSettings::from_json_str("not json"),
            Err(WorldError::Json(_))
        ));
    }

    #[test]
    fn no_snapshot_without_seeds() {
        let mut settings = WorldSettings::default();
        settings.biome = Some(0);
        assert!(GenerationContext::snapshot(&settings).is_none());
        settings.seeds = Some(Seeds {
            terrain: 1,
            cloud: 1,
            tree: 1,
        });
        assert!(GenerationContext::snapshot(&settings).is_some());
    }
}
