//! # Block Module
//!
//! Block type definitions plus the two fixed lookup tables terrain synthesis is
//! parameterized by: biomes (which blocks make up water, surface and floor) and
//! tree species (trunk and canopy blocks).

use block_type::BlockType;
use serde::{Deserialize, Serialize};

pub mod block_type;

/// The underlying integer type used to represent block types in persisted data.
pub type BlockTypeSize = u8;

/// The three blocks a biome paints terrain with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Biome {
    /// Fills columns from just above the floor up to the horizon.
    pub water: BlockType,
    /// Top block of a column at or above the horizon.
    pub surface: BlockType,
    /// Top block of a column below the horizon.
    pub base: BlockType,
}

/// Trunk and canopy blocks of one tree species.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeType {
    /// Stacked above the surface block.
    pub trunk: BlockType,
    /// Hollow canopy around the top of the trunk.
    pub leaves: BlockType,
}

/// The built-in biome table, indexed by the world's biome selector.
pub fn default_biomes() -> Vec<Biome> {
    vec![
        // Ice
        Biome {
            water: BlockType::ICE,
            surface: BlockType::SNOW,
            base: BlockType::BEDROCK,
        },
        // Classic
        Biome {
            water: BlockType::WATER,
            surface: BlockType::GRASS,
            base: BlockType::DIRT,
        },
        // Beach melon field
        Biome {
            water: BlockType::WATER,
            surface: BlockType::SAND,
            base: BlockType::MELON,
        },
        // Pumpkin field
        Biome {
            water: BlockType::WATER,
            surface: BlockType::PUMPKIN,
            base: BlockType::DIRT,
        },
        // Bizarre
        Biome {
            water: BlockType::LAVA,
            surface: BlockType::OBSIDIAN,
            base: BlockType::GLASS,
        },
    ]
}

/// The built-in tree species table.
pub fn default_tree_types() -> Vec<TreeType> {
    vec![
        TreeType {
            trunk: BlockType::OAK_LOG,
            leaves: BlockType::OAK_LEAVES,
        },
        TreeType {
            trunk: BlockType::BIRCH_LOG,
            leaves: BlockType::BIRCH_LEAVES,
        },
    ]
}
