//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world.
//! It provides functionality for block type identification, conversion between
//! the compact persisted id and the enum, and the per-type properties the
//! synthesizer and collision engine consult.

use std::fmt;

use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::BlockTypeSize;
use crate::error::WorldError;

/// Enumerates every placeable block type.
///
/// Air is not a block type: an empty cell is represented by the absence of a
/// type (`Option<BlockType>::None`) in both the edit log and the fragments.
/// The `FromPrimitive` derive allows conversion from the persisted integer id.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive, Serialize, Deserialize,
)]
#[serde(try_from = "BlockTypeSize", into = "BlockTypeSize")]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum BlockType {
    /// Indestructible floor material.
    BEDROCK,
    /// Plain stone.
    STONE,
    /// A basic dirt block.
    DIRT,
    /// A grass-topped dirt block.
    GRASS,
    /// Beach sand.
    SAND,
    /// Still water. Passable.
    WATER,
    /// Frozen water. Solid, so it can be walked on.
    ICE,
    /// Packed snow.
    SNOW,
    /// Molten rock. Passable.
    LAVA,
    /// Cooled lava.
    OBSIDIAN,
    /// Oak trunk.
    OAK_LOG,
    /// Oak canopy.
    OAK_LEAVES,
    /// Birch trunk.
    BIRCH_LOG,
    /// Birch canopy.
    BIRCH_LEAVES,
    /// Crafted planks.
    PLANKS,
    /// Fired brick.
    BRICK,
    /// Clear glass.
    GLASS,
    /// Melon block.
    MELON,
    /// Pumpkin block.
    PUMPKIN,
}

impl BlockType {
    /// Every block type in id order.
    pub const ALL: [BlockType; 19] = [
        BlockType::BEDROCK,
        BlockType::STONE,
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::SAND,
        BlockType::WATER,
        BlockType::ICE,
        BlockType::SNOW,
        BlockType::LAVA,
        BlockType::OBSIDIAN,
        BlockType::OAK_LOG,
        BlockType::OAK_LEAVES,
        BlockType::BIRCH_LOG,
        BlockType::BIRCH_LEAVES,
        BlockType::PLANKS,
        BlockType::BRICK,
        BlockType::GLASS,
        BlockType::MELON,
        BlockType::PUMPKIN,
    ];

    /// Number of block types.
    pub const COUNT: usize = Self::ALL.len();

    /// Converts a persisted id into a block type.
    ///
    /// # Returns
    /// `None` if the id does not name a known block type.
    pub fn from_id(id: BlockTypeSize) -> Option<Self> {
        num::FromPrimitive::from_u8(id)
    }

    /// The compact id used in persisted edit logs and as the batch slot index.
    pub fn id(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Whether a player can move through this block.
    ///
    /// Collision-only fragments skip passable fills (water surfaces, canopies
    /// marked passable) since rays would never stop on them anyway.
    pub fn is_passable(self) -> bool {
        matches!(self, BlockType::WATER | BlockType::LAVA)
    }
}

impl TryFrom<BlockTypeSize> for BlockType {
    type Error = WorldError;

    fn try_from(id: BlockTypeSize) -> Result<Self, Self::Error> {
        BlockType::from_id(id).ok_or(WorldError::UnknownBlockType(id))
    }
}

impl From<BlockType> for BlockTypeSize {
    fn from(block_type: BlockType) -> Self {
        block_type.id()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
