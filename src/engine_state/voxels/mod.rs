//! # Voxel World Core
//!
//! Everything that describes what the world contains.
//!
//! ## Architecture
//!
//! * **Block**: block types, biomes and tree species
//! * **Edit Log**: every block the player or the network has changed, indexed
//!   by column for fast rectangle queries
//! * **Noise**: the scalar noise field terrain, trees and clouds are shaped by
//! * **Fragment**: one square footprint of generated blocks as instance batches,
//!   and the deterministic synthesizer that produces it
//! * **Terrain**: the toroidal fragment grid streamed around the player
//!
//! ## Data Flow
//!
//! 1. The player's position decides which fragments the grid needs
//! 2. Terrain copies the matching edit-log slice into a generation request
//! 3. A worker synthesizes the fragments from noise and the slice
//! 4. Terrain installs the results that are still current and uploads them
//!
//! ## Thread Safety
//!
//! Workers only ever see owned copies: the settings snapshot is shared
//! read-only through an `Arc`, and edit-log slices are copied per request. The
//! edit log itself and the grid live on the main thread.

pub mod block;
pub mod edit_log;
pub mod fragment;
pub mod noise;
pub mod terrain;
