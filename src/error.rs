//! # World Errors
//!
//! Errors surfaced by the outer edges of the engine: loading settings, loading a
//! persisted edit log and spinning up the worker pool. Everything inside a frame
//! (stale worker results, missing fragments, unset seeds) is absorbed locally and
//! never reaches this type.

use thiserror::Error;

use crate::engine_state::voxels::block::BlockTypeSize;

/// Errors that can occur while loading or starting a world.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Reading a settings or save file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings or save file was not valid JSON for the expected shape.
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    /// A persisted edit referenced a block type id this build does not know.
    #[error("unknown block type id {0}")]
    UnknownBlockType(BlockTypeSize),

    /// A settings value is out of its accepted range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Convenience alias used by the fallible loaders.
pub type WorldResult<T> = Result<T, WorldError>;
