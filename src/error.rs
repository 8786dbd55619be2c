//! # Error Types
//!
//! Every fallible operation in the crate reports a [`TerrainError`]. Most of
//! these never reach the consumer thread: coordinate errors are treated as
//! no-ops, malformed layer tables fall back to the built-in default and
//! generation failures are retried by the streamer.

use thiserror::Error;

use crate::voxels::chunk::ChunkState;

/// Errors that can occur while generating, meshing, streaming or persisting terrain.
#[derive(Error, Debug)]
pub enum TerrainError {
    /// A chunk-local or world position outside the valid range.
    #[error("invalid coordinate ({x}, {y}, {z})")]
    InvalidCoordinate {
        /// X component.
        x: i32,
        /// Y component.
        y: i32,
        /// Z component.
        z: i32,
    },

    /// Filling or meshing a chunk failed on a worker.
    #[error("generation failed for chunk ({chunk_x}, {chunk_z}): {reason}")]
    GenerationFailure {
        /// Chunk X coordinate.
        chunk_x: i32,
        /// Chunk Z coordinate.
        chunk_z: i32,
        /// What went wrong.
        reason: String,
    },

    /// A layer rule table with a gap, an overlap or an empty range.
    #[error("malformed layer config: {0}")]
    MalformedLayerConfig(String),

    /// The elevation asset was missing, unreadable or inconsistent.
    #[error("heightmap load failure: {0}")]
    HeightmapLoadFailure(String),

    /// Fractal parameters outside their valid ranges.
    #[error("invalid noise parameters: {0}")]
    InvalidNoiseParameters(String),

    /// A chunk was asked to move between two states that are not connected.
    #[error("invalid chunk state transition {from:?} -> {to:?}")]
    InvalidStateTransition {
        /// The current state.
        from: ChunkState,
        /// The requested state.
        to: ChunkState,
    },

    /// A persisted chunk payload that does not decode.
    #[error("corrupt chunk payload: {0}")]
    CorruptPayload(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Underlying I/O failure from a chunk store or config file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TerrainError {
    /// Builds an [`TerrainError::InvalidCoordinate`] from three components.
    pub fn invalid_coordinate(x: i32, y: i32, z: i32) -> Self {
        TerrainError::InvalidCoordinate { x, y, z }
    }
}

impl From<serde_json::Error> for TerrainError {
    fn from(err: serde_json::Error) -> Self {
        TerrainError::Config(err.to_string())
    }
}

/// Result type for terrain operations.
pub type TerrainResult<T> = Result<T, TerrainError>;
