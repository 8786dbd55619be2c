//! # Terrain Generation
//!
//! Everything that decides which voxel goes where.
//!
//! ## Components
//! - `noise_field`: Seeded Perlin and fractal noise
//! - `heightmap`: Heights read from an external elevation grid
//! - `layers`: Height to voxel type layering rules
//! - `terrain`: The procedural noise generator
//! - `structures`: Tree placement on top of filled terrain
//!
//! Generators implement [`WorldGenerator`]. They are shared between worker
//! threads through an `Arc`, so every method takes `&self` and filling a chunk
//! never touches anything but that chunk.

use log::warn;

use crate::error::TerrainResult;
use crate::voxels::{
    block::VoxelType,
    chunk::{Chunk, ChunkState, CHUNK_HEIGHT},
    world::World,
};

pub mod heightmap;
pub mod layers;
pub mod noise_field;
pub mod structures;
pub mod terrain;

pub use heightmap::{EdgeMode, HeightmapData, HeightmapGenerator, HeightmapParams};
pub use layers::{ColumnProfile, LayerRule};
pub use noise_field::{FractalParams, NoiseField, Seed};
pub use structures::{StructureParams, TreePlacer};
pub use terrain::{NoiseTerrainGenerator, TerrainParams};

/// A source of chunk voxels.
///
/// Filling is a pure function of the generator's settings and the chunk
/// coordinate: the same inputs always produce the same voxels.
pub trait WorldGenerator: Send + Sync {
    /// Fills the chunk's terrain: bedrock, layered soil and stone, water.
    ///
    /// A chunk that is being unloaded is left untouched.
    fn generate_chunk(&self, chunk: &mut Chunk) -> TerrainResult<()>;

    /// Fills the chunk's terrain and places structures such as trees.
    ///
    /// # Arguments
    /// * `chunk` - The chunk to fill
    /// * `world` - The loaded world, when called from the consumer thread.
    ///   Workers pass `None`; structures are clipped at the chunk edge either way.
    fn generate_chunk_with_assets(
        &self,
        chunk: &mut Chunk,
        world: Option<&World>,
    ) -> TerrainResult<()> {
        let _ = world;
        self.generate_chunk(chunk)
    }

    /// Surface height of a world column.
    fn height_at(&self, x: i32, z: i32) -> i32;

    /// The world seed.
    fn seed(&self) -> Seed;
}

/// Whether a chunk may be filled. Unloading chunks are ignored with a warning.
pub(crate) fn should_fill(chunk: &Chunk) -> bool {
    if chunk.state() == ChunkState::Unloading {
        warn!(
            "Ignoring fill request for unloading chunk {:?}",
            chunk.coord()
        );
        return false;
    }
    true
}

/// Floods the air of column `(x, z)` between `surface` and `sea_level` with
/// water. `voxels` is a whole chunk in [`Chunk::index`] order.
pub(crate) fn fill_water(voxels: &mut [VoxelType], x: i32, z: i32, surface: i32, sea_level: i32) {
    let water_top = sea_level.min(CHUNK_HEIGHT - 1);
    for y in (surface + 1)..=water_top {
        if let Some(index) = Chunk::index(x, y, z) {
            voxels[index] = VoxelType::Water;
        }
    }
}
