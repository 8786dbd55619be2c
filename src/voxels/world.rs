//! # World Module
//!
//! This module provides the `World` struct which owns every loaded chunk.
//! It is the single place chunks live while they are in use, and the surface
//! gameplay and rendering code query.
//!
//! ## Architecture
//!
//! The world is a sparse map from chunk coordinate to [`Chunk`]. Only chunks
//! near the reference position are kept, which allows effectively infinite
//! worlds at bounded memory.
//!
//! ## Threading
//!
//! The map is owned and mutated by one consumer thread. Background workers
//! never see it: they receive voxel snapshots and hand back finished chunks or
//! meshes, which the consumer adopts here.
//!
//! ## Renderer Signals
//!
//! Every time a chunk adopts a new mesh its coordinate is queued. The renderer
//! calls [`World::take_ready_meshes`] once per frame and re-uploads only those
//! chunks.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, info};

use crate::error::{TerrainError, TerrainResult};
use crate::generation::WorldGenerator;
use crate::meshing::{greedy_mesh, MeshData};
use crate::persistence::ChunkStore;

use super::{
    block::VoxelType,
    chunk::{Chunk, ChunkCoord, ChunkState, CHUNK_HEIGHT, CHUNK_SIZE},
};

/// Represents a voxel world composed of multiple chunks.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use voxel_terrain::generation::NoiseTerrainGenerator;
/// use voxel_terrain::voxels::{chunk::ChunkCoord, world::World};
///
/// let mut world = World::new(Arc::new(NoiseTerrainGenerator::from_seed(12345)));
/// world.generate_chunk_at(ChunkCoord::new(0, 0)).unwrap();
///
/// let surface = world.height_at(3, 4);
/// assert!(world.voxel_at(3, surface, 4).unwrap().is_solid());
/// ```
pub struct World {
    chunks: HashMap<ChunkCoord, Chunk>,
    generator: Arc<dyn WorldGenerator>,
    store: Option<Arc<dyn ChunkStore>>,
    ready_meshes: BTreeSet<ChunkCoord>,
}

impl World {
    /// Creates a new, empty world backed by `generator`.
    pub fn new(generator: Arc<dyn WorldGenerator>) -> Self {
        info!("World created with seed {}", generator.seed());
        World {
            chunks: HashMap::new(),
            generator,
            store: None,
            ready_meshes: BTreeSet::new(),
        }
    }

    /// Attaches a chunk store used for loading saved chunks and for saves.
    pub fn with_store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The terrain generator.
    pub fn generator(&self) -> &Arc<dyn WorldGenerator> {
        &self.generator
    }

    /// The attached chunk store, if any.
    pub fn store(&self) -> Option<&Arc<dyn ChunkStore>> {
        self.store.as_ref()
    }

    /// Number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether the chunk at `coord` is loaded.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Coordinates of every loaded chunk, in no particular order.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// The loaded chunk at `coord`.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// The loaded chunk at `coord`, mutably.
    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Adopts a chunk into the world, replacing any chunk at the same coordinate.
    ///
    /// A chunk that already carries a mesh is queued for the renderer.
    pub fn insert_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        let coord = chunk.coord();
        if chunk.mesh().is_some() {
            self.ready_meshes.insert(coord);
        }
        self.chunks.insert(coord, chunk)
    }

    /// Removes a chunk from the world and hands it back.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.ready_meshes.remove(&coord);
        self.chunks.remove(&coord)
    }

    /// Gets the voxel at a world position.
    ///
    /// # Returns
    /// `None` if the chunk containing the position is not loaded. Heights
    /// outside the chunk range read as air.
    pub fn voxel_at(&self, x: i32, y: i32, z: i32) -> Option<VoxelType> {
        let chunk = self.chunks.get(&ChunkCoord::from_world_pos(x, z))?;
        Some(chunk.get_voxel(x.rem_euclid(CHUNK_SIZE), y, z.rem_euclid(CHUNK_SIZE)))
    }

    /// Sets the voxel at a world position and marks its chunk for remeshing.
    ///
    /// # Errors
    /// `TerrainError::InvalidCoordinate` if the chunk is not loaded, is being
    /// unloaded, or `y` is outside the chunk height.
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: VoxelType) -> TerrainResult<()> {
        if !(0..CHUNK_HEIGHT).contains(&y) {
            return Err(TerrainError::invalid_coordinate(x, y, z));
        }
        let chunk = self
            .chunks
            .get_mut(&ChunkCoord::from_world_pos(x, z))
            .filter(|chunk| chunk.state() != ChunkState::Unloading)
            .ok_or_else(|| TerrainError::invalid_coordinate(x, y, z))?;
        chunk.set_voxel(x.rem_euclid(CHUNK_SIZE), y, z.rem_euclid(CHUNK_SIZE), voxel)
    }

    /// Surface height of a world column, straight from the generator.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        self.generator.height_at(x, z)
    }

    /// The current mesh of a loaded chunk.
    pub fn mesh(&self, coord: ChunkCoord) -> Option<Arc<MeshData>> {
        self.chunks.get(&coord).and_then(Chunk::mesh)
    }

    /// Attaches a mesh built from the chunk's voxels at `source_revision`.
    ///
    /// # Returns
    /// `true` if the chunk adopted it; stale meshes are refused.
    pub fn attach_mesh(&mut self, coord: ChunkCoord, mesh: MeshData, source_revision: u64) -> bool {
        let adopted = self
            .chunks
            .get_mut(&coord)
            .is_some_and(|chunk| chunk.attach_mesh(mesh, source_revision));
        if adopted {
            self.ready_meshes.insert(coord);
        }
        adopted
    }

    /// Takes the coordinates whose mesh changed since the last call.
    pub fn take_ready_meshes(&mut self) -> Vec<ChunkCoord> {
        std::mem::take(&mut self.ready_meshes).into_iter().collect()
    }

    /// Coordinates of loaded chunks that need a (new) mesh.
    pub fn chunks_needing_mesh(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self
            .chunks
            .values()
            .filter(|chunk| {
                matches!(chunk.state(), ChunkState::Generated | ChunkState::Dirty)
                    && chunk.is_dirty()
            })
            .map(Chunk::coord)
            .collect();
        coords.sort();
        coords
    }

    /// Generates a chunk on the calling thread and adds it to the world.
    ///
    /// Saved voxels from the attached store take precedence over procedural
    /// generation. An already loaded chunk is left as is.
    pub fn generate_chunk_at(&mut self, coord: ChunkCoord) -> TerrainResult<()> {
        if self.chunks.contains_key(&coord) {
            return Ok(());
        }

        let mut chunk = Chunk::new(coord);
        chunk.begin_generation()?;
        let saved = match &self.store {
            Some(store) => store.load(coord)?,
            None => None,
        };
        match saved {
            Some(voxels) => chunk.replace_voxels(voxels)?,
            None => self
                .generator
                .generate_chunk_with_assets(&mut chunk, Some(self))?,
        }
        chunk.finish_generation()?;

        debug!("Generated chunk {:?} on the consumer thread", coord);
        self.chunks.insert(coord, chunk);
        Ok(())
    }

    /// Meshes a loaded chunk on the calling thread.
    ///
    /// # Returns
    /// `true` if a new mesh was attached.
    pub fn remesh_chunk(&mut self, coord: ChunkCoord) -> bool {
        let snapshot = match self.chunks.get(&coord) {
            Some(chunk) => chunk.snapshot(),
            None => return false,
        };
        let mesh = greedy_mesh(&snapshot.voxels);
        self.attach_mesh(coord, mesh, snapshot.revision)
    }

    /// Saves a loaded chunk's voxels to the attached store.
    ///
    /// # Returns
    /// `Ok(false)` when no store is attached or the chunk is not loaded.
    ///
    /// # Errors
    /// Any error reported by the store. The chunk stays `modified`.
    pub fn save_chunk(&mut self, coord: ChunkCoord) -> TerrainResult<bool> {
        let (store, chunk) = match (&self.store, self.chunks.get_mut(&coord)) {
            (Some(store), Some(chunk)) => (store, chunk),
            _ => return Ok(false),
        };
        store.save(coord, chunk.voxels())?;
        chunk.mark_saved();
        debug!("Saved chunk {:?}", coord);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::NoiseTerrainGenerator;
    use crate::persistence::MemoryChunkStore;

    fn world() -> World {
        World::new(Arc::new(NoiseTerrainGenerator::from_seed(12345)))
    }

    #[test]
    fn test_unloaded_chunk_reads_none() {
        let world = world();
        assert_eq!(world.voxel_at(0, 10, 0), None);
        assert!(world.mesh(ChunkCoord::new(0, 0)).is_none());
    }

    #[test]
    fn test_negative_world_positions_map_to_local() {
        let mut world = world();
        world.generate_chunk_at(ChunkCoord::new(-1, -1)).unwrap();
        world.set_voxel(-1, 200, -16, VoxelType::Glass).unwrap();

        let chunk = world.chunk(ChunkCoord::new(-1, -1)).unwrap();
        assert_eq!(chunk.get_voxel(15, 200, 0), VoxelType::Glass);
        assert_eq!(world.voxel_at(-1, 200, -16), Some(VoxelType::Glass));
        assert_eq!(world.voxel_at(-1, 300, -16), Some(VoxelType::Air));
    }

    #[test]
    fn test_set_voxel_outside_loaded_chunks_fails() {
        let mut world = world();
        assert!(matches!(
            world.set_voxel(5, 5, 5, VoxelType::Stone),
            Err(TerrainError::InvalidCoordinate { .. })
        ));
        world.generate_chunk_at(ChunkCoord::new(0, 0)).unwrap();
        assert!(world.set_voxel(5, -1, 5, VoxelType::Stone).is_err());
    }

    #[test]
    fn test_edit_queues_remesh_and_ready_signal() {
        let mut world = world();
        let coord = ChunkCoord::new(0, 0);
        world.generate_chunk_at(coord).unwrap();
        assert_eq!(world.chunks_needing_mesh(), vec![coord]);

        assert!(world.remesh_chunk(coord));
        assert_eq!(world.take_ready_meshes(), vec![coord]);
        assert!(world.take_ready_meshes().is_empty());
        assert!(world.chunks_needing_mesh().is_empty());

        world.set_voxel(1, 200, 1, VoxelType::Stone).unwrap();
        assert_eq!(world.chunk(coord).unwrap().state(), ChunkState::Dirty);
        assert_eq!(world.chunks_needing_mesh(), vec![coord]);
        assert!(world.remesh_chunk(coord));
        assert_eq!(world.take_ready_meshes(), vec![coord]);
    }

    #[test]
    fn test_save_chunk_uses_store() {
        let store = Arc::new(MemoryChunkStore::new());
        let mut world = world().with_store(store.clone());
        let coord = ChunkCoord::new(3, 3);
        world.generate_chunk_at(coord).unwrap();
        world.set_voxel(50, 250, 50, VoxelType::Planks).unwrap();
        assert!(world.chunk(coord).unwrap().is_modified());

        assert!(world.save_chunk(coord).unwrap());
        assert!(!world.chunk(coord).unwrap().is_modified());
        let saved = store.load(coord).unwrap().unwrap();
        assert_eq!(saved.as_slice(), world.chunk(coord).unwrap().voxels());
    }
}
