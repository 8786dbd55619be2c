//! # Chunk Module
//!
//! This module provides the `Chunk` struct: dense storage for a 16x256x16
//! column of voxels together with the bookkeeping the streamer needs to move a
//! chunk through generation, meshing and eviction.
//!
//! ## Storage
//!
//! Voxels are stored densely, one byte each, in `x + 16 * (z + 16 * y)` order.
//! The array sits behind an `Arc` so a background mesh job can take a
//! snapshot in O(1); the first write after a snapshot copies the array
//! (copy-on-write through `Arc::make_mut`).
//!
//! ## Lifecycle
//!
//! ```text
//! Empty -> Generating -> Generated -> Meshed <-> Dirty
//!                             \          \        /
//!                              +-------> Unloading
//! ```
//!
//! A chunk in `Unloading` may be revived to `Meshed`/`Dirty` when it re-enters
//! the view radius while still retained.
//!
//! ## Flags
//! - `dirty`: the mesh no longer matches the voxels. Set by every mutation,
//!   cleared only when a mesh built from the current revision is attached.
//! - `modified`: voxels were edited after generation and not yet handed to a
//!   chunk store.

use std::sync::Arc;

use bitvec::prelude::BitVec;
use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::meshing::MeshData;

use super::block::VoxelType;

pub mod chunk_iteration;

/// The width and depth of a chunk in voxels.
pub const CHUNK_SIZE: i32 = 16;
/// The height of a chunk in voxels.
pub const CHUNK_HEIGHT: i32 = 256;
/// The number of voxels in one horizontal plane of a chunk.
pub const CHUNK_PLANE_SIZE: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;
/// The total number of voxels in a chunk.
pub const CHUNK_VOLUME: usize = CHUNK_PLANE_SIZE * CHUNK_HEIGHT as usize;

/// Position of a chunk on the horizontal chunk grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// Chunk X coordinate.
    pub x: i32,
    /// Chunk Z coordinate.
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Gets the chunk containing the given world column. Uses floor division so
    /// negative positions land in the correct chunk.
    pub fn from_world_pos(world_x: i32, world_z: i32) -> Self {
        Self {
            x: world_x.div_euclid(CHUNK_SIZE),
            z: world_z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Gets the chunk containing a floating point world position.
    pub fn from_world_point(position: Point3<f32>) -> Self {
        Self::from_world_pos(position.x.floor() as i32, position.z.floor() as i32)
    }

    /// World X/Z of this chunk's (0, 0) column.
    pub fn world_origin(&self) -> (i32, i32) {
        (self.x * CHUNK_SIZE, self.z * CHUNK_SIZE)
    }

    /// Squared Euclidean distance to another chunk, in chunk units.
    pub fn distance_squared(&self, other: &ChunkCoord) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }
}

/// Where a chunk is in its generation lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Freshly created, all air.
    Empty,
    /// A worker is filling the voxels.
    Generating,
    /// Voxels are filled; no mesh yet.
    Generated,
    /// The attached mesh matches the voxels.
    Meshed,
    /// Voxels changed after the last mesh.
    Dirty,
    /// Evicted from the active radius and waiting to be freed.
    Unloading,
}

impl ChunkState {
    fn can_transition_to(self, to: ChunkState) -> bool {
        use ChunkState::*;
        matches!(
            (self, to),
            (Empty, Generating)
                | (Generating, Generated)
                | (Generated, Meshed)
                | (Meshed, Dirty)
                | (Dirty, Meshed)
                | (Generated, Unloading)
                | (Meshed, Unloading)
                | (Dirty, Unloading)
                | (Unloading, Meshed)
                | (Unloading, Dirty)
        )
    }
}

/// An immutable view of a chunk's voxels at one revision, handed to mesh jobs.
#[derive(Clone, Debug)]
pub struct VoxelSnapshot {
    /// The chunk the voxels belong to.
    pub coord: ChunkCoord,
    /// The chunk revision the voxels were taken at.
    pub revision: u64,
    /// The shared voxel array.
    pub voxels: Arc<Vec<VoxelType>>,
}

/// A 16x256x16 column of voxels.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// The position of this chunk in chunk coordinates.
    coord: ChunkCoord,
    voxels: Arc<Vec<VoxelType>>,
    state: ChunkState,
    dirty: bool,
    modified: bool,
    /// Bumped on every voxel mutation.
    revision: u64,
    mesh: Option<Arc<MeshData>>,
}

impl Chunk {
    /// Creates a new, completely empty chunk (all voxels are air).
    ///
    /// # Arguments
    /// * `coord` - The chunk coordinates of the new chunk
    pub fn new(coord: ChunkCoord) -> Self {
        Chunk {
            coord,
            voxels: Arc::new(vec![VoxelType::Air; CHUNK_VOLUME]),
            state: ChunkState::Empty,
            dirty: false,
            modified: false,
            revision: 0,
            mesh: None,
        }
    }

    /// Converts local coordinates into an index into the voxel array.
    ///
    /// # Returns
    /// `None` if any component is outside the chunk.
    pub fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        if !(0..CHUNK_SIZE).contains(&x)
            || !(0..CHUNK_HEIGHT).contains(&y)
            || !(0..CHUNK_SIZE).contains(&z)
        {
            return None;
        }
        Some((x + CHUNK_SIZE * (z + CHUNK_SIZE * y)) as usize)
    }

    /// Converts an index into the voxel array back into local coordinates.
    pub fn position_of(index: usize) -> Point3<i32> {
        let index = index as i32;
        let x = index % CHUNK_SIZE;
        let z = (index / CHUNK_SIZE) % CHUNK_SIZE;
        let y = index / (CHUNK_SIZE * CHUNK_SIZE);
        Point3::new(x, y, z)
    }

    /// The chunk's coordinate on the chunk grid.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The chunk's current lifecycle state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Whether the attached mesh is out of date.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the voxels were edited after generation without being saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// The current voxel revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All voxels in `x + 16 * (z + 16 * y)` order.
    pub fn voxels(&self) -> &[VoxelType] {
        &self.voxels
    }

    /// Gets the voxel at the specified local coordinates.
    ///
    /// # Returns
    /// The voxel, or `VoxelType::Air` when the coordinates are out of range.
    pub fn get_voxel(&self, x: i32, y: i32, z: i32) -> VoxelType {
        match Self::index(x, y, z) {
            Some(index) => self.voxels[index],
            None => VoxelType::Air,
        }
    }

    /// Sets the voxel at the specified local coordinates.
    ///
    /// Any change marks the chunk dirty and bumps its revision. Writing the
    /// value a voxel already holds is not a mutation.
    ///
    /// # Errors
    /// `TerrainError::InvalidCoordinate` when the coordinates are out of range;
    /// the chunk is left untouched.
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: VoxelType) -> TerrainResult<()> {
        let index =
            Self::index(x, y, z).ok_or_else(|| TerrainError::invalid_coordinate(x, y, z))?;
        if self.voxels[index] == voxel {
            return Ok(());
        }
        Arc::make_mut(&mut self.voxels)[index] = voxel;
        self.mark_mutated();
        Ok(())
    }

    /// Fills every voxel in the inclusive box `min..=max` (clipped to the chunk).
    pub fn fill_region(&mut self, min: Point3<i32>, max: Point3<i32>, voxel: VoxelType) {
        let voxels = Arc::make_mut(&mut self.voxels);
        let mut changed = false;
        for y in min.y.max(0)..=max.y.min(CHUNK_HEIGHT - 1) {
            for z in min.z.max(0)..=max.z.min(CHUNK_SIZE - 1) {
                for x in min.x.max(0)..=max.x.min(CHUNK_SIZE - 1) {
                    if let Some(index) = Self::index(x, y, z) {
                        if voxels[index] != voxel {
                            voxels[index] = voxel;
                            changed = true;
                        }
                    }
                }
            }
        }
        if changed {
            self.mark_mutated();
        }
    }

    /// Replaces all voxels at once, e.g. with data loaded from a chunk store.
    ///
    /// # Errors
    /// `TerrainError::CorruptPayload` if `voxels` is not exactly one chunk long.
    pub fn replace_voxels(&mut self, voxels: Vec<VoxelType>) -> TerrainResult<()> {
        if voxels.len() != CHUNK_VOLUME {
            return Err(TerrainError::CorruptPayload(format!(
                "expected {} voxels, got {}",
                CHUNK_VOLUME,
                voxels.len()
            )));
        }
        self.voxels = Arc::new(voxels);
        self.mark_mutated();
        Ok(())
    }

    fn mark_mutated(&mut self) {
        self.revision += 1;
        self.dirty = true;
        match self.state {
            ChunkState::Empty | ChunkState::Generating => {}
            ChunkState::Meshed => {
                self.state = ChunkState::Dirty;
                self.modified = true;
            }
            _ => self.modified = true,
        }
    }

    /// Moves the chunk to `to` if the lifecycle allows it.
    ///
    /// # Errors
    /// `TerrainError::InvalidStateTransition` for edges not in the lifecycle.
    pub fn transition(&mut self, to: ChunkState) -> TerrainResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(TerrainError::InvalidStateTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Marks the start of filling. Only valid on an `Empty` chunk.
    pub fn begin_generation(&mut self) -> TerrainResult<()> {
        self.transition(ChunkState::Generating)
    }

    /// Marks the end of filling. The chunk is left dirty until its first mesh.
    pub fn finish_generation(&mut self) -> TerrainResult<()> {
        self.transition(ChunkState::Generated)?;
        self.dirty = true;
        Ok(())
    }

    /// Revives a chunk that was evicted but is still retained.
    pub fn revive(&mut self) -> TerrainResult<()> {
        let to = if self.dirty || self.mesh.is_none() {
            ChunkState::Dirty
        } else {
            ChunkState::Meshed
        };
        self.transition(to)
    }

    /// Takes an O(1) snapshot of the voxels for a background mesh job.
    pub fn snapshot(&self) -> VoxelSnapshot {
        VoxelSnapshot {
            coord: self.coord,
            revision: self.revision,
            voxels: self.voxels.clone(),
        }
    }

    /// Attaches a mesh built from the voxels at `source_revision`.
    ///
    /// # Returns
    /// `true` if the mesh was adopted. A mesh built from an older revision, or
    /// offered to a chunk that is not waiting for one, is refused and the chunk
    /// stays dirty.
    pub fn attach_mesh(&mut self, mesh: MeshData, source_revision: u64) -> bool {
        if source_revision != self.revision {
            return false;
        }
        if !matches!(
            self.state,
            ChunkState::Generated | ChunkState::Meshed | ChunkState::Dirty
        ) {
            return false;
        }
        self.mesh = Some(Arc::new(mesh));
        self.dirty = false;
        self.state = ChunkState::Meshed;
        true
    }

    /// The attached mesh, if any.
    pub fn mesh(&self) -> Option<Arc<MeshData>> {
        self.mesh.clone()
    }

    /// Clears the `modified` flag after the voxels were handed to a chunk store.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Gets the height of the highest solid voxel in a column.
    ///
    /// # Returns
    /// `None` for an out-of-range column or a column without solid voxels.
    pub fn surface_height(&self, x: i32, z: i32) -> Option<i32> {
        (0..CHUNK_HEIGHT)
            .rev()
            .find(|&y| self.get_voxel(x, y, z).is_solid())
    }

    /// Iterates the non-air voxels with their local positions.
    pub fn visible_voxels(&self) -> chunk_iteration::ChunkVoxelIterator<'_> {
        chunk_iteration::ChunkVoxelIterator::new(self)
    }

    /// Counts voxels of the given type.
    pub fn count(&self, voxel: VoxelType) -> usize {
        self.voxels.iter().filter(|v| **v == voxel).count()
    }

    /// Builds a bit mask with one bit per voxel, set where the voxel is opaque.
    ///
    /// The mask uses the same index order as the voxel array.
    pub fn opacity_mask(voxels: &[VoxelType]) -> BitVec {
        voxels.iter().map(|voxel| voxel.is_opaque()).collect()
    }
}
