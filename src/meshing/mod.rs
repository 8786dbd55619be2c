//! # Meshing Module
//!
//! Converts chunk voxels into render geometry.
//!
//! ## Components
//! - `face`: A single quad, possibly covering many voxel faces
//! - `greedy`: The greedy mesher that merges coplanar faces of one voxel type
//! - `mesh`: Per-side vertex and index buffers built from faces
//! - `vertex`: The vertex layout handed to the renderer
//!
//! A face is emitted wherever a visible voxel borders a voxel that is not
//! opaque and not of the same type. Water next to water therefore produces no
//! face, while stone next to water does.
//!
//! The streamer meshes through the [`ChunkMesher`] trait so the mesher can be
//! swapped; [`GreedyMesher`] is the default.

use crate::error::TerrainResult;
use crate::voxels::block::VoxelType;

pub mod face;
pub mod greedy;
pub mod mesh;
pub mod vertex;

pub use face::Face;
pub use greedy::{greedy_faces, greedy_mesh};
pub use mesh::{MeshData, MeshSide};
pub use vertex::Vertex;

/// Builds the mesh of one chunk on a worker thread.
pub trait ChunkMesher: Send + Sync {
    /// Meshes a whole chunk of voxels in [`Chunk::index`] order.
    ///
    /// [`Chunk::index`]: crate::voxels::chunk::Chunk::index
    fn mesh(&self, voxels: &[VoxelType]) -> TerrainResult<MeshData>;
}

/// The greedy mesher behind [`greedy_mesh`].
#[derive(Copy, Clone, Debug, Default)]
pub struct GreedyMesher;

impl ChunkMesher for GreedyMesher {
    fn mesh(&self, voxels: &[VoxelType]) -> TerrainResult<MeshData> {
        Ok(greedy_mesh(voxels))
    }
}
