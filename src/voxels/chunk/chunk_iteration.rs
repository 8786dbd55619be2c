//! # Chunk Iteration Module
//!
//! Provides iteration over the visible voxels of a chunk. Air is skipped, so
//! sparse chunks iterate quickly.

use cgmath::Point3;

use crate::voxels::block::VoxelType;

use super::Chunk;

/// An iterator over the non-air voxels of a voxel array.
///
/// Voxels are yielded in storage order (`x` fastest, then `z`, then `y`)
/// together with their chunk-local position.
pub struct ChunkVoxelIterator<'a> {
    voxels: &'a [VoxelType],
    index: usize,
}

impl<'a> ChunkVoxelIterator<'a> {
    /// Creates an iterator over a chunk's voxels.
    pub fn new(chunk: &'a Chunk) -> Self {
        Self::from_voxels(chunk.voxels())
    }

    /// Creates an iterator over a raw voxel array in chunk order.
    pub fn from_voxels(voxels: &'a [VoxelType]) -> Self {
        ChunkVoxelIterator { voxels, index: 0 }
    }
}

impl Iterator for ChunkVoxelIterator<'_> {
    type Item = (Point3<i32>, VoxelType);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.voxels.len() {
            let index = self.index;
            self.index += 1;
            let voxel = self.voxels[index];
            if voxel.is_visible() {
                return Some((Chunk::position_of(index), voxel));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxels::chunk::ChunkCoord;

    #[test]
    fn test_iterates_only_visible_voxels_in_order() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.set_voxel(5, 1, 0, VoxelType::Dirt).unwrap();
        chunk.set_voxel(2, 0, 9, VoxelType::Stone).unwrap();

        let visited: Vec<_> = ChunkVoxelIterator::new(&chunk).collect();
        assert_eq!(
            visited,
            vec![
                (Point3::new(2, 0, 9), VoxelType::Stone),
                (Point3::new(5, 1, 0), VoxelType::Dirt),
            ]
        );
    }
}
