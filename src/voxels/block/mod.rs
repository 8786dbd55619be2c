//! # Block Module
//!
//! This module provides voxel type definitions and the face geometry shared by
//! the filler and the mesher.

pub mod block_side;
pub mod voxel_type;

pub use block_side::BlockSide;
pub use voxel_type::{VoxelType, VoxelTypeSize, VOXEL_TYPE_COUNT};
