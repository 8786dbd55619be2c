//! # Voxel Data
//!
//! This module contains the data model of the voxel world: what a voxel is,
//! how voxels are stored in chunks, and how chunks are owned by the world.
//!
//! ## Architecture
//!
//! * **Block**: Voxel types, their flags and the six face directions
//! * **Chunk**: Dense 16x256x16 voxel storage with dirty tracking and a
//!   generation lifecycle
//! * **World**: The coordinate to chunk map owned by the consumer thread
//!
//! ## Thread Safety
//!
//! * Chunk voxels are shared copy-on-write, so mesh jobs read snapshots while
//!   the consumer keeps editing
//! * The world itself is never shared; workers hand results back to it

pub mod block;
pub mod chunk;
pub mod world;
