//! # Persistence
//!
//! The boundary to whatever keeps edited chunks around.
//!
//! ## Components
//! - `codec`: The binary chunk payload format
//! - `store`: The [`ChunkStore`] trait with in-memory and directory stores
//!
//! Saved voxels take precedence over procedural generation: when a store has
//! a chunk, loading it replaces filling it.

pub mod codec;
pub mod store;

pub use codec::{decode_chunk, encode_chunk, ChunkPayload};
pub use store::{ChunkStore, DirectoryChunkStore, MemoryChunkStore};
