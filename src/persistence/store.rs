//! Chunk stores: where saved voxels live between sessions or evictions.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::core::MtResource;
use crate::error::{TerrainError, TerrainResult};
use crate::voxels::{block::VoxelType, chunk::ChunkCoord};

use super::codec::{decode_chunk, encode_chunk};

/// Saved chunk voxels, keyed by chunk coordinate.
///
/// Stores are shared between the consumer thread and workers, so both methods
/// take `&self`.
pub trait ChunkStore: Send + Sync {
    /// Loads the saved voxels of a chunk.
    ///
    /// # Returns
    /// `Ok(None)` if nothing was saved for `coord`.
    fn load(&self, coord: ChunkCoord) -> TerrainResult<Option<Vec<VoxelType>>>;

    /// Saves a chunk's voxels, replacing anything saved before.
    fn save(&self, coord: ChunkCoord, voxels: &[VoxelType]) -> TerrainResult<()>;
}

/// An in-memory store holding encoded payloads.
#[derive(Clone)]
pub struct MemoryChunkStore {
    payloads: MtResource<HashMap<ChunkCoord, Vec<u8>>>,
    compress: bool,
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChunkStore {
    /// Creates an empty store that compresses payloads.
    pub fn new() -> Self {
        MemoryChunkStore {
            payloads: MtResource::default(),
            compress: true,
        }
    }

    /// Number of saved chunks.
    pub fn len(&self) -> usize {
        self.payloads.get().len()
    }

    /// Whether nothing was saved yet.
    pub fn is_empty(&self) -> bool {
        self.payloads.get().is_empty()
    }

    /// Whether a chunk was saved.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.payloads.get().contains_key(&coord)
    }

    /// The encoded payload of a saved chunk.
    pub fn payload(&self, coord: ChunkCoord) -> Option<Vec<u8>> {
        self.payloads.get().get(&coord).cloned()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn load(&self, coord: ChunkCoord) -> TerrainResult<Option<Vec<VoxelType>>> {
        let payloads = self.payloads.get();
        match payloads.get(&coord) {
            Some(bytes) => Ok(Some(decode_chunk(bytes)?.voxels)),
            None => Ok(None),
        }
    }

    fn save(&self, coord: ChunkCoord, voxels: &[VoxelType]) -> TerrainResult<()> {
        let bytes = encode_chunk(coord, voxels, self.compress)?;
        self.payloads.get_mut().insert(coord, bytes);
        Ok(())
    }
}

/// A store writing one `chunk_<x>_<z>.vxc` file per chunk into a directory.
#[derive(Clone, Debug)]
pub struct DirectoryChunkStore {
    root: PathBuf,
    compress: bool,
}

impl DirectoryChunkStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    ///
    /// # Errors
    /// `TerrainError::Io` if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> TerrainResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("Chunk store opened at {}", root.display());
        Ok(DirectoryChunkStore {
            root,
            compress: true,
        })
    }

    /// Turns payload compression on or off for future saves.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// The directory holding the chunk files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file a chunk is saved to.
    pub fn path_for(&self, coord: ChunkCoord) -> PathBuf {
        self.root.join(format!("chunk_{}_{}.vxc", coord.x, coord.z))
    }
}

impl ChunkStore for DirectoryChunkStore {
    fn load(&self, coord: ChunkCoord) -> TerrainResult<Option<Vec<VoxelType>>> {
        let path = self.path_for(coord);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let payload = decode_chunk(&bytes)?;
        if payload.coord != coord {
            return Err(TerrainError::CorruptPayload(format!(
                "{} holds chunk {:?}",
                path.display(),
                payload.coord
            )));
        }
        debug!("Loaded chunk {:?} from {}", coord, path.display());
        Ok(Some(payload.voxels))
    }

    fn save(&self, coord: ChunkCoord, voxels: &[VoxelType]) -> TerrainResult<()> {
        let bytes = encode_chunk(coord, voxels, self.compress)?;
        let path = self.path_for(coord);
        // Write then rename so a crash never leaves a half-written chunk.
        let tmp = path.with_extension("vxc.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        debug!("Saved chunk {:?} to {}", coord, path.display());
        Ok(())
    }
}
