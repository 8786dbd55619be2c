//! # Configuration
//!
//! Every tunable of the crate in one serde tree, loadable from JSON.
//!
//! ```json
//! {
//!   "terrain": { "seed": 12345, "base_height": 40, "amplitude": 20.0 },
//!   "heightmap": { "path": "assets/elevation.png", "params": { "max_height": 96.0 } },
//!   "streaming": { "view_distance": 6, "auto_persist": true },
//!   "persistence": { "directory": "saves/world" }
//! }
//! ```
//!
//! Every field has a default, so an empty object is a valid config. Malformed
//! JSON is reported as `TerrainError::Config`; a malformed layer table inside
//! valid JSON is not an error and falls back to the built-in layering when the
//! generator is built.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::TerrainResult;
use crate::generation::{HeightmapGenerator, HeightmapParams, NoiseTerrainGenerator, TerrainParams, WorldGenerator};
use crate::persistence::{ChunkStore, DirectoryChunkStore, MemoryChunkStore};
use crate::streaming::StreamerConfig;
use crate::voxels::world::World;

/// An external elevation grid to generate terrain from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightmapSource {
    /// Grayscale image with one pixel per world column.
    pub path: PathBuf,
    /// How the image maps to terrain.
    #[serde(default)]
    pub params: HeightmapParams,
}

/// Where edited chunks are kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory for chunk files. `None` keeps saves in memory.
    pub directory: Option<PathBuf>,
    /// Compress saved payloads.
    pub compress: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            directory: None,
            compress: true,
        }
    }
}

/// The root configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Procedural terrain settings, also providing the seed.
    pub terrain: TerrainParams,
    /// Generate from an elevation grid instead of noise.
    pub heightmap: Option<HeightmapSource>,
    /// Streamer tuning.
    pub streaming: StreamerConfig,
    /// Chunk store settings.
    pub persistence: PersistenceConfig,
}

impl TerrainConfig {
    /// Parses a config from JSON text.
    ///
    /// # Errors
    /// `TerrainError::Config` if the text is not a valid config.
    pub fn from_json_str(json: &str) -> TerrainResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    /// `TerrainError::Io` if the file cannot be read, `TerrainError::Config` if
    /// it does not parse.
    pub fn from_json_file(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Serializes the config as pretty-printed JSON.
    pub fn to_json_string(&self) -> TerrainResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the generator the config describes.
    ///
    /// # Errors
    /// `TerrainError::HeightmapLoadFailure` for an unreadable elevation grid,
    /// `TerrainError::InvalidNoiseParameters` for out-of-range noise settings.
    pub fn build_generator(&self) -> TerrainResult<Arc<dyn WorldGenerator>> {
        match &self.heightmap {
            Some(source) => {
                let generator = HeightmapGenerator::from_file(&source.path, source.params.clone())?
                    .with_seed(self.terrain.seed);
                Ok(Arc::new(generator))
            }
            None => Ok(Arc::new(NoiseTerrainGenerator::new(self.terrain.clone())?)),
        }
    }

    /// Builds the chunk store the config describes.
    pub fn build_store(&self) -> TerrainResult<Arc<dyn ChunkStore>> {
        match &self.persistence.directory {
            Some(directory) => Ok(Arc::new(
                DirectoryChunkStore::open(directory)?.with_compression(self.persistence.compress),
            )),
            None => Ok(Arc::new(MemoryChunkStore::new())),
        }
    }

    /// Builds an empty world with the configured generator and store.
    pub fn build_world(&self) -> TerrainResult<World> {
        Ok(World::new(self.build_generator()?).with_store(self.build_store()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;
    use crate::voxels::block::VoxelType;

    #[test]
    fn test_empty_object_is_default() {
        let config = TerrainConfig::from_json_str("{}").unwrap();
        assert_eq!(config, TerrainConfig::default());
        assert_eq!(config.streaming.view_distance, 8);
        assert!(config.streaming.auto_persist);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = TerrainConfig::from_json_str(
            r#"{ "terrain": { "seed": 99 }, "streaming": { "view_distance": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.terrain.seed, 99);
        assert_eq!(config.terrain.base_height, TerrainParams::default().base_height);
        assert_eq!(config.streaming.view_distance, 3);
        assert_eq!(config.streaming.max_attempts, 3);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            TerrainConfig::from_json_str("{ \"terrain\": "),
            Err(TerrainError::Config(_))
        ));
        assert!(matches!(
            TerrainConfig::from_json_str(r#"{ "streaming": { "view_distance": "far" } }"#),
            Err(TerrainError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            TerrainConfig::from_json_file("/definitely/not/here.json"),
            Err(TerrainError::Io(_))
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let mut config = TerrainConfig::default();
        config.terrain.seed = 4242;
        config.streaming.auto_persist = false;
        let json = config.to_json_string().unwrap();
        assert_eq!(TerrainConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_heightmap_fails_to_build() {
        let config = TerrainConfig {
            heightmap: Some(HeightmapSource {
                path: PathBuf::from("/definitely/not/here.png"),
                params: HeightmapParams::default(),
            }),
            ..TerrainConfig::default()
        };
        assert!(matches!(
            config.build_generator(),
            Err(TerrainError::HeightmapLoadFailure(_))
        ));
    }

    #[test]
    fn test_built_world_generates() {
        let config = TerrainConfig::from_json_str(r#"{ "terrain": { "seed": 12345 } }"#).unwrap();
        let mut world = config.build_world().unwrap();
        world
            .generate_chunk_at(crate::voxels::chunk::ChunkCoord::new(0, 0))
            .unwrap();
        assert_eq!(world.voxel_at(0, 0, 0), Some(VoxelType::Bedrock));
        assert_eq!(world.generator().seed(), 12345);
    }
}
