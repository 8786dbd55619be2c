//! # Heightmap Terrain
//!
//! An alternative height source that reads elevations from an external grid
//! instead of procedural noise.
//!
//! ## Sampling
//!
//! World columns are mapped to grid coordinates by dividing by
//! `horizontal_scale`. Heights between texels are bilinearly interpolated from
//! the four surrounding texels. What happens past the grid edge is chosen per
//! axis by [`EdgeMode`]:
//! - `Zero`: texels outside the grid read as 0
//! - `Clamp`: the nearest edge texel is repeated
//! - `Wrap`: the grid tiles
//!
//! ## Columns
//!
//! World height is `min + h * (max - min) * vertical_scale`. Layers are picked
//! by where the height falls in that scaled range, and columns below
//! `sea_level` are topped up with water like noise terrain.
//!
//! ## Loading
//!
//! Grids load from grayscale images through the `image` crate (pixel / 255)
//! or from an in-memory `Vec<f32>`.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::voxels::{
    chunk::{Chunk, CHUNK_HEIGHT, CHUNK_SIZE},
    world::World,
};

use super::{
    fill_water,
    layers::{ColumnProfile, LayerRule},
    noise_field::Seed,
    should_fill, WorldGenerator,
};

/// How samples outside the grid are resolved along one axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeMode {
    /// Outside the grid the height is 0.
    #[default]
    Zero,
    /// Repeat the edge texel.
    Clamp,
    /// Tile the grid.
    Wrap,
}

impl EdgeMode {
    fn resolve(self, index: i64, len: usize) -> Option<usize> {
        let len_i = len as i64;
        match self {
            EdgeMode::Zero => (0..len_i).contains(&index).then_some(index as usize),
            EdgeMode::Clamp => Some(index.clamp(0, len_i - 1) as usize),
            EdgeMode::Wrap => Some(index.rem_euclid(len_i) as usize),
        }
    }
}

/// A grid of normalized elevations in `[0, 1]`, stored row by row (`z * width + x`).
#[derive(Clone, Debug, PartialEq)]
pub struct HeightmapData {
    /// Texels along X.
    pub width: usize,
    /// Texels along Z.
    pub height: usize,
    heights: Vec<f32>,
}

impl HeightmapData {
    /// Creates a heightmap from an in-memory grid.
    ///
    /// # Errors
    /// `TerrainError::HeightmapLoadFailure` for an empty grid, a length that
    /// does not match `width * height`, or values outside `[0, 1]`.
    pub fn from_grid(width: usize, height: usize, heights: Vec<f32>) -> TerrainResult<Self> {
        if width == 0 || height == 0 {
            return Err(TerrainError::HeightmapLoadFailure(format!(
                "empty heightmap ({}x{})",
                width, height
            )));
        }
        if heights.len() != width * height {
            return Err(TerrainError::HeightmapLoadFailure(format!(
                "expected {} samples for {}x{}, got {}",
                width * height,
                width,
                height,
                heights.len()
            )));
        }
        if let Some(bad) = heights.iter().find(|h| !(0.0..=1.0).contains(*h)) {
            return Err(TerrainError::HeightmapLoadFailure(format!(
                "sample {} is outside [0, 1]",
                bad
            )));
        }
        Ok(HeightmapData {
            width,
            height,
            heights,
        })
    }

    /// Loads a heightmap from an image file, converting it to grayscale.
    ///
    /// # Errors
    /// `TerrainError::HeightmapLoadFailure` if the file is missing, cannot be
    /// decoded or has no pixels.
    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref();
        info!("Loading heightmap from {}", path.display());

        let image = image::open(path)
            .map_err(|err| {
                TerrainError::HeightmapLoadFailure(format!("{}: {}", path.display(), err))
            })?
            .to_luma8();

        let (width, height) = image.dimensions();
        let heights = image.pixels().map(|pixel| pixel.0[0] as f32 / 255.0).collect();
        let data = Self::from_grid(width as usize, height as usize, heights)?;

        info!("Heightmap loaded: {}x{}", data.width, data.height);
        Ok(data)
    }

    /// The texel at integer grid coordinates, or 0 outside the grid.
    pub fn height_at(&self, x: i64, z: i64) -> f32 {
        if x < 0 || z < 0 || x as usize >= self.width || z as usize >= self.height {
            return 0.0;
        }
        self.heights[z as usize * self.width + x as usize]
    }

    /// Bilinearly interpolated height at fractional grid coordinates.
    pub fn sample(&self, x: f32, z: f32, edge_x: EdgeMode, edge_z: EdgeMode) -> f32 {
        let x0 = x.floor();
        let z0 = z.floor();
        let fx = x - x0;
        let fz = z - z0;
        let (x0, z0) = (x0 as i64, z0 as i64);

        let texel = |xi: i64, zi: i64| -> f32 {
            match (
                edge_x.resolve(xi, self.width),
                edge_z.resolve(zi, self.height),
            ) {
                (Some(xr), Some(zr)) => self.heights[zr * self.width + xr],
                _ => 0.0,
            }
        };

        let h00 = texel(x0, z0);
        let h10 = texel(x0 + 1, z0);
        let h01 = texel(x0, z0 + 1);
        let h11 = texel(x0 + 1, z0 + 1);

        let h0 = h00 * (1.0 - fx) + h10 * fx;
        let h1 = h01 * (1.0 - fx) + h11 * fx;
        h0 * (1.0 - fz) + h1 * fz
    }
}

/// Settings for heightmap terrain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightmapParams {
    /// World height of a 0 sample.
    pub min_height: f32,
    /// World height of a 1 sample (before vertical scaling).
    pub max_height: f32,
    /// Multiplier applied to the sampled range.
    pub vertical_scale: f32,
    /// World units per texel.
    pub horizontal_scale: f32,
    /// Edge handling along X.
    pub edge_x: EdgeMode,
    /// Edge handling along Z.
    pub edge_z: EdgeMode,
    /// Water fills empty space up to this height.
    pub sea_level: i32,
    /// Surface layering. Malformed tables fall back to the default.
    pub layers: Vec<LayerRule>,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        HeightmapParams {
            min_height: 0.0,
            max_height: 128.0,
            vertical_scale: 1.0,
            horizontal_scale: 1.0,
            edge_x: EdgeMode::Zero,
            edge_z: EdgeMode::Zero,
            sea_level: 50,
            layers: super::layers::default_layer_rules(),
        }
    }
}

/// Fills chunks from a heightmap.
#[derive(Clone, Debug)]
pub struct HeightmapGenerator {
    data: HeightmapData,
    params: HeightmapParams,
    profile: ColumnProfile,
    seed: Seed,
}

impl HeightmapGenerator {
    /// Creates a generator from loaded heightmap data.
    pub fn new(data: HeightmapData, params: HeightmapParams) -> Self {
        let profile = ColumnProfile::or_default(params.layers.clone());
        info!(
            "Heightmap generator ready ({}x{}, heights {}..{})",
            data.width, data.height, params.min_height, params.max_height
        );
        HeightmapGenerator {
            data,
            params,
            profile,
            seed: 0,
        }
    }

    /// Loads the heightmap image at `path` and creates a generator for it.
    ///
    /// # Errors
    /// `TerrainError::HeightmapLoadFailure` if the image cannot be loaded.
    pub fn from_file(path: impl AsRef<Path>, params: HeightmapParams) -> TerrainResult<Self> {
        Ok(Self::new(HeightmapData::load(path)?, params))
    }

    /// The underlying grid.
    pub fn data(&self) -> &HeightmapData {
        &self.data
    }

    /// The seed reported through [`WorldGenerator::seed`]. Heightmap terrain
    /// does not use it.
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Continuous world height at a world column.
    pub fn terrain_height(&self, world_x: i32, world_z: i32) -> f32 {
        let scale = if self.params.horizontal_scale > 0.0 {
            self.params.horizontal_scale
        } else {
            1.0
        };
        let h = self.data.sample(
            world_x as f32 / scale,
            world_z as f32 / scale,
            self.params.edge_x,
            self.params.edge_z,
        );
        let p = &self.params;
        p.min_height + h * (p.max_height - p.min_height) * p.vertical_scale
    }

    /// Height mapped to `[0, 1]` over the scaled height range.
    fn normalized_height(&self, height: f32) -> f32 {
        let p = &self.params;
        let range = (p.max_height - p.min_height) * p.vertical_scale;
        if !(range > 0.0) {
            return 0.0;
        }
        ((height - self.params.min_height) / range).clamp(0.0, 1.0)
    }
}

impl WorldGenerator for HeightmapGenerator {
    fn generate_chunk(&self, chunk: &mut Chunk) -> TerrainResult<()> {
        if !should_fill(chunk) {
            return Ok(());
        }

        let (origin_x, origin_z) = chunk.coord().world_origin();
        let mut voxels = chunk.voxels().to_vec();

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let height = self.terrain_height(origin_x + x, origin_z + z);
                let surface = (height.floor() as i32).clamp(0, CHUNK_HEIGHT - 1);
                let normalized = self.normalized_height(height);

                for y in 0..CHUNK_HEIGHT {
                    if let Some(index) = Chunk::index(x, y, z) {
                        voxels[index] = self.profile.column_voxel(y, surface, normalized);
                    }
                }
                fill_water(&mut voxels, x, z, surface, self.params.sea_level);
            }
        }

        chunk.replace_voxels(voxels)
    }

    fn generate_chunk_with_assets(
        &self,
        chunk: &mut Chunk,
        _world: Option<&World>,
    ) -> TerrainResult<()> {
        self.generate_chunk(chunk)
    }

    fn height_at(&self, x: i32, z: i32) -> i32 {
        (self.terrain_height(x, z).floor() as i32).clamp(0, CHUNK_HEIGHT - 1)
    }

    fn seed(&self) -> Seed {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxels::{block::VoxelType, chunk::ChunkCoord};

    fn ramp() -> HeightmapData {
        // 0.0 0.5
        // 0.5 1.0
        HeightmapData::from_grid(2, 2, vec![0.0, 0.5, 0.5, 1.0]).unwrap()
    }

    #[test]
    fn test_integer_lookup_outside_bounds_is_zero() {
        let data = ramp();
        assert_eq!(data.height_at(1, 1), 1.0);
        assert_eq!(data.height_at(-1, 0), 0.0);
        assert_eq!(data.height_at(2, 0), 0.0);
        assert_eq!(data.height_at(0, 5), 0.0);
    }

    #[test]
    fn test_bilinear_midpoint_interpolates() {
        let data = ramp();
        let mid = data.sample(0.5, 0.5, EdgeMode::Clamp, EdgeMode::Clamp);
        assert!((mid - 0.5).abs() < 1e-6);
        let edge = data.sample(0.5, 0.0, EdgeMode::Clamp, EdgeMode::Clamp);
        assert!((edge - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_edge_modes() {
        let data = ramp();
        assert_eq!(data.sample(5.0, 5.0, EdgeMode::Zero, EdgeMode::Zero), 0.0);
        assert_eq!(data.sample(5.0, 5.0, EdgeMode::Clamp, EdgeMode::Clamp), 1.0);
        // Wrapping tiles the grid with period 2.
        assert_eq!(
            data.sample(3.0, 1.0, EdgeMode::Wrap, EdgeMode::Wrap),
            data.sample(1.0, 1.0, EdgeMode::Wrap, EdgeMode::Wrap)
        );
        assert_eq!(
            data.sample(-2.0, 0.0, EdgeMode::Wrap, EdgeMode::Wrap),
            data.sample(0.0, 0.0, EdgeMode::Wrap, EdgeMode::Wrap)
        );
    }

    #[test]
    fn test_invalid_grids_fail_to_load() {
        assert!(matches!(
            HeightmapData::from_grid(0, 3, Vec::new()),
            Err(TerrainError::HeightmapLoadFailure(_))
        ));
        assert!(matches!(
            HeightmapData::from_grid(2, 2, vec![0.0; 3]),
            Err(TerrainError::HeightmapLoadFailure(_))
        ));
        assert!(matches!(
            HeightmapData::from_grid(1, 1, vec![2.0]),
            Err(TerrainError::HeightmapLoadFailure(_))
        ));
    }

    #[test]
    fn test_missing_file_fails_to_load() {
        let path = std::env::temp_dir().join("voxel_terrain_missing_heightmap.png");
        assert!(matches!(
            HeightmapData::load(&path),
            Err(TerrainError::HeightmapLoadFailure(_))
        ));
    }

    #[test]
    fn test_image_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "voxel_terrain_heightmap_{}.png",
            std::process::id()
        ));
        let image = image::GrayImage::from_fn(4, 3, |x, y| image::Luma([(x * 60 + y) as u8]));
        image.save(&path).unwrap();

        let data = HeightmapData::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((data.width, data.height), (4, 3));
        assert!((data.height_at(3, 2) - 182.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_generator_fills_columns_to_sampled_height() {
        let data = HeightmapData::from_grid(16, 16, vec![0.5; 256]).unwrap();
        let generator = HeightmapGenerator::new(data, HeightmapParams::default());
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.begin_generation().unwrap();
        generator.generate_chunk(&mut chunk).unwrap();

        assert_eq!(generator.height_at(3, 3), 64);
        assert_eq!(chunk.surface_height(3, 3), Some(64));
        assert_eq!(chunk.get_voxel(3, 64, 3), VoxelType::Grass);
        assert_eq!(chunk.get_voxel(3, 0, 3), VoxelType::Bedrock);
        assert_eq!(chunk.get_voxel(3, 65, 3), VoxelType::Air);
    }

    fn filled(generator: &HeightmapGenerator) -> Chunk {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.begin_generation().unwrap();
        generator.generate_chunk(&mut chunk).unwrap();
        chunk
    }

    #[test]
    fn test_low_columns_are_flooded_to_sea_level() {
        let data = HeightmapData::from_grid(16, 16, vec![0.25; 256]).unwrap();
        let generator = HeightmapGenerator::new(data, HeightmapParams::default());
        let chunk = filled(&generator);

        assert_eq!(generator.height_at(3, 3), 32);
        assert_eq!(chunk.get_voxel(3, 32, 3), VoxelType::Sand);
        for y in 33..=50 {
            assert_eq!(chunk.get_voxel(3, y, 3), VoxelType::Water, "y = {}", y);
        }
        assert_eq!(chunk.get_voxel(3, 51, 3), VoxelType::Air);
        assert_eq!(chunk.count(VoxelType::Water), 18 * 256);
    }

    #[test]
    fn test_vertical_scale_shapes_height_and_layers() {
        let data = HeightmapData::from_grid(16, 16, vec![0.5; 256]).unwrap();
        let params = HeightmapParams {
            vertical_scale: 0.5,
            sea_level: 0,
            ..HeightmapParams::default()
        };
        let generator = HeightmapGenerator::new(data, params);
        let chunk = filled(&generator);

        // Half of the halved range: still mid-height for layering.
        assert_eq!(generator.height_at(3, 3), 32);
        assert_eq!(chunk.get_voxel(3, 32, 3), VoxelType::Grass);
        assert_eq!(chunk.count(VoxelType::Water), 0);
    }
}
