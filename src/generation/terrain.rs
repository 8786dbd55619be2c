//! # Noise Terrain Generator
//!
//! Fills chunks from fractal Perlin noise.
//!
//! ## Height
//!
//! ```text
//! height = base_height + (fractal(x * f, z * f) + 1) * amplitude
//! ```
//! floored and clamped to `[1, 255]`. With the defaults terrain lies between
//! y = 40 and y = 80.
//!
//! ## Columns
//!
//! Each column is filled from bedrock to the surface by the [`ColumnProfile`].
//! Columns below sea level are topped up with water. Caves are carved from a
//! separate 3D field, but never within the top few voxels of the surface and
//! never through bedrock.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};
use crate::voxels::{
    block::VoxelType,
    chunk::{Chunk, ChunkCoord, CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_VOLUME},
    world::World,
};

use super::{
    layers::{default_layer_rules, ColumnProfile, LayerRule, SUBSURFACE_DEPTH},
    fill_water,
    noise_field::{derive_seed, FractalParams, NoiseField, Seed},
    should_fill,
    structures::{StructureParams, TreePlacer},
    WorldGenerator,
};

/// Caves use a single octave of 3D noise.
const CAVE_FRACTAL: FractalParams = FractalParams {
    octaves: 1,
    persistence: 1.0,
    lacunarity: 2.0,
};

/// Settings for noise terrain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// World seed.
    pub seed: Seed,
    /// Lowest terrain height.
    pub base_height: i32,
    /// Half the height range above `base_height`.
    pub amplitude: f64,
    /// Horizontal frequency of the height field.
    pub frequency: f64,
    /// Octave settings for the height field.
    pub fractal: FractalParams,
    /// Water fills empty space up to this height.
    pub sea_level: i32,
    /// Whether caves are carved.
    pub caves: bool,
    /// Frequency of the cave field.
    pub cave_frequency: f64,
    /// Cave field values above this are carved out.
    pub cave_threshold: f64,
    /// Surface layering by normalized height.
    pub layers: Vec<LayerRule>,
    /// Tree placement table.
    pub structures: StructureParams,
}

impl Default for TerrainParams {
    fn default() -> Self {
        TerrainParams {
            seed: 0,
            base_height: 40,
            amplitude: 20.0,
            frequency: 0.01,
            fractal: FractalParams::default(),
            sea_level: 50,
            caves: true,
            cave_frequency: 0.05,
            cave_threshold: 0.5,
            layers: default_layer_rules(),
            structures: StructureParams::default(),
        }
    }
}

/// Procedural terrain from fractal noise.
#[derive(Clone, Debug)]
pub struct NoiseTerrainGenerator {
    params: TerrainParams,
    height_field: NoiseField,
    cave_field: NoiseField,
    profile: ColumnProfile,
    trees: TreePlacer,
}

impl NoiseTerrainGenerator {
    /// Creates a generator from validated parameters.
    ///
    /// A malformed layer table is not an error: it is replaced by the default
    /// table and a warning is logged.
    ///
    /// # Errors
    /// `TerrainError::InvalidNoiseParameters` for invalid octave settings or a
    /// non-positive frequency or amplitude.
    pub fn new(params: TerrainParams) -> TerrainResult<Self> {
        params.fractal.validate()?;
        for (name, value) in [
            ("frequency", params.frequency),
            ("amplitude", params.amplitude),
            ("cave_frequency", params.cave_frequency),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(TerrainError::InvalidNoiseParameters(format!(
                    "{} must be > 0, got {}",
                    name, value
                )));
            }
        }
        Ok(Self::build(params))
    }

    /// Creates a generator with default parameters and the given seed.
    pub fn from_seed(seed: Seed) -> Self {
        Self::build(TerrainParams {
            seed,
            ..TerrainParams::default()
        })
    }

    fn build(params: TerrainParams) -> Self {
        let profile = ColumnProfile::or_default(params.layers.clone());
        let trees = TreePlacer::new(params.seed, params.structures.clone());
        debug!("Noise terrain generator created with seed {}", params.seed);
        NoiseTerrainGenerator {
            height_field: NoiseField::from_parts(params.seed, params.frequency, params.fractal),
            cave_field: NoiseField::from_parts(
                derive_seed(params.seed, "caves"),
                params.cave_frequency,
                CAVE_FRACTAL,
            ),
            profile,
            trees,
            params,
        }
    }

    /// The generator's parameters.
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// The active layering.
    pub fn profile(&self) -> &ColumnProfile {
        &self.profile
    }

    /// Re-seeds every field in place.
    pub fn set_seed(&mut self, seed: Seed) {
        self.params.seed = seed;
        self.height_field.set_seed(seed);
        self.cave_field.set_seed(derive_seed(seed, "caves"));
        self.trees.set_seed(seed);
    }

    /// Surface height of a world column.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        let noise = self.height_field.sample_2d(world_x as f64, world_z as f64);
        let height = self.params.base_height as f64 + (noise + 1.0) * self.params.amplitude;
        (height.floor() as i32).clamp(1, CHUNK_HEIGHT - 1)
    }

    /// Height mapped to `[0, 1]` for layer selection.
    fn normalized_height(&self, height: i32) -> f32 {
        let h = (height - self.params.base_height) as f64 / (2.0 * self.params.amplitude);
        h.clamp(0.0, 1.0) as f32
    }

    fn is_cave(&self, world_x: i32, y: i32, world_z: i32) -> bool {
        self.cave_field
            .sample_3d(world_x as f64, y as f64, world_z as f64)
            > self.params.cave_threshold
    }

    /// Fills a fresh voxel array for `coord`.
    ///
    /// # Returns
    /// The voxels and the surface height of each column, indexed `x + 16 * z`.
    fn fill_voxels(&self, coord: ChunkCoord) -> (Vec<VoxelType>, Vec<i32>) {
        let (origin_x, origin_z) = coord.world_origin();
        let mut voxels = vec![VoxelType::Air; CHUNK_VOLUME];
        let mut surfaces = vec![0; (CHUNK_SIZE * CHUNK_SIZE) as usize];

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let world_x = origin_x + x;
                let world_z = origin_z + z;
                let surface = self.surface_height(world_x, world_z);
                let normalized = self.normalized_height(surface);
                surfaces[(x + CHUNK_SIZE * z) as usize] = surface;

                for y in 0..=surface {
                    let depth = surface - y;
                    let voxel = if self.params.caves
                        && y > 0
                        && depth > SUBSURFACE_DEPTH
                        && self.is_cave(world_x, y, world_z)
                    {
                        VoxelType::Air
                    } else {
                        self.profile.column_voxel(y, surface, normalized)
                    };
                    if let Some(index) = Chunk::index(x, y, z) {
                        voxels[index] = voxel;
                    }
                }

                fill_water(&mut voxels, x, z, surface, self.params.sea_level);
            }
        }

        (voxels, surfaces)
    }
}

impl WorldGenerator for NoiseTerrainGenerator {
    fn generate_chunk(&self, chunk: &mut Chunk) -> TerrainResult<()> {
        if !should_fill(chunk) {
            return Ok(());
        }
        let (voxels, _) = self.fill_voxels(chunk.coord());
        chunk.replace_voxels(voxels)
    }

    fn generate_chunk_with_assets(
        &self,
        chunk: &mut Chunk,
        _world: Option<&World>,
    ) -> TerrainResult<()> {
        if !should_fill(chunk) {
            return Ok(());
        }
        let coord = chunk.coord();
        let (mut voxels, surfaces) = self.fill_voxels(coord);
        let trees = self.trees.place_trees(coord, &mut voxels, &surfaces);
        debug!("Placed {} trees in chunk {:?}", trees, coord);
        chunk.replace_voxels(voxels)
    }

    fn height_at(&self, x: i32, z: i32) -> i32 {
        self.surface_height(x, z)
    }

    fn seed(&self) -> Seed {
        self.params.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxels::chunk::ChunkState;

    fn generated(generator: &NoiseTerrainGenerator, coord: ChunkCoord, assets: bool) -> Chunk {
        let mut chunk = Chunk::new(coord);
        chunk.begin_generation().unwrap();
        if assets {
            generator.generate_chunk_with_assets(&mut chunk, None).unwrap();
        } else {
            generator.generate_chunk(&mut chunk).unwrap();
        }
        chunk.finish_generation().unwrap();
        chunk
    }

    #[test]
    fn test_generation_is_deterministic_across_instances() {
        let a = NoiseTerrainGenerator::from_seed(12345);
        let b = NoiseTerrainGenerator::from_seed(12345);
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-3, 7)] {
            assert_eq!(
                generated(&a, coord, true).voxels(),
                generated(&b, coord, true).voxels()
            );
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseTerrainGenerator::from_seed(1);
        let b = NoiseTerrainGenerator::from_seed(2);
        let coord = ChunkCoord::new(4, 4);
        assert_ne!(generated(&a, coord, false).voxels(), generated(&b, coord, false).voxels());
    }

    #[test]
    fn test_adjacent_columns_have_bounded_delta() {
        let generator = NoiseTerrainGenerator::from_seed(12345);
        let mut total = 0;
        let mut max = 0;
        for x in -200..200 {
            let delta = (generator.height_at(x, 17) - generator.height_at(x + 1, 17)).abs();
            total += delta;
            max = max.max(delta);
        }
        assert!(max <= 3, "max delta {}", max);
        assert!((total as f64 / 400.0) < 1.0);
    }

    #[test]
    fn test_heights_stay_in_range() {
        let generator = NoiseTerrainGenerator::from_seed(99);
        for x in (-1000..1000).step_by(37) {
            for z in (-1000..1000).step_by(41) {
                let h = generator.height_at(x, z);
                assert!((40..=80).contains(&h), "height {} at {},{}", h, x, z);
            }
        }
    }

    #[test]
    fn test_column_structure() {
        let generator = NoiseTerrainGenerator::from_seed(12345);
        let chunk = generated(&generator, ChunkCoord::new(0, 0), false);
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let surface = generator.height_at(x, z);
                assert_eq!(chunk.get_voxel(x, 0, z), VoxelType::Bedrock);
                assert!(chunk.get_voxel(x, surface, z).is_solid());
                assert!(!chunk.get_voxel(x, surface + 1, z).is_solid());
                if surface < 50 {
                    assert_eq!(chunk.get_voxel(x, 50, z), VoxelType::Water);
                }
            }
        }
    }

    #[test]
    fn test_negative_coordinates_are_valid() {
        let generator = NoiseTerrainGenerator::from_seed(5);
        let chunk = generated(&generator, ChunkCoord::new(-12, -40), true);
        assert_eq!(chunk.state(), ChunkState::Generated);
        assert!(chunk.count(VoxelType::Bedrock) == 256);
    }

    #[test]
    fn test_unloading_chunk_is_left_untouched() {
        let generator = NoiseTerrainGenerator::from_seed(5);
        let mut chunk = generated(&generator, ChunkCoord::new(0, 0), false);
        chunk.transition(ChunkState::Unloading).unwrap();
        let revision = chunk.revision();
        generator.generate_chunk(&mut chunk).unwrap();
        assert_eq!(chunk.revision(), revision);
    }

    #[test]
    fn test_set_seed_matches_fresh_generator() {
        let mut generator = NoiseTerrainGenerator::from_seed(1);
        generator.set_seed(777);
        let fresh = NoiseTerrainGenerator::from_seed(777);
        assert_eq!(generator.seed(), 777);
        let coord = ChunkCoord::new(2, -1);
        assert_eq!(
            generated(&generator, coord, true).voxels(),
            generated(&fresh, coord, true).voxels()
        );
    }

    #[test]
    fn test_configured_noise_shapes_the_height_field() {
        let fractal = FractalParams::new(2, 0.7, 3.0).unwrap();
        let params = TerrainParams {
            seed: 31,
            frequency: 0.03,
            fractal,
            ..TerrainParams::default()
        };
        let generator = NoiseTerrainGenerator::new(params).unwrap();
        let expected = NoiseField::with_params(31, 0.03, fractal).unwrap();

        assert_eq!(generator.height_field.frequency(), 0.03);
        assert_eq!(generator.height_field.fractal_params(), fractal);
        for x in (-300..300).step_by(23) {
            let noise = expected.sample_2d(x as f64, 12.0);
            let height = ((40.0 + (noise + 1.0) * 20.0).floor() as i32).clamp(1, CHUNK_HEIGHT - 1);
            assert_eq!(generator.height_at(x, 12), height);
        }

        let defaults = NoiseTerrainGenerator::from_seed(31);
        assert!((-300..300).any(|x| defaults.height_at(x, 12) != generator.height_at(x, 12)));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let params = TerrainParams {
            fractal: FractalParams {
                octaves: 0,
                ..FractalParams::default()
            },
            ..TerrainParams::default()
        };
        assert!(matches!(
            NoiseTerrainGenerator::new(params),
            Err(TerrainError::InvalidNoiseParameters(_))
        ));
    }

    #[test]
    fn test_malformed_layers_fall_back_without_failing() {
        let params = TerrainParams {
            layers: vec![LayerRule::new(0.5, 1.0, VoxelType::Ice)],
            ..TerrainParams::default()
        };
        let generator = NoiseTerrainGenerator::new(params).unwrap();
        assert_eq!(generator.profile(), &ColumnProfile::default());
    }
}
