//! # Structure Placement
//!
//! Places trees on freshly filled terrain.
//!
//! A column gets a tree only when all of these hold:
//! 1. A low-frequency gate noise field is above the gate threshold, so trees
//!    clump into forests and leave open plains.
//! 2. The column's own random roll is below the placement probability.
//! 3. The surface voxel is one of the allowed surfaces.
//! 4. The trunk and crown fit below the chunk top and every trunk cell is air.
//!
//! The random roll comes from an RNG seeded by the world seed and the world
//! column, so a column makes the same decision no matter which chunk is
//! generated first. Trunks and leaves only ever replace air. Crowns that would
//! cross a horizontal chunk edge are clipped.

use serde::{Deserialize, Serialize};

use crate::voxels::{
    block::VoxelType,
    chunk::{Chunk, ChunkCoord, CHUNK_HEIGHT, CHUNK_SIZE},
};

use super::noise_field::{derive_seed, NoiseField, Seed};

/// Tree placement table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureParams {
    /// Whether trees are placed at all.
    pub enabled: bool,
    /// Chance that an eligible column grows a tree.
    pub probability: f64,
    /// Frequency of the forest gate noise.
    pub gate_frequency: f64,
    /// Gate noise must exceed this for a column to be eligible.
    pub gate_threshold: f64,
    /// Surface voxels trees may grow on.
    pub allowed_surfaces: Vec<VoxelType>,
    /// Shortest trunk.
    pub trunk_min_height: i32,
    /// Tallest trunk.
    pub trunk_max_height: i32,
    /// Horizontal radius of the leaf crown.
    pub foliage_radius: i32,
}

impl Default for StructureParams {
    fn default() -> Self {
        StructureParams {
            enabled: true,
            probability: 0.02,
            gate_frequency: 0.02,
            gate_threshold: -0.2,
            allowed_surfaces: vec![VoxelType::Grass, VoxelType::Dirt],
            trunk_min_height: 4,
            trunk_max_height: 6,
            foliage_radius: 2,
        }
    }
}

/// Deterministic per-column seed. FNV-1a over the world seed and column.
fn column_seed(seed: Seed, world_x: i32, world_z: i32) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    let bytes = seed
        .to_le_bytes()
        .into_iter()
        .chain(world_x.to_le_bytes())
        .chain(world_z.to_le_bytes());
    for byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Places trees into a chunk's voxel array.
#[derive(Clone, Debug)]
pub struct TreePlacer {
    params: StructureParams,
    seed: Seed,
    gate: NoiseField,
}

impl TreePlacer {
    /// Creates a placer for the given world seed.
    pub fn new(seed: Seed, params: StructureParams) -> Self {
        TreePlacer {
            params,
            seed,
            gate: NoiseField::new(derive_seed(seed, "tree-gate")),
        }
    }

    /// Re-seeds the placer and its gate field.
    pub fn set_seed(&mut self, seed: Seed) {
        self.seed = seed;
        self.gate.set_seed(derive_seed(seed, "tree-gate"));
    }

    /// Places trees on every eligible column of a chunk.
    ///
    /// # Arguments
    /// * `coord` - The chunk the voxels belong to
    /// * `voxels` - The chunk's voxels in storage order
    /// * `surface_heights` - Surface y per column, indexed `x + 16 * z`
    ///
    /// # Returns
    /// The number of trees placed.
    pub fn place_trees(
        &self,
        coord: ChunkCoord,
        voxels: &mut [VoxelType],
        surface_heights: &[i32],
    ) -> usize {
        if !self.params.enabled || self.params.probability <= 0.0 {
            return 0;
        }

        let (origin_x, origin_z) = coord.world_origin();
        let mut placed = 0;

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let world_x = origin_x + x;
                let world_z = origin_z + z;

                let gate = self.gate.perlin_2d(
                    world_x as f64 * self.params.gate_frequency,
                    world_z as f64 * self.params.gate_frequency,
                );
                if gate <= self.params.gate_threshold {
                    continue;
                }

                let mut rng = fastrand::Rng::with_seed(column_seed(self.seed, world_x, world_z));
                if rng.f64() >= self.params.probability {
                    continue;
                }
                let low = self.params.trunk_min_height.max(1);
                let high = self.params.trunk_max_height.max(low);
                let trunk_height = rng.i32(low..=high);

                let surface = surface_heights[(x + CHUNK_SIZE * z) as usize];
                if self.can_place(voxels, x, surface, z, trunk_height) {
                    self.write_tree(voxels, x, surface + 1, z, trunk_height);
                    placed += 1;
                }
            }
        }

        placed
    }

    /// Checks the surface type and the vertical clearance for a trunk.
    fn can_place(&self, voxels: &[VoxelType], x: i32, surface: i32, z: i32, trunk_height: i32) -> bool {
        let surface_voxel = match Chunk::index(x, surface, z) {
            Some(index) => voxels[index],
            None => return false,
        };
        if !self.params.allowed_surfaces.contains(&surface_voxel) {
            return false;
        }

        let base = surface + 1;
        // Crown reaches two voxels above the trunk top.
        if base + trunk_height + 2 > CHUNK_HEIGHT {
            return false;
        }

        (base..base + trunk_height).all(|y| {
            Chunk::index(x, y, z).is_some_and(|index| voxels[index] == VoxelType::Air)
        })
    }

    fn write_tree(&self, voxels: &mut [VoxelType], x: i32, base: i32, z: i32, trunk_height: i32) {
        let top = base + trunk_height;
        for y in base..top {
            set_if_air(voxels, x, y, z, VoxelType::Wood);
        }

        let radius = self.params.foliage_radius.max(0);
        for y in (top - 2)..(top + 2) {
            // The uppermost layer is one voxel narrower.
            let r = if y == top + 1 { (radius - 1).max(0) } else { radius };
            for dz in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dz * dz > r * r + 1 {
                        continue;
                    }
                    set_if_air(voxels, x + dx, y, z + dz, VoxelType::Leaves);
                }
            }
        }
    }
}

/// Writes `voxel` at a local position if the position is inside the chunk and air.
fn set_if_air(voxels: &mut [VoxelType], x: i32, y: i32, z: i32, voxel: VoxelType) {
    if let Some(index) = Chunk::index(x, y, z) {
        if voxels[index] == VoxelType::Air {
            voxels[index] = voxel;
        }
    }
}
