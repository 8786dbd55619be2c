//! # Voxel Type Module
//!
//! This module defines the different kinds of voxels in the world together with
//! the material flags the filler and the mesher rely on.

use bytemuck::{CheckedBitPattern, NoUninit};
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::block_side::BlockSide;

/// The underlying integer type used to represent voxel types in memory.
pub type VoxelTypeSize = u8;

/// Enumerates all possible voxel types in the world.
///
/// Each variant is stored as a single byte, so a chunk's voxel array can be
/// reinterpreted as raw bytes for persistence. `FromPrimitive` and
/// `CheckedBitPattern` allow safe conversion back from untrusted bytes.
#[repr(u8)]
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    FromPrimitive,
    NoUninit,
    CheckedBitPattern,
    Serialize,
    Deserialize,
)]
pub enum VoxelType {
    /// Empty space.
    #[default]
    Air = 0,
    /// Bulk underground rock.
    Stone = 1,
    /// Shallow soil below grass.
    Dirt = 2,
    /// Grass-topped soil.
    Grass = 3,
    /// Beaches and low terrain.
    Sand = 4,
    /// Liquid filling basins up to sea level.
    Water = 5,
    /// Tree trunks.
    Wood = 6,
    /// Tree foliage.
    Leaves = 7,
    /// Unbreakable world floor.
    Bedrock = 8,
    /// Mountain caps.
    Snow = 9,
    /// Frozen water.
    Ice = 10,
    /// Placed stone.
    Cobblestone = 11,
    /// Placed wood.
    Planks = 12,
    /// See-through building block.
    Glass = 13,
}

/// Number of distinct voxel types.
pub const VOXEL_TYPE_COUNT: usize = 14;

impl VoxelType {
    /// Converts a raw byte to a `VoxelType`.
    ///
    /// # Returns
    /// `None` if the byte doesn't correspond to a known type.
    pub fn from_int(value: VoxelTypeSize) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(value)
    }

    /// Returns `true` for every type that is not [`VoxelType::Air`].
    pub fn is_visible(self) -> bool {
        self != VoxelType::Air
    }

    /// Solid voxels block movement. Air and liquids are not solid.
    pub fn is_solid(self) -> bool {
        !matches!(self, VoxelType::Air | VoxelType::Water)
    }

    /// Opaque voxels hide every face behind them. This is the only flag the
    /// mesher uses for occlusion.
    pub fn is_opaque(self) -> bool {
        !matches!(self, VoxelType::Air | VoxelType::Water | VoxelType::Glass)
    }

    /// Transparent voxels are drawn in the blended pass.
    ///
    /// This is a render flag only. Ice is transparent but still opaque for
    /// occlusion: it hides the faces behind it like any other block.
    pub fn is_transparent(self) -> bool {
        matches!(self, VoxelType::Water | VoxelType::Glass | VoxelType::Ice)
    }

    /// Liquid voxels.
    pub fn is_liquid(self) -> bool {
        self == VoxelType::Water
    }

    /// Decides whether the face of `self` that touches `neighbor` is exposed.
    ///
    /// A face is exposed when `self` is visible and the neighbour neither
    /// occludes it (opaque) nor continues the same material (water next to
    /// water, glass next to glass).
    pub fn face_exposed_to(self, neighbor: VoxelType) -> bool {
        self.is_visible() && !neighbor.is_opaque() && neighbor != self
    }

    /// Gets the texture-array index for one face of this voxel type.
    pub fn texture_index(self, side: BlockSide) -> u32 {
        VOXEL_TYPE_TO_TEXTURE_INDICES[self as usize][side as usize]
    }
}

/// Maps each voxel type to its texture indices for each face.
///
/// The outer array is indexed by `VoxelType` as a `usize`.
/// The inner array is in `BlockSide` order: [Front, Back, Bottom, Top, Left, Right].
pub static VOXEL_TYPE_TO_TEXTURE_INDICES: [[u32; 6]; VOXEL_TYPE_COUNT] = [
    [0, 0, 0, 0, 0, 0],       // Air (never meshed)
    [1, 1, 1, 1, 1, 1],       // Stone
    [2, 2, 2, 2, 2, 2],       // Dirt
    [3, 3, 2, 4, 3, 3],       // Grass (top: 4, bottom: dirt, sides: 3)
    [5, 5, 5, 5, 5, 5],       // Sand
    [6, 6, 6, 6, 6, 6],       // Water
    [7, 7, 8, 8, 7, 7],       // Wood (rings on top and bottom)
    [9, 9, 9, 9, 9, 9],       // Leaves
    [10, 10, 10, 10, 10, 10], // Bedrock
    [11, 11, 2, 12, 11, 11],  // Snow (top: 12, bottom: dirt)
    [13, 13, 13, 13, 13, 13], // Ice
    [14, 14, 14, 14, 14, 14], // Cobblestone
    [15, 15, 15, 15, 15, 15], // Planks
    [16, 16, 16, 16, 16, 16], // Glass
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_int_round_trips_every_type() {
        for value in 0..VOXEL_TYPE_COUNT as u8 {
            let voxel = VoxelType::from_int(value).expect("known type");
            assert_eq!(voxel as u8, value);
        }
        assert_eq!(VoxelType::from_int(VOXEL_TYPE_COUNT as u8), None);
    }

    #[test]
    fn test_material_flags() {
        assert!(!VoxelType::Air.is_solid());
        assert!(!VoxelType::Water.is_solid());
        assert!(VoxelType::Water.is_liquid());
        assert!(VoxelType::Glass.is_transparent());
        assert!(!VoxelType::Glass.is_opaque());
        assert!(VoxelType::Stone.is_opaque());
    }

    #[test]
    fn test_face_exposure() {
        assert!(VoxelType::Stone.face_exposed_to(VoxelType::Air));
        assert!(VoxelType::Stone.face_exposed_to(VoxelType::Water));
        assert!(!VoxelType::Stone.face_exposed_to(VoxelType::Dirt));
        assert!(!VoxelType::Water.face_exposed_to(VoxelType::Water));
        assert!(VoxelType::Water.face_exposed_to(VoxelType::Air));
        assert!(!VoxelType::Air.face_exposed_to(VoxelType::Air));
    }

    #[test]
    fn test_ice_occludes_but_is_blended() {
        assert!(VoxelType::Ice.is_transparent());
        assert!(VoxelType::Ice.is_opaque());
        assert!(VoxelType::Ice.is_solid());

        assert!(!VoxelType::Stone.face_exposed_to(VoxelType::Ice));
        assert!(!VoxelType::Water.face_exposed_to(VoxelType::Ice));
        assert!(!VoxelType::Ice.face_exposed_to(VoxelType::Ice));
        assert!(VoxelType::Ice.face_exposed_to(VoxelType::Air));
        assert!(VoxelType::Ice.face_exposed_to(VoxelType::Water));
        assert!(VoxelType::Ice.face_exposed_to(VoxelType::Glass));
    }

    #[test]
    fn test_voxel_type_deserializes_from_name() {
        let voxel: VoxelType = serde_json::from_str("\"Grass\"").expect("valid json");
        assert_eq!(voxel, VoxelType::Grass);
    }
}
