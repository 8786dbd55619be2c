use cgmath::{Point3, Vector3};

use crate::voxels::block::{BlockSide, VoxelType};

/// Represents a single quad of the mesh, possibly covering many voxel faces.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-left,
/// upper-right). The corners are ordered so that `(lr - ll) x (ul - ll)` points
/// along the face normal, which makes both triangles counter-clockwise when
/// viewed from outside the voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    /// Lower-left corner of the face in chunk coordinates
    pub ll: Point3<i32>,
    /// Lower-right corner of the face in chunk coordinates
    pub lr: Point3<i32>,
    /// Upper-left corner of the face in chunk coordinates
    pub ul: Point3<i32>,
    /// Upper-right corner of the face in chunk coordinates
    pub ur: Point3<i32>,
    /// The voxel type, used for texture mapping
    pub voxel_type: VoxelType,
    /// Which side of the voxels this face represents
    pub block_side: BlockSide,
}

fn unit(axis: usize) -> Vector3<i32> {
    match axis {
        0 => Vector3::new(1, 0, 0),
        1 => Vector3::new(0, 1, 0),
        _ => Vector3::new(0, 0, 1),
    }
}

fn lift(side: BlockSide, plane: i32, u: i32, v: i32) -> Point3<i32> {
    let (u_axis, v_axis) = side.plane_axes();
    let mut coords = [0; 3];
    coords[side.axis()] = plane;
    coords[u_axis] = u;
    coords[v_axis] = v;
    Point3::new(coords[0], coords[1], coords[2])
}

impl Face {
    /// Creates a face covering a `width x height` rectangle of a mesher slice.
    ///
    /// # Arguments
    /// * `block_side` - Which side of the voxels the face covers
    /// * `slice` - Index of the voxel layer along the side's axis
    /// * `u`, `v` - Rectangle origin in the slice's (u, v) plane
    /// * `width`, `height` - Rectangle extent along u and v
    /// * `voxel_type` - The voxel type all covered faces share
    pub fn from_rect(
        block_side: BlockSide,
        slice: i32,
        u: i32,
        v: i32,
        width: i32,
        height: i32,
        voxel_type: VoxelType,
    ) -> Self {
        let plane = if block_side.is_positive() {
            slice + 1
        } else {
            slice
        };

        let c00 = lift(block_side, plane, u, v);
        let c10 = lift(block_side, plane, u + width, v);
        let c01 = lift(block_side, plane, u, v + height);
        let c11 = lift(block_side, plane, u + width, v + height);

        let (u_axis, v_axis) = block_side.plane_axes();
        let u_cross_v = unit(u_axis).cross(unit(v_axis));

        if u_cross_v == block_side.offset() {
            Face {
                ll: c00,
                lr: c10,
                ul: c01,
                ur: c11,
                voxel_type,
                block_side,
            }
        } else {
            Face {
                ll: c00,
                lr: c01,
                ul: c10,
                ur: c11,
                voxel_type,
                block_side,
            }
        }
    }

    /// Creates the face of a single voxel at `(i, j, k)`.
    pub fn unit(i: i32, j: i32, k: i32, voxel_type: VoxelType, block_side: BlockSide) -> Self {
        let position = [i, j, k];
        let (u_axis, v_axis) = block_side.plane_axes();
        Face::from_rect(
            block_side,
            position[block_side.axis()],
            position[u_axis],
            position[v_axis],
            1,
            1,
            voxel_type,
        )
    }

    /// Extent of the face along `lr - ll`.
    pub fn width(&self) -> u32 {
        manhattan(self.ll, self.lr)
    }

    /// Extent of the face along `ul - ll`.
    pub fn height(&self) -> u32 {
        manhattan(self.ll, self.ul)
    }

    /// Number of voxel faces this quad covers.
    pub fn area(&self) -> u32 {
        self.width() * self.height()
    }
}

fn manhattan(a: Point3<i32>, b: Point3<i32>) -> u32 {
    ((b.x - a.x).abs() + (b.y - a.y).abs() + (b.z - a.z).abs()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winding_matches_normal_for_every_side() {
        for side in BlockSide::all() {
            let face = Face::from_rect(side, 3, 1, 2, 4, 5, VoxelType::Stone);
            let edge_u = face.lr - face.ll;
            let edge_v = face.ul - face.ll;
            let cross = edge_u.cross(edge_v);
            let normal = side.offset();
            let along = cross.x * normal.x + cross.y * normal.y + cross.z * normal.z;
            assert!(along > 0, "{:?} is wound clockwise", side);
            assert_eq!(face.area(), 20);
        }
    }

    #[test]
    fn test_unit_face_sits_on_the_voxel_boundary() {
        let top = Face::unit(2, 7, 4, VoxelType::Grass, BlockSide::TOP);
        assert!([top.ll, top.lr, top.ul, top.ur].iter().all(|p| p.y == 8));

        let left = Face::unit(2, 7, 4, VoxelType::Grass, BlockSide::LEFT);
        assert!([left.ll, left.lr, left.ul, left.ur].iter().all(|p| p.x == 2));
        assert_eq!(left.area(), 1);
    }
}
