//! Greedy meshing implementation for voxel rendering.
//!
//! This module implements the greedy meshing algorithm, which combines adjacent
//! coplanar faces of the same voxel type into larger quads.
//!
//! For each of the six face directions the chunk is swept slice by slice along
//! the face's axis. Each slice produces a 2D mask whose cells hold the voxel
//! type of an exposed face (or nothing). Rectangles are then grown in the mask
//! in a fixed order: rows are scanned first (`v` outer, `u` inner), each
//! rectangle grows along `u` as far as it can and then along `v` while the
//! whole row segment still matches. The fixed order makes the output
//! reproducible for identical input.

use bitvec::prelude::BitVec;
use log::debug;
use web_time::Instant;

use crate::voxels::{
    block::{BlockSide, VoxelType},
    chunk::{Chunk, CHUNK_HEIGHT, CHUNK_SIZE},
};

use super::{face::Face, mesh::MeshData};

/// Highest y that holds a visible voxel, or `None` for an all-air chunk.
fn highest_visible_layer(voxels: &[VoxelType]) -> Option<i32> {
    voxels
        .iter()
        .rposition(|voxel| voxel.is_visible())
        .map(|index| Chunk::position_of(index).y)
}

/// Looks up the neighbour across a face. Positions outside the chunk count as air.
///
/// Returns `None` when the neighbour is opaque, since nothing can be seen
/// through it and the caller can skip the face test.
fn neighbor(voxels: &[VoxelType], opaque: &BitVec, x: i32, y: i32, z: i32) -> Option<VoxelType> {
    match Chunk::index(x, y, z) {
        Some(index) if opaque[index] => None,
        Some(index) => Some(voxels[index]),
        None => Some(VoxelType::Air),
    }
}

/// Fills `mask` with the exposed faces of one slice.
fn build_slice_mask(
    voxels: &[VoxelType],
    opaque: &BitVec,
    side: BlockSide,
    slice: i32,
    dims: [i32; 3],
    mask: &mut [Option<VoxelType>],
) {
    let axis = side.axis();
    let (u_axis, v_axis) = side.plane_axes();
    let offset = side.offset();
    let width = dims[u_axis];

    for v in 0..dims[v_axis] {
        for u in 0..width {
            let mut position = [0; 3];
            position[axis] = slice;
            position[u_axis] = u;
            position[v_axis] = v;

            let cell = &mut mask[(v * width + u) as usize];
            *cell = None;

            let near = match Chunk::index(position[0], position[1], position[2]) {
                Some(index) => voxels[index],
                None => continue,
            };
            if !near.is_visible() {
                continue;
            }

            let far = match neighbor(
                voxels,
                opaque,
                position[0] + offset.x,
                position[1] + offset.y,
                position[2] + offset.z,
            ) {
                Some(far) => far,
                None => continue,
            };

            if near.face_exposed_to(far) {
                *cell = Some(near);
            }
        }
    }
}

/// Grows rectangles in a slice mask and appends one face per rectangle.
fn merge_slice_mask(
    mask: &mut [Option<VoxelType>],
    side: BlockSide,
    slice: i32,
    width: i32,
    height: i32,
    faces: &mut Vec<Face>,
) {
    let cell = |u: i32, v: i32| (v * width + u) as usize;

    for v in 0..height {
        let mut u = 0;
        while u < width {
            let voxel_type = match mask[cell(u, v)] {
                Some(voxel_type) => voxel_type,
                None => {
                    u += 1;
                    continue;
                }
            };

            let mut rect_width = 1;
            while u + rect_width < width && mask[cell(u + rect_width, v)] == Some(voxel_type) {
                rect_width += 1;
            }

            let mut rect_height = 1;
            'grow: while v + rect_height < height {
                for k in 0..rect_width {
                    if mask[cell(u + k, v + rect_height)] != Some(voxel_type) {
                        break 'grow;
                    }
                }
                rect_height += 1;
            }

            for dv in 0..rect_height {
                for du in 0..rect_width {
                    mask[cell(u + du, v + dv)] = None;
                }
            }

            faces.push(Face::from_rect(
                side,
                slice,
                u,
                v,
                rect_width,
                rect_height,
                voxel_type,
            ));
            u += rect_width;
        }
    }
}

/// Produces the merged faces for a chunk-shaped voxel array.
///
/// # Arguments
/// * `voxels` - The voxels in chunk storage order (`x + 16 * (z + 16 * y)`)
///
/// # Returns
/// The quads, grouped by side in `BlockSide::all()` order and, within a side,
/// by slice and scan order.
pub fn greedy_faces(voxels: &[VoxelType]) -> Vec<Face> {
    let mut faces = Vec::new();
    let top = match highest_visible_layer(voxels) {
        Some(top) => top,
        None => return faces,
    };

    let opaque = Chunk::opacity_mask(voxels);
    // Nothing above `top` can emit a face, so the sweep stops there.
    let dims = [CHUNK_SIZE, (top + 1).min(CHUNK_HEIGHT), CHUNK_SIZE];
    let mut mask = Vec::new();

    for side in BlockSide::all() {
        let (u_axis, v_axis) = side.plane_axes();
        let (width, height) = (dims[u_axis], dims[v_axis]);
        mask.clear();
        mask.resize((width * height) as usize, None);

        for slice in 0..dims[side.axis()] {
            build_slice_mask(voxels, &opaque, side, slice, dims, &mut mask);
            merge_slice_mask(&mut mask, side, slice, width, height, &mut faces);
        }
    }

    faces
}

/// Generates the mesh for a chunk-shaped voxel array using greedy meshing.
///
/// # Performance
/// The sweep visits every voxel below the highest visible layer once per face
/// direction. It is meant to run on a worker thread.
pub fn greedy_mesh(voxels: &[VoxelType]) -> MeshData {
    let start = Instant::now();
    let faces = greedy_faces(voxels);
    let mesh = MeshData::from_faces(&faces);
    debug!(
        "Greedy meshed {} quads in {:?}",
        mesh.quad_count,
        start.elapsed()
    );
    mesh
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::voxels::chunk::{ChunkCoord, CHUNK_VOLUME};

    fn empty() -> Chunk {
        Chunk::new(ChunkCoord::new(0, 0))
    }

    /// Counts exposed voxel faces one by one, without any merging.
    fn naive_exposed_faces(chunk: &Chunk) -> usize {
        let mut count = 0;
        for index in 0..CHUNK_VOLUME {
            let p = Chunk::position_of(index);
            let voxel = chunk.voxels()[index];
            for side in BlockSide::all() {
                let o = side.offset();
                let far = chunk.get_voxel(p.x + o.x, p.y + o.y, p.z + o.z);
                if voxel.face_exposed_to(far) {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn test_empty_chunk_has_no_faces() {
        assert!(greedy_faces(empty().voxels()).is_empty());
        assert!(greedy_mesh(empty().voxels()).is_empty());
    }

    #[test]
    fn test_single_voxel_yields_six_unit_quads() {
        let mut chunk = empty();
        chunk.set_voxel(7, 40, 9, VoxelType::Stone).unwrap();
        let faces = greedy_faces(chunk.voxels());

        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|face| face.area() == 1));
        for side in BlockSide::all() {
            assert_eq!(faces.iter().filter(|f| f.block_side == side).count(), 1);
        }
    }

    #[test]
    fn test_solid_cube_yields_six_quads() {
        for n in [1, 2, 5, 8] {
            let mut chunk = empty();
            chunk.fill_region(
                Point3::new(4, 10, 4),
                Point3::new(3 + n, 9 + n, 3 + n),
                VoxelType::Dirt,
            );
            let faces = greedy_faces(chunk.voxels());
            assert_eq!(faces.len(), 6, "cube of size {}", n);
            assert!(faces.iter().all(|face| face.area() == (n * n) as u32));
        }
    }

    #[test]
    fn test_full_chunk_width_cube_touching_boundaries() {
        let mut chunk = empty();
        chunk.fill_region(Point3::new(0, 0, 0), Point3::new(15, 15, 15), VoxelType::Stone);
        let faces = greedy_faces(chunk.voxels());
        assert_eq!(faces.len(), 6);
    }

    #[test]
    fn test_two_material_checkerboard_never_merges_across_types() {
        let n = 6;
        let mut chunk = empty();
        for y in 0..n {
            for z in 0..n {
                for x in 0..n {
                    let voxel = if (x + y + z) % 2 == 0 {
                        VoxelType::Stone
                    } else {
                        VoxelType::Dirt
                    };
                    chunk.set_voxel(x, y, z, voxel).unwrap();
                }
            }
        }
        let faces = greedy_faces(chunk.voxels());
        // Only the outer shell is exposed and no two neighbours share a type.
        assert_eq!(faces.len(), (6 * n * n) as usize);
        assert_eq!(faces.len(), naive_exposed_faces(&chunk));
    }

    #[test]
    fn test_solid_air_checkerboard_matches_exposed_face_count() {
        let mut chunk = empty();
        for y in 0..8 {
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    if (x + y + z) % 2 == 0 {
                        chunk.set_voxel(x, y, z, VoxelType::Sand).unwrap();
                    }
                }
            }
        }
        let faces = greedy_faces(chunk.voxels());
        assert_eq!(faces.len(), naive_exposed_faces(&chunk));
        assert_eq!(faces.len(), 6 * chunk.count(VoxelType::Sand));
    }

    #[test]
    fn test_merged_area_covers_every_exposed_face() {
        let mut chunk = empty();
        chunk.fill_region(Point3::new(0, 0, 0), Point3::new(15, 3, 15), VoxelType::Stone);
        chunk.fill_region(Point3::new(2, 4, 2), Point3::new(9, 6, 5), VoxelType::Grass);
        chunk.set_voxel(12, 4, 12, VoxelType::Water).unwrap();
        chunk.set_voxel(13, 4, 12, VoxelType::Water).unwrap();

        let faces = greedy_faces(chunk.voxels());
        let covered: u32 = faces.iter().map(Face::area).sum();
        assert_eq!(covered as usize, naive_exposed_faces(&chunk));
    }

    #[test]
    fn test_ice_hides_the_shared_face() {
        let mut chunk = empty();
        chunk.set_voxel(5, 40, 5, VoxelType::Stone).unwrap();
        chunk.set_voxel(6, 40, 5, VoxelType::Ice).unwrap();
        let faces = greedy_faces(chunk.voxels());

        // Five faces each; the touching pair is hidden and types never merge.
        assert_eq!(faces.len(), 10);
        assert_eq!(faces.iter().filter(|f| f.voxel_type == VoxelType::Ice).count(), 5);
        assert_eq!(naive_exposed_faces(&chunk), 10);
    }

    #[test]
    fn test_meshing_is_idempotent() {
        let mut chunk = empty();
        chunk.fill_region(Point3::new(1, 0, 1), Point3::new(10, 20, 4), VoxelType::Stone);
        chunk.fill_region(Point3::new(3, 21, 2), Point3::new(6, 21, 3), VoxelType::Snow);
        assert_eq!(greedy_mesh(chunk.voxels()), greedy_mesh(chunk.voxels()));
    }

    #[test]
    fn test_row_major_width_first_growth() {
        // An L shape on the top face: the first row merges across, the second
        // row starts a new rectangle.
        let mut chunk = empty();
        chunk.set_voxel(0, 0, 0, VoxelType::Stone).unwrap();
        chunk.set_voxel(1, 0, 0, VoxelType::Stone).unwrap();
        chunk.set_voxel(0, 0, 1, VoxelType::Stone).unwrap();

        let top_faces: Vec<Face> = greedy_faces(chunk.voxels())
            .into_iter()
            .filter(|face| face.block_side == BlockSide::TOP)
            .collect();
        assert_eq!(top_faces.len(), 2);
        assert_eq!(top_faces[0].area(), 2);
        assert_eq!(top_faces[1].area(), 1);
    }
}
