//! Mesh data structures for voxel rendering.
//!
//! This module turns the quads produced by the greedy mesher into vertex and
//! index buffers, one pair per face direction, ready for GPU upload.

use crate::voxels::block::BlockSide;

use super::{face::Face, vertex::Vertex};

/// Represents a single side of a mesh with its associated vertices and indices.
///
/// Each `MeshSide` corresponds to one of the six possible face directions and
/// contains the vertex and index data needed to render those faces.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSide {
    /// The vertex data for this mesh side
    pub vertices: Vec<Vertex>,
    /// The index data for this mesh side
    pub indices: Vec<u32>,
    /// Which block side this mesh represents
    pub side: BlockSide,
}

impl MeshSide {
    /// Creates a new, empty `MeshSide` for the specified block side.
    pub fn new(side: BlockSide) -> Self {
        MeshSide {
            vertices: Vec::new(),
            indices: Vec::new(),
            side,
        }
    }
}

/// Render geometry for one chunk.
///
/// Buffers are grouped by face direction, indexed by `BlockSide`. Every vertex
/// carries the texture index for its (voxel type, face) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Array of mesh sides, indexed by `BlockSide` enum values.
    pub sides: [MeshSide; 6],
    /// Number of quads across all sides.
    pub quad_count: u32,
}

impl Default for MeshData {
    fn default() -> Self {
        MeshData::new()
    }
}

impl MeshData {
    /// Creates a new, empty mesh with all sides initialized.
    pub fn new() -> Self {
        MeshData {
            sides: BlockSide::all().map(MeshSide::new),
            quad_count: 0,
        }
    }

    /// Builds vertex and index buffers for a list of faces.
    pub fn from_faces(faces: &[Face]) -> Self {
        let mut vertex_vec: [Vec<Vertex>; 6] = Default::default();
        let mut index_vec: [Vec<u32>; 6] = Default::default();
        let mut num_faces_generated = [0u32; 6];

        for face in faces {
            let face_index = face.block_side as usize;
            vertex_vec[face_index].extend(Self::generate_face_vertices(face));
            index_vec[face_index].extend(Self::generate_face_indices(
                num_faces_generated[face_index],
            ));
            num_faces_generated[face_index] += 1;
        }

        let mut mesh = MeshData::new();
        mesh.add_vertices(vertex_vec, index_vec);
        mesh
    }

    /// Adds vertices and indices to the mesh for each side.
    ///
    /// The indices are adjusted to account for the vertices already in the mesh.
    pub fn add_vertices(&mut self, mut block_vertices: [Vec<Vertex>; 6], block_indices: [Vec<u32>; 6]) {
        for i in 0..6 {
            let current_vertices_len = self.sides[i].vertices.len() as u32;
            self.sides[i].vertices.append(&mut block_vertices[i]);
            self.sides[i]
                .indices
                .extend(block_indices[i].iter().map(|e| e + current_vertices_len));
            self.quad_count += (block_indices[i].len() / 6) as u32;
        }
    }

    /// Generates vertex data for a single face.
    ///
    /// The vertices are returned in `ll, lr, ul, ur` order, which forms two
    /// counter-clockwise triangles together with `generate_face_indices`.
    pub fn generate_face_vertices(face: &Face) -> [Vertex; 4] {
        let texture_index = face.voxel_type.texture_index(face.block_side);
        let normal = face.block_side.normal();
        let (u_extent, v_extent) = (face.width(), face.height());

        [
            Vertex::new(face.ll, normal, 0, v_extent, texture_index),
            Vertex::new(face.lr, normal, u_extent, v_extent, texture_index),
            Vertex::new(face.ul, normal, 0, 0, texture_index),
            Vertex::new(face.ur, normal, u_extent, 0, texture_index),
        ]
    }

    /// Generates index data for a face, adjusted by the number of previously generated faces.
    pub fn generate_face_indices(num_faces_generated: u32) -> [u32; 6] {
        [
            (num_faces_generated * 4),
            1 + num_faces_generated * 4,
            3 + num_faces_generated * 4,
            (num_faces_generated * 4),
            3 + num_faces_generated * 4,
            2 + num_faces_generated * 4,
        ]
    }

    /// Whether the mesh has no geometry at all.
    pub fn is_empty(&self) -> bool {
        self.quad_count == 0
    }
}
