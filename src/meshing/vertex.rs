//! Vertex data structures for voxel meshes.
//!
//! This module defines the vertex format produced by the mesher and consumed by
//! whatever renderer uploads the buffers.

use cgmath::{Point3, Vector3};

/// A vertex of a voxel quad.
///
/// The layout is `#[repr(C)]` and `Pod` so vertex buffers can be cast straight
/// to bytes for GPU upload.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Texture Index: u32 (4 bytes)
///
/// Total size: 36 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in chunk-local space
    pub position: [f32; 3],
    /// Outward face normal
    pub normal: [f32; 3],
    /// Texture coordinates in voxel units, so textures tile across merged quads
    pub tex_coords: [f32; 2],
    /// Index of the texture in the texture array, keyed by voxel type and face
    pub texture_index: u32,
}

impl Vertex {
    /// Creates a new vertex with the given parameters.
    ///
    /// # Arguments
    /// * `pos` - The chunk-local position of the vertex
    /// * `normal` - The outward normal of the face the vertex belongs to
    /// * `u` - U texture coordinate
    /// * `v` - V texture coordinate
    /// * `texture_index` - Index of the texture in the texture array
    pub fn new(pos: Point3<i32>, normal: Vector3<f32>, u: u32, v: u32, texture_index: u32) -> Self {
        Vertex {
            position: [pos.x as f32, pos.y as f32, pos.z as f32],
            normal: [normal.x, normal.y, normal.z],
            tex_coords: [u as f32, v as f32],
            texture_index,
        }
    }
}
