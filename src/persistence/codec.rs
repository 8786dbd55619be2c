//! Binary chunk payload format.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "VXCK"
//! 4       2     format version (u16 LE, currently 1)
//! 6       1     flags (bit 0: payload is lz4 compressed)
//! 7       4     chunk x (i32 LE)
//! 11      4     chunk z (i32 LE)
//! 15      4     payload length in bytes (u32 LE)
//! 19      n     payload: one byte per voxel, raw or compressed
//! ```
//!
//! Decoding is strict: unknown flags, trailing bytes, a voxel count other than
//! one chunk, and unknown voxel bytes are all rejected. Re-encoding a decoded
//! payload reproduces the original bytes only for payloads this crate wrote.
//! An lz4 stream from another encoder decodes to the same voxels but may
//! compress to different bytes.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::error::{TerrainError, TerrainResult};
use crate::voxels::{
    block::VoxelType,
    chunk::{ChunkCoord, CHUNK_VOLUME},
};

/// Leading bytes of every chunk payload.
pub const MAGIC: &[u8; 4] = b"VXCK";
/// Current format version.
pub const FORMAT_VERSION: u16 = 1;
/// Flag bit marking an lz4 compressed payload.
pub const FLAG_LZ4: u8 = 0b0000_0001;
/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 19;

/// A decoded chunk payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPayload {
    /// The chunk the voxels belong to.
    pub coord: ChunkCoord,
    /// One chunk of voxels in storage order.
    pub voxels: Vec<VoxelType>,
    /// Whether the payload was compressed.
    pub compressed: bool,
}

fn corrupt(reason: impl Into<String>) -> TerrainError {
    TerrainError::CorruptPayload(reason.into())
}

/// Encodes a chunk's voxels.
///
/// # Errors
/// `TerrainError::CorruptPayload` if `voxels` is not exactly one chunk long.
pub fn encode_chunk(coord: ChunkCoord, voxels: &[VoxelType], compress: bool) -> TerrainResult<Vec<u8>> {
    if voxels.len() != CHUNK_VOLUME {
        return Err(corrupt(format!(
            "expected {} voxels, got {}",
            CHUNK_VOLUME,
            voxels.len()
        )));
    }

    let raw: &[u8] = bytemuck::cast_slice(voxels);
    let compressed;
    let (flags, payload) = if compress {
        compressed = compress_prepend_size(raw);
        (FLAG_LZ4, compressed.as_slice())
    } else {
        (0, raw)
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.push(flags);
    bytes.extend_from_slice(&coord.x.to_le_bytes());
    bytes.extend_from_slice(&coord.z.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    Ok(bytes)
}

/// Encodes a decoded payload again, with its original compression setting.
pub fn encode_payload(payload: &ChunkPayload) -> TerrainResult<Vec<u8>> {
    encode_chunk(payload.coord, &payload.voxels, payload.compressed)
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> TerrainResult<[u8; N]> {
    bytes
        .get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| corrupt("truncated header"))
}

/// Decodes a chunk payload.
///
/// # Errors
/// `TerrainError::CorruptPayload` describing the first problem found.
pub fn decode_chunk(bytes: &[u8]) -> TerrainResult<ChunkPayload> {
    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("{} bytes is shorter than the header", bytes.len())));
    }
    if &bytes[0..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = u16::from_le_bytes(read_array(bytes, 4)?);
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }
    let flags = bytes[6];
    if flags & !FLAG_LZ4 != 0 {
        return Err(corrupt(format!("unknown flags {:#010b}", flags)));
    }
    let coord = ChunkCoord::new(
        i32::from_le_bytes(read_array(bytes, 7)?),
        i32::from_le_bytes(read_array(bytes, 11)?),
    );
    let payload_len = u32::from_le_bytes(read_array(bytes, 15)?) as usize;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != payload_len {
        return Err(corrupt(format!(
            "payload length {} does not match header {}",
            payload.len(),
            payload_len
        )));
    }

    let compressed = flags & FLAG_LZ4 != 0;
    let decompressed;
    let raw = if compressed {
        let declared = u32::from_le_bytes(read_array(payload, 0)?) as usize;
        if declared != CHUNK_VOLUME {
            return Err(corrupt(format!(
                "compressed payload declares {} bytes, expected {}",
                declared, CHUNK_VOLUME
            )));
        }
        decompressed = decompress_size_prepended(payload)
            .map_err(|err| corrupt(format!("lz4: {}", err)))?;
        decompressed.as_slice()
    } else {
        payload
    };

    if raw.len() != CHUNK_VOLUME {
        return Err(corrupt(format!(
            "expected {} voxels, got {}",
            CHUNK_VOLUME,
            raw.len()
        )));
    }
    let voxels: &[VoxelType] = bytemuck::checked::try_cast_slice(raw)
        .map_err(|err| corrupt(format!("invalid voxel byte: {}", err)))?;

    Ok(ChunkPayload {
        coord,
        voxels: voxels.to_vec(),
        compressed,
    })
}
