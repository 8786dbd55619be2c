//! # Voxel Terrain Streaming Driver
//!
//! Walks a chunk streamer along a scripted path and logs what it does. It
//! simply calls into the library's `run()` function.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json] [ticks]
//! ```

fn main() {
    voxel_terrain::run();
}
