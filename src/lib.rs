#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Terrain
//!
//! Procedural terrain generation, greedy meshing and chunk streaming for
//! voxel worlds.
//!
//! This crate turns a seed (or an elevation image) into chunks of voxels,
//! turns chunks into compact render geometry, and keeps a window of meshed
//! chunks loaded around a moving reference position using a pool of
//! background workers.
//!
//! ## Key Modules
//!
//! * `generation` - Noise fields, heightmaps, layering rules, tree placement
//! * `voxels` - Voxel types, chunk storage and the world chunk map
//! * `meshing` - The greedy mesher and its output buffers
//! * `streaming` - The chunk streamer and its background jobs
//! * `task_management` - The worker pool the streamer runs on
//! * `persistence` - The chunk payload codec and chunk stores
//! * `config` - JSON configuration for all of the above
//!
//! ## Architecture
//!
//! The crate separates:
//! * Pure, deterministic generation (the same seed and coordinate always
//!   produce the same voxels)
//! * Chunk ownership, which lives on a single consumer thread in the `World`
//! * CPU-heavy work, which runs on workers that only ever see owned inputs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use voxel_terrain::config::TerrainConfig;
//! use voxel_terrain::streaming::ChunkStreamer;
//! use voxel_terrain::voxels::chunk::ChunkCoord;
//!
//! let config = TerrainConfig::default();
//! let world = config.build_world().unwrap();
//! let mut streamer = ChunkStreamer::new(world, config.streaming.clone());
//!
//! loop {
//!     streamer.update(ChunkCoord::new(0, 0));
//!     for coord in streamer.world_mut().take_ready_meshes() {
//!         // upload streamer.world().mesh(coord)
//!     }
//! }
//! ```

use std::env;

use log::{error, info};
use web_time::Instant;

use crate::config::TerrainConfig;
use crate::error::TerrainResult;
use crate::streaming::{ChunkStreamer, StreamerStats};
use crate::voxels::chunk::ChunkCoord;

pub mod config;
pub mod core;
pub mod error;
pub mod generation;
pub mod meshing;
pub mod persistence;
pub mod streaming;
pub mod task_management;
pub mod voxels;

/// Environment variable naming a JSON config file for [`run`].
pub const CONFIG_ENV_VAR: &str = "VOXEL_TERRAIN_CONFIG";

/// Ticks [`run`] drives the streamer for unless told otherwise.
pub const DEFAULT_TICKS: u64 = 600;

/// Ticks between two steps of the scripted walk.
const TICKS_PER_STEP: u64 = 20;

/// Ticks between two statistics reports.
const TICKS_PER_REPORT: u64 = 100;

/// Reference chunk of the scripted walk at `tick`: east along the X axis, then
/// north along Z, one chunk every `TICKS_PER_STEP` ticks.
fn walk_position(tick: u64) -> ChunkCoord {
    let step = (tick / TICKS_PER_STEP) as i32;
    let leg = 16;
    if step < leg {
        ChunkCoord::new(step, 0)
    } else {
        ChunkCoord::new(leg, step - leg)
    }
}

fn load_config(path: Option<String>) -> TerrainResult<TerrainConfig> {
    match path {
        Some(path) => TerrainConfig::from_json_file(path),
        None => {
            info!("No config given, using defaults");
            Ok(TerrainConfig::default())
        }
    }
}

/// Drives a streamer along the scripted walk for `ticks` ticks.
///
/// # Returns
/// The streamer statistics at the end of the walk.
pub fn drive(config: &TerrainConfig, ticks: u64) -> TerrainResult<StreamerStats> {
    let world = config.build_world()?;
    let mut streamer = ChunkStreamer::new(world, config.streaming.clone());
    let start = Instant::now();

    for tick in 0..ticks {
        streamer.update(walk_position(tick));
        streamer.world_mut().take_ready_meshes();

        if (tick + 1) % TICKS_PER_REPORT == 0 {
            info!(
                "Tick {}: {} chunks loaded, {} retained, {:?}",
                tick + 1,
                streamer.world().len(),
                streamer.retained_len(),
                streamer.stats()
            );
        }
        std::thread::yield_now();
    }

    streamer.flush();
    let stats = streamer.stats();
    info!(
        "Walked {} ticks in {:.2?}: {:?}",
        ticks,
        start.elapsed(),
        stats
    );
    Ok(stats)
}

/// Runs the streaming driver.
///
/// The first command line argument (or `VOXEL_TERRAIN_CONFIG`) names a JSON
/// config file, the second the number of ticks to run.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let mut args = env::args().skip(1);
    let config_path = args.next().or_else(|| env::var(CONFIG_ENV_VAR).ok());
    let ticks = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_TICKS);

    let result = load_config(config_path).and_then(|config| drive(&config, ticks));
    if let Err(err) = result {
        error!("Streaming driver failed: {}", err);
        std::process::exit(1);
    }
}
