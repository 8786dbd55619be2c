//! # Chunk Streaming
//!
//! The [`ChunkStreamer`] keeps a window of chunks around a moving reference
//! position loaded and meshed, without ever blocking the consumer thread on
//! generation.
//!
//! ## Tick Loop
//!
//! [`ChunkStreamer::update`] is called once per frame with the reference chunk:
//!
//! 1. Finished jobs are drained and adopted into the [`World`]
//! 2. The in-radius coordinate set is computed and diffed against what is
//!    loaded or requested
//! 3. New coordinates get a fill job, leaving coordinates are cancelled or
//!    evicted
//! 4. Failed requests whose backoff elapsed are published again
//! 5. Chunks whose mesh is missing or stale get a mesh job. Failed mesh jobs
//!    back off like fills, and a chunk that never meshes is dropped and its
//!    coordinate given up
//! 6. Retained chunks past their retention time are freed
//! 7. Up to `max_dispatch_per_tick` jobs are handed to the workers
//!
//! ## Ownership
//!
//! The streamer owns the [`World`] and is the only thing mutating its chunk
//! map. Workers receive owned inputs (the generator behind an `Arc`, or a voxel
//! snapshot) and hand back whole chunks or meshes. Every result carries the id
//! of the job that produced it, and a result whose id is no longer live is
//! discarded.
//!
//! ## Per-Coordinate States
//!
//! ```text
//! Unloaded -> Queued -> Generating -> Generated -> Meshed -> Active
//!                                                              |
//! Unloaded <------------------------------------ QueuedForUnload
//! ```

pub mod request;
pub mod tasks;

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use cgmath::Point3;
use log::{debug, error, info, trace, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::TerrainError;
use crate::meshing::{ChunkMesher, GreedyMesher};
use crate::task_management::TaskManager;
use crate::voxels::{
    chunk::{Chunk, ChunkCoord, ChunkState},
    world::World,
};

pub use request::{backoff_ticks, RequestFlags, RequestStatus, StreamRequest};
pub use tasks::{FillTask, MeshTask, StreamResult};

/// Largest accepted view distance, in chunks.
pub const MAX_VIEW_DISTANCE: u32 = 64;

/// Tuning knobs of the streamer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// Radius of the loaded window in chunks. Clamped to `1..=64`.
    pub view_distance: u32,
    /// Upper bound on the in-radius set; the closest coordinates win.
    pub max_loaded_chunks: usize,
    /// Jobs handed to the workers per tick.
    pub max_dispatch_per_tick: usize,
    /// Worker threads. `None` picks one per core, minus one.
    pub worker_count: Option<usize>,
    /// Fill or mesh attempts before a coordinate is given up until it leaves
    /// the radius.
    pub max_attempts: u32,
    /// Backoff after the first failure, in ticks.
    pub backoff_base_ticks: u64,
    /// Longest backoff, in ticks.
    pub backoff_max_ticks: u64,
    /// Ticks a fill job may run before it is treated as failed.
    pub watchdog_ticks: u64,
    /// Evicted chunks kept around for fast re-entry. Zero frees them at once.
    pub retention_capacity: usize,
    /// Ticks an evicted chunk is kept before it is freed.
    pub retention_ticks: u64,
    /// Save modified chunks to the world's store when they are freed.
    pub auto_persist: bool,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        StreamerConfig {
            view_distance: 8,
            max_loaded_chunks: 1000,
            max_dispatch_per_tick: 16,
            worker_count: None,
            max_attempts: 3,
            backoff_base_ticks: 2,
            backoff_max_ticks: 32,
            watchdog_ticks: 600,
            retention_capacity: 64,
            retention_ticks: 120,
            auto_persist: true,
        }
    }
}

impl StreamerConfig {
    /// The view distance clamped to its valid range.
    pub fn effective_view_distance(&self) -> u32 {
        self.view_distance.clamp(1, MAX_VIEW_DISTANCE)
    }
}

/// Counters describing what the streamer did so far.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamerStats {
    /// Calls to `update`.
    pub ticks: u64,
    /// Filled chunks adopted into the world.
    pub adopted: u64,
    /// Retained chunks re-adopted without regenerating.
    pub revived: u64,
    /// Requests cancelled because their coordinate left the radius.
    pub cancelled: u64,
    /// Fill and mesh jobs published again after a failure.
    pub retried: u64,
    /// Coordinates given up after exhausting their fill or mesh attempts.
    pub failed: u64,
    /// Chunks moved out of the world into retention.
    pub evicted: u64,
    /// Chunks dropped for good.
    pub freed: u64,
    /// Chunks saved to the store on the way out.
    pub persisted: u64,
}

/// Where a coordinate is in the streaming lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Not loaded, not requested. Also the state of a coordinate that gave up.
    Unloaded,
    /// Waiting for a worker, or for the backoff after a failed attempt.
    Queued,
    /// A worker is filling the chunk.
    Generating,
    /// Voxels are loaded, the first mesh is not built yet.
    Generated,
    /// A mesh is attached but the voxels changed since.
    Meshed,
    /// The mesh matches the voxels.
    Active,
    /// Evicted and retained until it is freed.
    QueuedForUnload,
}

/// The mesh job of one chunk, running or waiting out a backoff.
struct MeshJob {
    job: u64,
    revision: u64,
    /// Attempts at this revision.
    attempts: u32,
    /// Set after a failure: the tick the job is published again.
    retry_at_tick: Option<u64>,
    flags: Arc<RequestFlags>,
}

/// Streams chunks in and out of a [`World`] around a reference position.
pub struct ChunkStreamer {
    config: StreamerConfig,
    world: World,
    mesher: Arc<dyn ChunkMesher>,
    tasks: TaskManager<StreamResult>,
    requests: HashMap<ChunkCoord, StreamRequest>,
    mesh_jobs: HashMap<ChunkCoord, MeshJob>,
    retained: LruCache<ChunkCoord, (Chunk, u64)>,
    in_range: HashSet<ChunkCoord>,
    reference: ChunkCoord,
    tick: u64,
    next_job: u64,
    stats: StreamerStats,
}

impl ChunkStreamer {
    /// Creates a streamer that owns `world`.
    ///
    /// Nothing is requested until the first [`ChunkStreamer::update`].
    pub fn new(world: World, config: StreamerConfig) -> Self {
        let workers = config
            .worker_count
            .unwrap_or_else(TaskManager::<StreamResult>::default_worker_count);
        let capacity =
            NonZeroUsize::new(config.retention_capacity).unwrap_or(NonZeroUsize::MIN);

        info!(
            "Chunk streamer started: view distance {}, {} workers",
            config.effective_view_distance(),
            workers
        );

        ChunkStreamer {
            tasks: TaskManager::new(workers),
            retained: LruCache::new(capacity),
            world,
            mesher: Arc::new(GreedyMesher),
            config,
            requests: HashMap::new(),
            mesh_jobs: HashMap::new(),
            in_range: HashSet::new(),
            reference: ChunkCoord::new(0, 0),
            tick: 0,
            next_job: 0,
            stats: StreamerStats::default(),
        }
    }

    /// Replaces the mesher used by background mesh jobs.
    pub fn with_mesher(mut self, mesher: Arc<dyn ChunkMesher>) -> Self {
        self.mesher = mesher;
        self
    }

    /// The streamed world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The streamed world, mutably. Edits made here are re-meshed on the next
    /// tick.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The configuration.
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// What the streamer did so far.
    pub fn stats(&self) -> StreamerStats {
        self.stats
    }

    /// The number of the last tick.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// The reference chunk of the last tick.
    pub fn reference(&self) -> ChunkCoord {
        self.reference
    }

    /// The live request for a coordinate, if any.
    pub fn request(&self, coord: ChunkCoord) -> Option<&StreamRequest> {
        self.requests.get(&coord)
    }

    /// Whether `coord` was in range on the last tick.
    pub fn is_in_range(&self, coord: ChunkCoord) -> bool {
        self.in_range.contains(&coord)
    }

    /// The in-range coordinates of the last tick, sorted.
    pub fn in_range_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.in_range.iter().copied().collect();
        coords.sort();
        coords
    }

    /// Number of evicted chunks waiting to be freed.
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Where a coordinate is in the streaming lifecycle.
    pub fn state(&self, coord: ChunkCoord) -> StreamState {
        if let Some(chunk) = self.world.chunk(coord) {
            return match chunk.state() {
                ChunkState::Meshed => StreamState::Active,
                ChunkState::Dirty => StreamState::Meshed,
                ChunkState::Empty | ChunkState::Generating => StreamState::Generating,
                ChunkState::Generated => StreamState::Generated,
                ChunkState::Unloading => StreamState::QueuedForUnload,
            };
        }
        if self.retained.contains(&coord) {
            return StreamState::QueuedForUnload;
        }
        match self.requests.get(&coord) {
            Some(request) if request.is_exhausted() => StreamState::Unloaded,
            Some(request) => match request.status {
                RequestStatus::Generating => StreamState::Generating,
                RequestStatus::Queued | RequestStatus::Failed => StreamState::Queued,
                RequestStatus::Ready | RequestStatus::Cancelled => StreamState::Unloaded,
            },
            None => StreamState::Unloaded,
        }
    }

    /// Whether every in-range coordinate is active or given up and no job is
    /// outstanding.
    pub fn is_settled(&self) -> bool {
        self.tasks.is_idle()
            && self.mesh_jobs.is_empty()
            && self.requests.values().all(StreamRequest::is_exhausted)
            && self.in_range.iter().all(|&coord| {
                matches!(self.state(coord), StreamState::Active | StreamState::Unloaded)
            })
    }

    /// Coordinates whose squared chunk distance to `center` is within the view
    /// distance, capped at `max_loaded_chunks` closest.
    pub fn coords_in_range(&self, center: ChunkCoord) -> Vec<ChunkCoord> {
        let radius = self.config.effective_view_distance() as i32;
        let radius_squared = (radius as i64) * (radius as i64);

        let mut coords = Vec::new();
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let coord = ChunkCoord::new(center.x + dx, center.z + dz);
                if coord.distance_squared(&center) <= radius_squared {
                    coords.push(coord);
                }
            }
        }

        if coords.len() > self.config.max_loaded_chunks {
            coords.sort_by_key(|coord| (coord.distance_squared(&center), *coord));
            coords.truncate(self.config.max_loaded_chunks);
        }
        coords
    }

    /// Runs one tick around a floating point world position.
    pub fn update_position(&mut self, position: Point3<f32>) {
        self.update(ChunkCoord::from_world_point(position));
    }

    /// Runs one tick around the reference chunk `center`.
    pub fn update(&mut self, center: ChunkCoord) {
        self.tick += 1;
        self.stats.ticks += 1;
        self.reference = center;

        for result in self.tasks.process_completed_tasks() {
            self.handle_result(result);
        }

        self.in_range = self.coords_in_range(center).into_iter().collect();
        self.evict_out_of_range();
        self.request_in_range(center);
        self.observe_dispatch();
        self.retry_failed();
        self.schedule_meshes();
        self.expire_retained();

        self.tasks.process_queued_tasks(self.config.max_dispatch_per_tick);
    }

    fn next_job_id(&mut self) -> u64 {
        self.next_job += 1;
        self.next_job
    }

    fn handle_result(&mut self, result: StreamResult) {
        let coord = result.coord();
        let job = result.job();

        match result {
            StreamResult::Filled { chunk, .. } => {
                let live = self
                    .requests
                    .get(&coord)
                    .is_some_and(|request| request.job == job && request.is_pending());
                if !live || self.world.contains(coord) {
                    trace!("Discarding stale fill result for {:?} (job {})", coord, job);
                    return;
                }
                self.requests.remove(&coord);
                self.world.insert_chunk(*chunk);
                self.stats.adopted += 1;
                debug!("Adopted chunk {:?}", coord);
            }
            StreamResult::Meshed {
                mesh, revision, ..
            } => {
                if !self.mesh_jobs.get(&coord).is_some_and(|m| m.job == job) {
                    trace!("Discarding stale mesh for {:?} (job {})", coord, job);
                    return;
                }
                self.mesh_jobs.remove(&coord);
                if !self.world.attach_mesh(coord, mesh, revision) {
                    trace!("Mesh for {:?} at revision {} is out of date", coord, revision);
                }
            }
            StreamResult::Cancelled { .. } => {
                trace!("Job {} for {:?} was cancelled", job, coord);
                if self.mesh_jobs.get(&coord).is_some_and(|m| m.job == job) {
                    self.mesh_jobs.remove(&coord);
                }
            }
            StreamResult::Failed { error, .. } => {
                if self.mesh_jobs.get(&coord).is_some_and(|m| m.job == job) {
                    self.record_mesh_failure(coord, &error);
                    return;
                }
                let live = self
                    .requests
                    .get(&coord)
                    .is_some_and(|request| request.job == job && request.is_pending());
                if live {
                    self.record_failure(coord, &error);
                } else {
                    trace!("Discarding stale failure for {:?} (job {})", coord, job);
                }
            }
        }
    }

    fn record_failure(&mut self, coord: ChunkCoord, error: &TerrainError) {
        let tick = self.tick;
        let (base, max, max_attempts) = (
            self.config.backoff_base_ticks,
            self.config.backoff_max_ticks,
            self.config.max_attempts,
        );
        let Some(request) = self.requests.get_mut(&coord) else {
            return;
        };

        if request.attempts >= max_attempts {
            request.give_up();
            self.stats.failed += 1;
            error!(
                "Giving up on chunk {:?} after {} attempts: {}",
                coord, request.attempts, error
            );
        } else {
            request.flags.cancel();
            request.status = RequestStatus::Failed;
            request.dispatched_tick = None;
            let wait = backoff_ticks(request.attempts, base, max);
            request.retry_at_tick = Some(tick + wait);
            warn!(
                "Attempt {} for chunk {:?} failed, retrying in {} ticks: {}",
                request.attempts, coord, wait, error
            );
        }
    }

    fn record_mesh_failure(&mut self, coord: ChunkCoord, error: &TerrainError) {
        let tick = self.tick;
        let (base, max, max_attempts) = (
            self.config.backoff_base_ticks,
            self.config.backoff_max_ticks,
            self.config.max_attempts,
        );
        let Some(mesh_job) = self.mesh_jobs.get_mut(&coord) else {
            return;
        };

        if mesh_job.attempts < max_attempts {
            let wait = backoff_ticks(mesh_job.attempts, base, max);
            mesh_job.retry_at_tick = Some(tick + wait);
            warn!(
                "Mesh attempt {} for chunk {:?} failed, retrying in {} ticks: {}",
                mesh_job.attempts, coord, wait, error
            );
            return;
        }

        let attempts = mesh_job.attempts;
        self.mesh_jobs.remove(&coord);
        self.stats.failed += 1;
        error!(
            "Giving up on meshing chunk {:?} after {} attempts: {}",
            coord, attempts, error
        );

        // The coordinate stays unloaded until it leaves the radius.
        if let Some(chunk) = self.world.remove_chunk(coord) {
            self.free_chunk(chunk);
        }
        let job = self.next_job_id();
        let mut request = StreamRequest::new(coord, coord.distance_squared(&self.reference), job);
        request.attempts = attempts;
        request.give_up();
        self.requests.insert(coord, request);
    }

    fn evict_out_of_range(&mut self) {
        let leaving: Vec<ChunkCoord> = self
            .requests
            .keys()
            .filter(|coord| !self.in_range.contains(*coord))
            .copied()
            .collect();
        for coord in leaving {
            if let Some(mut request) = self.requests.remove(&coord) {
                if request.is_pending() {
                    request.cancel();
                    self.stats.cancelled += 1;
                    debug!("Cancelled request for {:?}", coord);
                }
            }
        }

        let mut evicting: Vec<ChunkCoord> = self
            .world
            .coords()
            .filter(|coord| !self.in_range.contains(coord))
            .collect();
        evicting.sort();
        for coord in evicting {
            if let Some(mesh_job) = self.mesh_jobs.remove(&coord) {
                mesh_job.flags.cancel();
            }
            let Some(mut chunk) = self.world.remove_chunk(coord) else {
                continue;
            };
            if let Err(err) = chunk.transition(ChunkState::Unloading) {
                warn!("Evicting {:?}: {}", coord, err);
            }
            self.stats.evicted += 1;
            debug!("Evicted chunk {:?}", coord);

            if self.config.retention_capacity == 0 {
                self.free_chunk(chunk);
                continue;
            }
            if let Some((overflow, (old, _))) = self.retained.push(coord, (chunk, self.tick)) {
                trace!("Retention full, freeing {:?}", overflow);
                self.free_chunk(old);
            }
        }
    }

    fn request_in_range(&mut self, center: ChunkCoord) {
        let mut entering: Vec<ChunkCoord> = self
            .in_range
            .iter()
            .filter(|coord| !self.world.contains(**coord) && !self.requests.contains_key(*coord))
            .copied()
            .collect();
        entering.sort_by_key(|coord| (coord.distance_squared(&center), *coord));

        for coord in entering {
            if let Some((mut chunk, _)) = self.retained.pop(&coord) {
                match chunk.revive() {
                    Ok(()) => {
                        self.world.insert_chunk(chunk);
                        self.stats.revived += 1;
                        debug!("Revived retained chunk {:?}", coord);
                        continue;
                    }
                    Err(err) => {
                        warn!("Reviving {:?} failed, regenerating: {}", coord, err);
                        self.free_chunk(chunk);
                    }
                }
            }

            let priority = coord.distance_squared(&center);
            let job = self.next_job_id();
            let request = StreamRequest::new(coord, priority, job);
            self.publish_fill(&request);
            self.requests.insert(coord, request);
        }
    }

    fn publish_fill(&mut self, request: &StreamRequest) {
        let task = FillTask::new(
            request.coord,
            request.job,
            request.priority,
            request.flags.clone(),
            self.world.generator().clone(),
            self.world.store().cloned(),
        );
        self.tasks.publish_task(Box::new(task));
    }

    fn observe_dispatch(&mut self) {
        let tick = self.tick;
        let watchdog = self.config.watchdog_ticks;
        let mut stuck = Vec::new();

        for request in self.requests.values_mut() {
            match request.status {
                RequestStatus::Queued if request.flags.is_started() => {
                    request.status = RequestStatus::Generating;
                    request.dispatched_tick = Some(tick);
                }
                RequestStatus::Generating => {
                    let started = request.dispatched_tick.unwrap_or(tick);
                    if tick.saturating_sub(started) > watchdog {
                        stuck.push(request.coord);
                    }
                }
                _ => {}
            }
        }

        stuck.sort();
        for coord in stuck {
            let error = TerrainError::GenerationFailure {
                chunk_x: coord.x,
                chunk_z: coord.z,
                reason: format!("no result after {} ticks", watchdog),
            };
            warn!("Watchdog fired for chunk {:?}", coord);
            self.record_failure(coord, &error);
        }
    }

    fn retry_failed(&mut self) {
        let tick = self.tick;
        let mut due: Vec<ChunkCoord> = self
            .requests
            .values()
            .filter(|request| {
                request.status == RequestStatus::Failed
                    && request.retry_at_tick.is_some_and(|at| at <= tick)
            })
            .map(|request| request.coord)
            .collect();
        due.sort();

        for coord in due {
            let job = self.next_job_id();
            let Some(mut request) = self.requests.remove(&coord) else {
                continue;
            };
            request.restart(job);
            self.stats.retried += 1;
            debug!("Retrying chunk {:?} (attempt {})", coord, request.attempts);
            self.publish_fill(&request);
            self.requests.insert(coord, request);
        }
    }

    fn schedule_meshes(&mut self) {
        let reference = self.reference;
        let tick = self.tick;
        for coord in self.world.chunks_needing_mesh() {
            let Some(chunk) = self.world.chunk(coord) else {
                continue;
            };
            let revision = chunk.revision();
            let mut attempts = 1;
            if let Some(existing) = self.mesh_jobs.get(&coord) {
                if existing.revision == revision {
                    match existing.retry_at_tick {
                        Some(at) if at <= tick => attempts = existing.attempts + 1,
                        _ => continue,
                    }
                } else {
                    existing.flags.cancel();
                }
            }

            let snapshot = chunk.snapshot();
            if attempts > 1 {
                self.stats.retried += 1;
                debug!("Retrying mesh of chunk {:?} (attempt {})", coord, attempts);
            }
            let job = self.next_job_id();
            let flags = Arc::new(RequestFlags::default());
            let priority = coord.distance_squared(&reference);
            self.tasks.publish_task(Box::new(MeshTask::new(
                snapshot,
                job,
                priority,
                flags.clone(),
                self.mesher.clone(),
            )));
            self.mesh_jobs.insert(
                coord,
                MeshJob {
                    job,
                    revision,
                    attempts,
                    retry_at_tick: None,
                    flags,
                },
            );
        }
    }

    fn expire_retained(&mut self) {
        let tick = self.tick;
        let retention = self.config.retention_ticks;
        let expired: Vec<ChunkCoord> = self
            .retained
            .iter()
            .filter(|(_, (_, evicted_at))| tick.saturating_sub(*evicted_at) >= retention)
            .map(|(coord, _)| *coord)
            .collect();

        for coord in expired {
            if let Some((chunk, _)) = self.retained.pop(&coord) {
                self.free_chunk(chunk);
            }
        }
    }

    /// Drops a chunk for good, saving it first when it holds unsaved edits
    /// and `auto_persist` is on.
    ///
    /// The save runs on the consumer thread, inside the tick. It has to finish
    /// before a later fill of the same coordinate reads the store, so a tick
    /// that frees edited chunks into a [`DirectoryChunkStore`] pays one file
    /// write per chunk.
    ///
    /// [`DirectoryChunkStore`]: crate::persistence::DirectoryChunkStore
    fn free_chunk(&mut self, chunk: Chunk) {
        let coord = chunk.coord();
        self.stats.freed += 1;

        if !chunk.is_modified() {
            trace!("Freed chunk {:?}", coord);
            return;
        }
        if !self.config.auto_persist {
            debug!("Dropping unsaved edits of chunk {:?}", coord);
            return;
        }
        let Some(store) = self.world.store() else {
            debug!("No store attached, dropping edits of chunk {:?}", coord);
            return;
        };
        match store.save(coord, chunk.voxels()) {
            Ok(()) => {
                self.stats.persisted += 1;
                debug!("Persisted chunk {:?}", coord);
            }
            Err(err) => warn!("Failed to persist chunk {:?}: {}", coord, err),
        }
    }

    /// Frees every retained chunk now, saving modified ones.
    pub fn flush(&mut self) {
        while let Some((_, (chunk, _))) = self.retained.pop_lru() {
            self.free_chunk(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::generation::NoiseTerrainGenerator;

    fn streamer(view_distance: u32) -> ChunkStreamer {
        let world = World::new(Arc::new(NoiseTerrainGenerator::from_seed(12345)));
        ChunkStreamer::new(
            world,
            StreamerConfig {
                view_distance,
                worker_count: Some(2),
                retention_ticks: 3,
                ..StreamerConfig::default()
            },
        )
    }

    fn settle(streamer: &mut ChunkStreamer, center: ChunkCoord) {
        for _ in 0..5000 {
            streamer.update(center);
            if streamer.is_settled() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("streamer did not settle: {:?}", streamer.stats());
    }

    #[test]
    fn test_radius_is_a_disc() {
        let streamer = streamer(2);
        let coords = streamer.coords_in_range(ChunkCoord::new(0, 0));
        // dx^2 + dz^2 <= 4
        assert_eq!(coords.len(), 13);
        assert!(coords.contains(&ChunkCoord::new(2, 0)));
        assert!(!coords.contains(&ChunkCoord::new(2, 1)));
    }

    #[test]
    fn test_view_distance_is_clamped() {
        let config = StreamerConfig {
            view_distance: 0,
            ..StreamerConfig::default()
        };
        assert_eq!(config.effective_view_distance(), 1);
        let config = StreamerConfig {
            view_distance: 500,
            ..StreamerConfig::default()
        };
        assert_eq!(config.effective_view_distance(), MAX_VIEW_DISTANCE);
    }

    #[test]
    fn test_max_loaded_keeps_closest() {
        let world = World::new(Arc::new(NoiseTerrainGenerator::from_seed(1)));
        let streamer = ChunkStreamer::new(
            world,
            StreamerConfig {
                view_distance: 3,
                max_loaded_chunks: 5,
                worker_count: Some(1),
                ..StreamerConfig::default()
            },
        );
        let mut coords = streamer.coords_in_range(ChunkCoord::new(10, 10));
        coords.sort();
        assert_eq!(
            coords,
            vec![
                ChunkCoord::new(9, 10),
                ChunkCoord::new(10, 9),
                ChunkCoord::new(10, 10),
                ChunkCoord::new(10, 11),
                ChunkCoord::new(11, 10),
            ]
        );
    }

    #[test]
    fn test_first_tick_queues_everything_in_range() {
        let mut streamer = streamer(1);
        streamer.update(ChunkCoord::new(0, 0));
        for coord in streamer.in_range_coords() {
            assert!(matches!(
                streamer.state(coord),
                StreamState::Queued | StreamState::Generating
            ));
        }
        assert_eq!(streamer.state(ChunkCoord::new(5, 5)), StreamState::Unloaded);
    }

    #[test]
    fn test_window_becomes_active() {
        let mut streamer = streamer(2);
        let center = ChunkCoord::new(0, 0);
        settle(&mut streamer, center);

        for coord in streamer.in_range_coords() {
            assert_eq!(streamer.state(coord), StreamState::Active);
            assert!(streamer.world().mesh(coord).is_some());
        }
        assert_eq!(streamer.world().len(), 13);
        assert_eq!(streamer.stats().adopted, 13);
    }

    #[test]
    fn test_edit_is_remeshed() {
        let mut streamer = streamer(1);
        let center = ChunkCoord::new(0, 0);
        settle(&mut streamer, center);
        streamer.world_mut().take_ready_meshes();

        streamer
            .world_mut()
            .set_voxel(3, 250, 3, crate::voxels::block::VoxelType::Stone)
            .unwrap();
        assert_eq!(streamer.state(center), StreamState::Meshed);
        settle(&mut streamer, center);

        assert_eq!(streamer.state(center), StreamState::Active);
        assert_eq!(streamer.world_mut().take_ready_meshes(), vec![center]);
    }

    #[test]
    fn test_reentry_revives_retained_chunk() {
        let mut streamer = streamer(1);
        let home = ChunkCoord::new(0, 0);
        settle(&mut streamer, home);

        // One step east: (-1, 0), (0, 1) and (0, -1) fall out of the window.
        streamer.update(ChunkCoord::new(1, 0));
        assert_eq!(streamer.stats().evicted, 3);
        assert_eq!(
            streamer.state(ChunkCoord::new(-1, 0)),
            StreamState::QueuedForUnload
        );
        settle(&mut streamer, home);

        assert_eq!(streamer.stats().revived, 3);
        assert_eq!(streamer.state(ChunkCoord::new(-1, 0)), StreamState::Active);
        assert_eq!(streamer.world().len(), 5);
    }

    #[test]
    fn test_fill_result_for_replaced_job_is_discarded() {
        let mut streamer = streamer(1);
        let coord = ChunkCoord::new(1, 0);
        streamer.update(ChunkCoord::new(0, 0));
        let live_job = streamer.request(coord).unwrap().job;

        let mut chunk = Chunk::new(coord);
        chunk.begin_generation().unwrap();
        chunk.finish_generation().unwrap();
        streamer.handle_result(StreamResult::Filled {
            job: live_job + 1000,
            chunk: Box::new(chunk),
        });

        assert!(!streamer.world().contains(coord));
        assert_eq!(streamer.stats().adopted, 0);
        assert_eq!(streamer.request(coord).unwrap().job, live_job);
    }
}
