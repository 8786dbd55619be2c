//! Background jobs run by the streamer's worker pool.
//!
//! Both jobs own everything they read: the fill job holds the generator and
//! store behind `Arc`s, the mesh job holds a voxel snapshot. Neither ever
//! touches a chunk the world owns.

use std::sync::Arc;

use log::debug;

use crate::error::{TerrainError, TerrainResult};
use crate::generation::WorldGenerator;
use crate::meshing::{ChunkMesher, MeshData};
use crate::persistence::ChunkStore;
use crate::task_management::Task;
use crate::voxels::chunk::{Chunk, ChunkCoord, VoxelSnapshot};

use super::request::RequestFlags;

/// What a worker hands back to the streamer.
#[derive(Debug)]
pub enum StreamResult {
    /// A chunk was filled and is ready to be adopted.
    Filled {
        /// Job id.
        job: u64,
        /// The filled chunk, in `Generated` state.
        chunk: Box<Chunk>,
    },
    /// A mesh was built from a voxel snapshot.
    Meshed {
        /// The meshed chunk.
        coord: ChunkCoord,
        /// Job id.
        job: u64,
        /// The revision the snapshot was taken at.
        revision: u64,
        /// The mesh.
        mesh: MeshData,
    },
    /// The job noticed its cancellation and dropped its work.
    Cancelled {
        /// The chunk the job was for.
        coord: ChunkCoord,
        /// Job id.
        job: u64,
    },
    /// The job failed.
    Failed {
        /// The chunk the job was for.
        coord: ChunkCoord,
        /// Job id.
        job: u64,
        /// What went wrong.
        error: TerrainError,
    },
}

impl StreamResult {
    /// The id of the job that produced this result.
    pub fn job(&self) -> u64 {
        match self {
            StreamResult::Filled { job, .. }
            | StreamResult::Meshed { job, .. }
            | StreamResult::Cancelled { job, .. }
            | StreamResult::Failed { job, .. } => *job,
        }
    }

    /// The chunk this result is for.
    pub fn coord(&self) -> ChunkCoord {
        match self {
            StreamResult::Filled { chunk, .. } => chunk.coord(),
            StreamResult::Meshed { coord, .. }
            | StreamResult::Cancelled { coord, .. }
            | StreamResult::Failed { coord, .. } => *coord,
        }
    }
}

/// Fills one chunk from saved voxels or the generator.
pub struct FillTask {
    coord: ChunkCoord,
    job: u64,
    priority: i64,
    flags: Arc<RequestFlags>,
    generator: Arc<dyn WorldGenerator>,
    store: Option<Arc<dyn ChunkStore>>,
}

impl FillTask {
    /// Creates a fill job.
    ///
    /// # Arguments
    /// * `coord` - The chunk to fill
    /// * `job` - Job id echoed in the result
    /// * `priority` - Queue priority, lower is more urgent
    /// * `flags` - Cancellation and start flags shared with the request
    /// * `generator` - Procedural source of voxels
    /// * `store` - Saved voxels that take precedence over the generator
    pub fn new(
        coord: ChunkCoord,
        job: u64,
        priority: i64,
        flags: Arc<RequestFlags>,
        generator: Arc<dyn WorldGenerator>,
        store: Option<Arc<dyn ChunkStore>>,
    ) -> Self {
        FillTask {
            coord,
            job,
            priority,
            flags,
            generator,
            store,
        }
    }

    fn fill(&self) -> TerrainResult<Chunk> {
        let mut chunk = Chunk::new(self.coord);
        chunk.begin_generation()?;

        let saved = match &self.store {
            Some(store) => store.load(self.coord)?,
            None => None,
        };
        match saved {
            Some(voxels) => {
                debug!("Chunk {:?} loaded from store", self.coord);
                chunk.replace_voxels(voxels)?;
            }
            None => self.generator.generate_chunk_with_assets(&mut chunk, None)?,
        }

        chunk.finish_generation()?;
        Ok(chunk)
    }

    fn cancelled(&self) -> StreamResult {
        StreamResult::Cancelled {
            coord: self.coord,
            job: self.job,
        }
    }
}

impl Task<StreamResult> for FillTask {
    fn process(&self) -> StreamResult {
        if self.flags.is_cancelled() {
            return self.cancelled();
        }
        self.flags.mark_started();

        let result = self.fill();
        // A result finished after cancellation is never published.
        if self.flags.is_cancelled() {
            return self.cancelled();
        }
        match result {
            Ok(chunk) => StreamResult::Filled {
                job: self.job,
                chunk: Box::new(chunk),
            },
            Err(error) => StreamResult::Failed {
                coord: self.coord,
                job: self.job,
                error: TerrainError::GenerationFailure {
                    chunk_x: self.coord.x,
                    chunk_z: self.coord.z,
                    reason: error.to_string(),
                },
            },
        }
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    fn is_cancelled(&self) -> bool {
        self.flags.is_cancelled()
    }

    fn failed(&self, reason: String) -> StreamResult {
        StreamResult::Failed {
            coord: self.coord,
            job: self.job,
            error: TerrainError::GenerationFailure {
                chunk_x: self.coord.x,
                chunk_z: self.coord.z,
                reason,
            },
        }
    }
}

/// Meshes a voxel snapshot.
pub struct MeshTask {
    snapshot: VoxelSnapshot,
    job: u64,
    priority: i64,
    flags: Arc<RequestFlags>,
    mesher: Arc<dyn ChunkMesher>,
}

impl MeshTask {
    /// Creates a mesh job for a snapshot.
    pub fn new(
        snapshot: VoxelSnapshot,
        job: u64,
        priority: i64,
        flags: Arc<RequestFlags>,
        mesher: Arc<dyn ChunkMesher>,
    ) -> Self {
        MeshTask {
            snapshot,
            job,
            priority,
            flags,
            mesher,
        }
    }
}

impl Task<StreamResult> for MeshTask {
    fn process(&self) -> StreamResult {
        if self.flags.is_cancelled() {
            return StreamResult::Cancelled {
                coord: self.snapshot.coord,
                job: self.job,
            };
        }
        self.flags.mark_started();

        match self.mesher.mesh(&self.snapshot.voxels) {
            Ok(mesh) => StreamResult::Meshed {
                coord: self.snapshot.coord,
                job: self.job,
                revision: self.snapshot.revision,
                mesh,
            },
            Err(error) => self.failed(error.to_string()),
        }
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    fn is_cancelled(&self) -> bool {
        self.flags.is_cancelled()
    }

    fn failed(&self, reason: String) -> StreamResult {
        StreamResult::Failed {
            coord: self.snapshot.coord,
            job: self.job,
            error: TerrainError::GenerationFailure {
                chunk_x: self.snapshot.coord.x,
                chunk_z: self.snapshot.coord.z,
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::NoiseTerrainGenerator;
    use crate::meshing::GreedyMesher;
    use crate::persistence::MemoryChunkStore;
    use crate::voxels::block::VoxelType;
    use crate::voxels::chunk::{ChunkState, CHUNK_VOLUME};

    fn generator() -> Arc<dyn WorldGenerator> {
        Arc::new(NoiseTerrainGenerator::from_seed(7))
    }

    #[test]
    fn test_fill_task_generates_chunk() {
        let flags = Arc::new(RequestFlags::default());
        let task = FillTask::new(ChunkCoord::new(2, 3), 9, 0, flags.clone(), generator(), None);
        match task.process() {
            StreamResult::Filled { job, chunk } => {
                assert_eq!(job, 9);
                assert_eq!(chunk.coord(), ChunkCoord::new(2, 3));
                assert_eq!(chunk.state(), ChunkState::Generated);
                assert!(chunk.count(VoxelType::Stone) > 0);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(flags.is_started());
    }

    #[test]
    fn test_fill_task_prefers_saved_voxels() {
        let store = Arc::new(MemoryChunkStore::new());
        let coord = ChunkCoord::new(0, 0);
        store.save(coord, &vec![VoxelType::Glass; CHUNK_VOLUME]).unwrap();

        let task = FillTask::new(
            coord,
            1,
            0,
            Arc::new(RequestFlags::default()),
            generator(),
            Some(store),
        );
        match task.process() {
            StreamResult::Filled { chunk, .. } => {
                assert_eq!(chunk.count(VoxelType::Glass), CHUNK_VOLUME);
                assert!(!chunk.is_modified());
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_fill_task_does_not_publish() {
        let flags = Arc::new(RequestFlags::default());
        flags.cancel();
        let task = FillTask::new(ChunkCoord::new(0, 0), 3, 0, flags, generator(), None);
        assert!(matches!(task.process(), StreamResult::Cancelled { job: 3, .. }));
    }

    #[test]
    fn test_mesh_task_echoes_revision() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.set_voxel(1, 1, 1, VoxelType::Stone).unwrap();
        let snapshot = chunk.snapshot();
        let task = MeshTask::new(
            snapshot,
            4,
            0,
            Arc::new(RequestFlags::default()),
            Arc::new(GreedyMesher),
        );
        match task.process() {
            StreamResult::Meshed { revision, mesh, .. } => {
                assert_eq!(revision, chunk.revision());
                assert_eq!(mesh.quad_count, 6);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    struct RejectingMesher;

    impl ChunkMesher for RejectingMesher {
        fn mesh(&self, _voxels: &[VoxelType]) -> TerrainResult<MeshData> {
            Err(TerrainError::CorruptPayload("unmeshable".to_string()))
        }
    }

    #[test]
    fn test_mesh_task_reports_mesher_errors() {
        let chunk = Chunk::new(ChunkCoord::new(-2, 5));
        let task = MeshTask::new(
            chunk.snapshot(),
            8,
            0,
            Arc::new(RequestFlags::default()),
            Arc::new(RejectingMesher),
        );
        match task.process() {
            StreamResult::Failed { coord, job, error } => {
                assert_eq!(coord, ChunkCoord::new(-2, 5));
                assert_eq!(job, 8);
                assert!(error.to_string().contains("unmeshable"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
