//! Per-coordinate fill requests and their retry bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::voxels::chunk::ChunkCoord;

/// Where a fill request stands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Published to the task queue, not picked up by a worker yet.
    Queued,
    /// A worker is filling the chunk.
    Generating,
    /// The filled chunk was adopted into the world.
    Ready,
    /// The coordinate left the radius before the chunk was adopted.
    Cancelled,
    /// The last attempt failed. See [`StreamRequest::retry_at_tick`].
    Failed,
}

/// Flags shared between a request and the task working on it.
#[derive(Debug, Default)]
pub struct RequestFlags {
    cancelled: AtomicBool,
    started: AtomicBool,
}

impl RequestFlags {
    /// Asks the worker to drop the job.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether the job was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Called by the worker when it picks the job up.
    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Whether a worker picked the job up.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

/// A request to bring one chunk coordinate into the world.
#[derive(Debug)]
pub struct StreamRequest {
    /// The coordinate to fill.
    pub coord: ChunkCoord,
    /// Squared chunk distance to the reference at enqueue time.
    pub priority: i64,
    /// Current status.
    pub status: RequestStatus,
    /// Number of fill attempts published so far.
    pub attempts: u32,
    /// Id of the live job. Results carrying another id are stale.
    pub job: u64,
    /// Tick at which a worker was seen working on the live job.
    pub dispatched_tick: Option<u64>,
    /// Tick at which a failed request is published again. `None` on a failed
    /// request means it gave up.
    pub retry_at_tick: Option<u64>,
    /// Flags shared with the live job.
    pub flags: Arc<RequestFlags>,
}

impl StreamRequest {
    /// Creates a queued request for a fresh job.
    pub fn new(coord: ChunkCoord, priority: i64, job: u64) -> Self {
        StreamRequest {
            coord,
            priority,
            status: RequestStatus::Queued,
            attempts: 1,
            job,
            dispatched_tick: None,
            retry_at_tick: None,
            flags: Arc::new(RequestFlags::default()),
        }
    }

    /// Replaces the live job with a new attempt.
    ///
    /// The old job's flags are cancelled so a late result is discarded.
    pub fn restart(&mut self, job: u64) {
        self.flags.cancel();
        self.flags = Arc::new(RequestFlags::default());
        self.job = job;
        self.attempts += 1;
        self.status = RequestStatus::Queued;
        self.dispatched_tick = None;
        self.retry_at_tick = None;
    }

    /// Cancels the live job.
    pub fn cancel(&mut self) {
        self.flags.cancel();
        self.status = RequestStatus::Cancelled;
    }

    /// Gives up on the coordinate until it leaves the radius.
    pub fn give_up(&mut self) {
        self.flags.cancel();
        self.status = RequestStatus::Failed;
        self.dispatched_tick = None;
        self.retry_at_tick = None;
    }

    /// Whether the request gave up for good.
    pub fn is_exhausted(&self) -> bool {
        self.status == RequestStatus::Failed && self.retry_at_tick.is_none()
    }

    /// Whether a queued or running job is still live.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Queued | RequestStatus::Generating)
    }
}

/// Ticks to wait before attempt `attempt + 1`, after `attempt` failures.
///
/// Doubles from `base` on every failure and saturates at `max`.
pub fn backoff_ticks(attempt: u32, base: u64, max: u64) -> u64 {
    let exponent = attempt.saturating_sub(1).min(63);
    base.saturating_mul(1u64 << exponent).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_saturates() {
        assert_eq!(backoff_ticks(1, 2, 32), 2);
        assert_eq!(backoff_ticks(2, 2, 32), 4);
        assert_eq!(backoff_ticks(3, 2, 32), 8);
        assert_eq!(backoff_ticks(5, 2, 32), 32);
        assert_eq!(backoff_ticks(40, 2, 32), 32);
        assert_eq!(backoff_ticks(100, 2, 32), 32);
    }

    #[test]
    fn test_restart_cancels_previous_job() {
        let mut request = StreamRequest::new(ChunkCoord::new(1, 2), 5, 10);
        let old_flags = request.flags.clone();
        request.status = RequestStatus::Failed;
        request.restart(11);

        assert!(old_flags.is_cancelled());
        assert!(!request.flags.is_cancelled());
        assert_eq!(request.attempts, 2);
        assert_eq!(request.job, 11);
        assert_eq!(request.status, RequestStatus::Queued);
    }

    #[test]
    fn test_exhausted_only_without_retry() {
        let mut request = StreamRequest::new(ChunkCoord::new(0, 0), 0, 1);
        request.status = RequestStatus::Failed;
        request.retry_at_tick = Some(4);
        assert!(!request.is_exhausted());
        request.retry_at_tick = None;
        assert!(request.is_exhausted());
    }

    #[test]
    fn test_give_up_exhausts_the_request() {
        let mut request = StreamRequest::new(ChunkCoord::new(3, 3), 0, 1);
        request.status = RequestStatus::Generating;
        request.dispatched_tick = Some(7);
        request.give_up();

        assert!(request.flags.is_cancelled());
        assert!(request.is_exhausted());
        assert!(!request.is_pending());
        assert_eq!(request.dispatched_tick, None);
    }
}
