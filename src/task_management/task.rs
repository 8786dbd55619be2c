//! # Task System Core Trait
//!
//! This module defines the unit of work executed by the task manager.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and queued via `TaskManager::publish_task()`
//! 2. The manager hands the most urgent queued task to a free worker
//! 3. The task's `process()` method runs on the worker thread
//! 4. The returned value is sent back and collected on the consumer thread by
//!    `TaskManager::process_completed_tasks()`
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - The result type must be `Send` to be transferred back
//! - Tasks own their inputs; anything shared is behind an `Arc`

/// A unit of work that can be executed on a worker thread.
///
/// Tasks should own all the data they need. The result type `R` is whatever
/// the consumer wants back; it is usually an enum covering success, failure
/// and cancellation.
pub trait Task<R>: Send {
    /// Performs the work and returns the result.
    ///
    /// Runs on a worker thread. A panic inside `process` is caught by the
    /// worker and turned into `failed(..)`.
    fn process(&self) -> R;

    /// Scheduling priority. Lower values are dispatched first; equal
    /// priorities are dispatched in publish order.
    fn priority(&self) -> i64 {
        0
    }

    /// Whether the task no longer needs to run.
    ///
    /// Queued tasks that report `true` are dropped without being dispatched.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Builds the result reported when `process` panicked.
    ///
    /// # Arguments
    /// * `reason` - The panic message
    fn failed(&self, reason: String) -> R;
}
