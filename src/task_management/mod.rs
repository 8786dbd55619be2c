//! # Task Management System
//!
//! This module provides a small worker pool for running CPU-bound work off the
//! consumer thread.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: Owns the workers, the priority queue and the result channels
//! - `Task`: A unit of work that can be executed on a worker
//! - `TaskChannel`: The task and result channels of one worker
//!
//! Each worker is a `std::thread` with its own task channel and result channel.
//! Tasks wait in a priority queue on the consumer side until a worker has room,
//! so the most urgent work is always the next to start.
//!
//! ## Task Lifecycle
//! 1. Tasks are queued via `TaskManager::publish_task()`
//! 2. `process_queued_tasks()` hands the most urgent tasks to workers with
//!    free slots, round-robin
//! 3. Workers run the tasks and send back the results
//! 4. `process_completed_tasks()` drains the results on the consumer thread
//!
//! ## Failure Handling
//! A panicking task does not take its worker down: the panic is caught and
//! reported through `Task::failed`.
//!
//! ## Example Usage
//! ```rust,ignore
//! let mut task_manager = TaskManager::new(TaskManager::<MyResult>::default_worker_count());
//!
//! task_manager.publish_task(Box::new(MyTask::new(...)));
//!
//! // In your main loop:
//! for result in task_manager.process_completed_tasks() {
//!     // handle the result
//! }
//! task_manager.process_queued_tasks(16);
//! ```

pub mod task;

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, info, trace, warn};

pub use task::Task;

/// A boxed task producing `R`.
pub type BoxedTask<R> = Box<dyn Task<R> + Send>;

/// A communication channel between the consumer thread and one worker thread.
///
/// # Implementation Notes
/// - The sender is dropped first on shutdown so the worker's `recv` fails and
///   the worker exits
/// - The worker handle is joined when the manager is dropped
pub struct TaskChannel<R> {
    task_sender: Option<Sender<BoxedTask<R>>>,
    result_receiver: Receiver<R>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// A queued task with its ordering key.
struct QueuedTask<R> {
    priority: i64,
    seq: u64,
    task: BoxedTask<R>,
}

impl<R> PartialEq for QueuedTask<R> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<R> Eq for QueuedTask<R> {}

impl<R> PartialOrd for QueuedTask<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R> Ord for QueuedTask<R> {
    // `BinaryHeap` is a max-heap: the lowest priority value and then the
    // oldest sequence number must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: One channel pair per worker
/// - `queued_tasks`: Tasks waiting for a free worker slot, most urgent first
/// - `current_channel`: Index for round-robin scheduling
pub struct TaskManager<R: Send + 'static> {
    channels: Vec<TaskChannel<R>>,
    queued_tasks: BinaryHeap<QueuedTask<R>>,
    next_seq: u64,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Two lets a worker pick up its next task while the consumer is still busy
/// with the previous result.
pub const MAX_TASKS_IN_FLIGHT: usize = 2;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

impl<R: Send + 'static> TaskManager<R> {
    /// The default pool size: one worker per core, minus one for the
    /// consumer thread, and at least one.
    pub fn default_worker_count() -> usize {
        thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. At least one
    ///   worker is always created.
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        let mut channels = Vec::with_capacity(num_workers);

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<BoxedTask<R>>();
            let (result_tx, result_rx) = channel::<R>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
                        Ok(result) => result,
                        Err(payload) => {
                            let reason = panic_message(payload.as_ref());
                            warn!("Task panicked on worker {}: {}", index, reason);
                            task.failed(reason)
                        }
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
                trace!("Worker {} exiting", index);
            };

            let worker = thread::Builder::new()
                .name(format!("terrain-worker-{}", index))
                .spawn(task_closure);

            match worker {
                Ok(handle) => channels.push(TaskChannel {
                    task_sender: Some(task_tx),
                    result_receiver: result_rx,
                    num_tasks_in_flight: 0,
                    worker: Some(handle),
                }),
                Err(err) => warn!("Failed to spawn worker {}: {}", index, err),
            }
        }

        info!("Task manager started with {} workers", channels.len());

        TaskManager {
            channels,
            queued_tasks: BinaryHeap::new(),
            next_seq: 0,
            current_channel: 0,
        }
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of tasks waiting for a worker.
    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Number of tasks handed to workers whose results were not collected yet.
    pub fn in_flight(&self) -> usize {
        self.channels.iter().map(|c| c.num_tasks_in_flight).sum()
    }

    /// Whether nothing is queued or running.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.in_flight() == 0
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was sent
    /// - `Err(task)` if the worker is gone, so the task can be requeued
    fn try_send_task(&mut self, task: BoxedTask<R>, channel_idx: usize) -> Result<(), BoxedTask<R>> {
        let channel = &mut self.channels[channel_idx];
        let sender = match &channel.task_sender {
            Some(sender) => sender,
            None => return Err(task),
        };
        match sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(err) => {
                // The worker is gone; stop offering it work.
                channel.task_sender = None;
                Err(err.0)
            }
        }
    }

    /// Finds a worker channel below `MAX_TASKS_IN_FLIGHT`, round-robin from
    /// the last used channel.
    fn find_available_channel(&self) -> Option<usize> {
        let len = self.channels.len();
        (0..len)
            .map(|offset| (self.current_channel + offset) % len)
            .find(|&idx| {
                let channel = &self.channels[idx];
                channel.task_sender.is_some() && channel.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
            })
    }

    /// Queues a task for execution.
    ///
    /// The task starts on a later `process_queued_tasks` call, after every
    /// queued task with a lower priority value.
    pub fn publish_task(&mut self, task: BoxedTask<R>) {
        let queued = QueuedTask {
            priority: task.priority(),
            seq: self.next_seq,
            task,
        };
        self.next_seq += 1;
        self.queued_tasks.push(queued);
    }

    /// Hands queued tasks to workers with free slots.
    ///
    /// Cancelled tasks are dropped on the way without counting against the
    /// limit.
    ///
    /// # Arguments
    /// * `max_dispatch` - Upper bound on tasks sent in this call
    ///
    /// # Returns
    /// The number of tasks sent to workers.
    pub fn process_queued_tasks(&mut self, max_dispatch: usize) -> usize {
        let mut dispatched = 0;

        while dispatched < max_dispatch {
            let channel_idx = match self.find_available_channel() {
                Some(idx) => idx,
                None => break,
            };
            let queued = match self.queued_tasks.pop() {
                Some(queued) => queued,
                None => break,
            };
            if queued.task.is_cancelled() {
                trace!("Dropping cancelled task before dispatch");
                continue;
            }

            match self.try_send_task(queued.task, channel_idx) {
                Ok(()) => {
                    dispatched += 1;
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                }
                Err(task) => {
                    warn!("Worker {} disconnected; requeueing task", channel_idx);
                    self.queued_tasks.push(QueuedTask {
                        priority: queued.priority,
                        seq: queued.seq,
                        task,
                    });
                }
            }
        }

        if dispatched > 0 {
            debug!(
                "Dispatched {} tasks ({} still queued)",
                dispatched,
                self.queued_tasks.len()
            );
        }
        dispatched
    }

    /// Collects every result the workers have finished so far.
    ///
    /// Never blocks.
    pub fn process_completed_tasks(&mut self) -> Vec<R> {
        let mut results = Vec::new();
        for channel in &mut self.channels {
            while let Ok(result) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                results.push(result);
            }
        }
        results
    }
}

impl<R: Send + 'static> Drop for TaskManager<R> {
    fn drop(&mut self) {
        self.queued_tasks.clear();
        for channel in &mut self.channels {
            channel.task_sender = None;
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    warn!("Worker thread panicked during shutdown");
                }
            }
        }
        debug!("Task manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    struct Echo {
        value: i64,
        cancelled: Arc<AtomicBool>,
    }

    impl Task<Result<i64, String>> for Echo {
        fn process(&self) -> Result<i64, String> {
            if self.value < 0 {
                panic!("negative value {}", self.value);
            }
            Ok(self.value)
        }

        fn priority(&self) -> i64 {
            self.value
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled.load(AtomicOrdering::SeqCst)
        }

        fn failed(&self, reason: String) -> Result<i64, String> {
            Err(reason)
        }
    }

    fn echo(value: i64) -> BoxedTask<Result<i64, String>> {
        Box::new(Echo {
            value,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    fn drain(manager: &mut TaskManager<Result<i64, String>>) -> Vec<Result<i64, String>> {
        let mut results = Vec::new();
        for _ in 0..1000 {
            manager.process_queued_tasks(usize::MAX);
            results.extend(manager.process_completed_tasks());
            if manager.is_idle() {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        results
    }

    #[test]
    fn test_all_tasks_complete() {
        let mut manager = TaskManager::new(3);
        for value in 0..20 {
            manager.publish_task(echo(value));
        }
        let mut values: Vec<i64> = drain(&mut manager).into_iter().map(|r| r.unwrap()).collect();
        values.sort();
        assert_eq!(values, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_lowest_priority_value_dispatches_first() {
        let mut manager = TaskManager::new(1);
        for value in [5, 1, 9, 3] {
            manager.publish_task(echo(value));
        }
        // One worker: results arrive in dispatch order.
        let mut order = Vec::new();
        for _ in 0..1000 {
            manager.process_queued_tasks(1);
            order.extend(manager.process_completed_tasks().into_iter().map(|r| r.unwrap()));
            if manager.is_idle() {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(order, vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_panicking_task_reports_failure_and_worker_survives() {
        let mut manager = TaskManager::new(1);
        manager.publish_task(echo(-1));
        manager.publish_task(echo(4));
        let results = drain(&mut manager);
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| matches!(r, Err(msg) if msg.contains("negative"))));
        assert!(results.contains(&Ok(4)));
    }

    #[test]
    fn test_cancelled_tasks_are_never_dispatched() {
        let mut manager: TaskManager<Result<i64, String>> = TaskManager::new(1);
        let flag = Arc::new(AtomicBool::new(true));
        manager.publish_task(Box::new(Echo {
            value: 7,
            cancelled: flag,
        }));
        assert_eq!(manager.process_queued_tasks(10), 0);
        assert!(manager.is_idle());
    }

    #[test]
    fn test_dispatch_limit_is_respected() {
        let mut manager: TaskManager<Result<i64, String>> = TaskManager::new(4);
        for value in 0..10 {
            manager.publish_task(echo(value));
        }
        assert_eq!(manager.process_queued_tasks(3), 3);
        assert_eq!(manager.queued_len(), 7);
        drain(&mut manager);
    }
}
