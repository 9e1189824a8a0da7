//! # Task Management System
//!
//! A fixed-size pool of worker threads fed through per-worker channels.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: owns the workers, distributes tasks and collects outputs
//! - `Task`: a unit of work that is moved to a worker and processed there
//! - `TaskChannel`: the task/result channel pair of one worker
//!
//! Each worker owns a dedicated task receiver and result sender. The main
//! thread never blocks on a worker: tasks that find every worker busy wait in a
//! FIFO queue, and results are drained with `try_recv` once per frame.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send back their outputs
//! 4. Outputs are collected on the main thread in `process_completed_tasks()`
//! 5. Queued tasks are handed out in `process_queued_tasks()` as workers free up
//!
//! ## Resizing
//! Shrinking the pool drops the excess workers' senders and joins their
//! threads. A task those workers were running completes, but its output is
//! never delivered.
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(4)?;
//! task_manager.publish_task(MyTask::new(...));
//!
//! // In your main/game loop:
//! for output in task_manager.process_completed_tasks() { ... }
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use task::Task;
use web_time::{Duration, Instant};

use crate::error::{WorldError, WorldResult};

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `result_receiver`: Receives task outputs from worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined on shutdown
#[derive(Debug)]
struct TaskChannel<T: Task> {
    task_sender: Sender<T>,
    result_receiver: Receiver<T::Output>,
    num_tasks_in_flight: usize,
    worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: Set of active worker channels
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `current_channel`: Index for round-robin scheduling
/// - `spawned`: Number of workers ever spawned, used for thread names
pub struct TaskManager<T: Task> {
    channels: Vec<TaskChannel<T>>,
    queued_tasks: VecDeque<T>,
    current_channel: usize,
    spawned: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping this at 1 means a busy pool queues work on the main thread instead
/// of piling it onto one worker, so a freed worker always picks up the oldest
/// queued task.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl<T: Task> TaskManager<T> {
    /// Creates a new `TaskManager` with `num_workers` worker threads.
    ///
    /// # Errors
    /// `WorldError::WorkerSpawn` if a thread cannot be created.
    pub fn new(num_workers: usize) -> WorldResult<Self> {
        let mut manager = TaskManager {
            channels: Vec::with_capacity(num_workers),
            queued_tasks: VecDeque::new(),
            current_channel: 0,
            spawned: 0,
        };
        info!(
            "Creating {} synthesis workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );
        for _ in 0..num_workers {
            manager.spawn_worker()?;
        }
        Ok(manager)
    }

    fn spawn_worker(&mut self) -> WorldResult<()> {
        let (task_tx, task_rx) = channel::<T>();
        let (result_tx, result_rx) = channel::<T::Output>();

        let task_closure = move || {
            while let Ok(task) = task_rx.recv() {
                if result_tx.send(task.process()).is_err() {
                    break;
                }
            }
        };

        let worker = thread::Builder::new()
            .name(format!("synthesis-worker-{}", self.spawned))
            .spawn(task_closure)
            .map_err(|err| WorldError::WorkerSpawn(err.to_string()))?;
        self.spawned += 1;

        self.channels.push(TaskChannel {
            task_sender: task_tx,
            result_receiver: result_rx,
            num_tasks_in_flight: 0,
            worker,
        });
        Ok(())
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of tasks sent to workers whose outputs have not been collected.
    pub fn tasks_in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    /// Number of tasks waiting for a free worker.
    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Whether no task is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.tasks_in_flight() == 0
    }

    /// Grows or shrinks the pool to `num_workers`.
    ///
    /// Removed workers are stopped synchronously. Their in-flight outputs are
    /// discarded.
    pub fn set_worker_count(&mut self, num_workers: usize) -> WorldResult<()> {
        if num_workers == self.channels.len() {
            return Ok(());
        }
        info!(
            "Resizing worker pool from {} to {}",
            self.channels.len(),
            num_workers
        );
        while self.channels.len() > num_workers {
            let Some(channel) = self.channels.pop() else {
                break;
            };
            let TaskChannel {
                task_sender,
                result_receiver,
                num_tasks_in_flight,
                worker,
            } = channel;
            drop(task_sender);
            drop(result_receiver);
            if num_tasks_in_flight > 0 {
                debug!("Dropping {} in-flight task(s) of a stopped worker", num_tasks_in_flight);
            }
            if worker.join().is_err() {
                warn!("A synthesis worker panicked before shutdown");
            }
        }
        while self.channels.len() < num_workers {
            self.spawn_worker()?;
        }
        self.current_channel = 0;
        Ok(())
    }

    fn try_send_task(&mut self, task: T, channel_idx: usize) -> Result<(), T> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(err) => Err(err.0),
        }
    }

    /// Finds the next channel, round-robin from the last used one, that can
    /// accept a task.
    fn find_available_channel(&self) -> Option<usize> {
        let len = self.channels.len();
        (0..len)
            .map(|offset| (self.current_channel + offset) % len)
            .find(|&idx| self.channels[idx].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on an available worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: T) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to free workers, oldest first.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Collects every output the workers have produced so far.
    ///
    /// Never blocks. Outputs of one worker arrive in order; across workers
    /// they may interleave arbitrarily.
    pub fn process_completed_tasks(&mut self) -> Vec<T::Output> {
        let mut outputs = Vec::new();
        for channel in &mut self.channels {
            while let Ok(output) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                outputs.push(output);
            }
        }
        outputs
    }

    /// Runs the queue/collect cycle until the pool is idle or `timeout` passes.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> Vec<T::Output> {
        let deadline = Instant::now() + timeout;
        let mut outputs = Vec::new();
        loop {
            self.process_queued_tasks();
            outputs.extend(self.process_completed_tasks());
            if self.is_idle() || Instant::now() >= deadline {
                return outputs;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Square(u64);

    impl Task for Square {
        type Output = u64;

        fn process(self) -> u64 {
            self.0 * self.0
        }
    }

    #[test]
    fn every_task_completes_once() {
        let mut manager = TaskManager::new(3).unwrap();
        for i in 0..20 {
            manager.publish_task(Square(i));
        }
        assert!(manager.queued_len() > 0);
        let mut outputs = manager.wait_until_idle(Duration::from_secs(10));
        outputs.sort_unstable();
        let expected: Vec<u64> = (0..20).map(|i| i * i).collect();
        assert_eq!(outputs, expected);
        assert!(manager.is_idle());
    }

    #[test]
    fn tasks_wait_in_queue_without_workers() {
        let mut manager = TaskManager::new(0).unwrap();
        assert!(!manager.publish_task(Square(2)));
        manager.process_queued_tasks();
        assert_eq!(manager.queued_len(), 1);

        manager.set_worker_count(2).unwrap();
        let outputs = manager.wait_until_idle(Duration::from_secs(10));
        assert_eq!(outputs, vec![4]);
    }

    #[test]
    fn shrinking_stops_workers() {
        let mut manager: TaskManager<Square> = TaskManager::new(4).unwrap();
        manager.set_worker_count(1).unwrap();
        assert_eq!(manager.worker_count(), 1);
        manager.publish_task(Square(3));
        assert_eq!(manager.wait_until_idle(Duration::from_secs(10)), vec![9]);
    }
}
