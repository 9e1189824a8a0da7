//! # Task System Core Trait
//!
//! A [`Task`] is a self-contained unit of work shipped to a worker thread. It
//! owns everything it needs (for fragment synthesis: bounds, a settings
//! snapshot and a copy of the relevant edit-log slice) and produces an owned
//! output that travels back to the main thread over the result channel.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The output is sent back and collected by
//!    `TaskManager::process_completed_tasks()` on the main thread
//!
//! ## Thread Safety
//! Tasks and their outputs are moved, never shared, so neither side needs
//! any locking.

/// A unit of work that can be executed on a worker thread.
///
/// # Implementation Guidelines
/// - Should be relatively coarse-grained to amortize scheduling overhead
/// - Must not hold references to data that might be modified elsewhere
pub trait Task: Send + 'static {
    /// What the task hands back to the main thread.
    type Output: Send + 'static;

    /// Performs the work. Runs on a worker thread.
    fn process(self) -> Self::Output;
}
