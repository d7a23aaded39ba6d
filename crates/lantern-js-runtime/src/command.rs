//! Commands sent to the engine loop's worker thread.

use crate::worker::LoopState;

/// A unit of work executed on the engine loop.
///
/// Tasks get exclusive access to the loop state for as long as they run.
pub type Task = Box<dyn FnOnce(&mut LoopState) + Send + 'static>;

/// Messages consumed by the worker, in the order they were sent.
pub(crate) enum LoopCommand {
    /// Run a task.
    Run(Task),

    /// Stop the loop after the tasks queued before this command.
    Shutdown,
}
