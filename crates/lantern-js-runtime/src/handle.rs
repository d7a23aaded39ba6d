//! Host-side handle to an engine loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::command::LoopCommand;
use crate::error::RuntimeError;
use crate::worker::{run_worker, EngineOptions, LoopState};

/// Handle to a single-threaded script engine running in its own thread.
///
/// Every piece of script code runs on the loop's worker. Other threads hand
/// work in with [`run_on_loop`](Self::run_on_loop) or [`call`](Self::call);
/// tasks run in submission order and never concurrently.
pub struct EngineLoop {
    name: String,
    /// Command sender
    cmd_tx: mpsc::UnboundedSender<LoopCommand>,
    /// Whether the loop has been closed
    terminated: Arc<AtomicBool>,
    /// Worker join handle, taken on close
    thread_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl EngineLoop {
    /// Spawn the worker thread and wait until its engine is ready.
    pub fn start(name: impl Into<String>, options: EngineOptions) -> Result<Self, RuntimeError> {
        let name = name.into();
        tracing::debug!("[engine_loop] Starting for {}", name);

        let terminated = Arc::new(AtomicBool::new(false));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let worker_name = name.clone();
        let worker_terminated = terminated.clone();
        let thread_handle = thread::Builder::new()
            .name(format!("lantern-js:{name}"))
            .spawn(move || run_worker(worker_name, options, worker_terminated, cmd_rx, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                return Err(e);
            }
            Err(_) => {
                return Err(match thread_handle.join() {
                    Err(_) => RuntimeError::ThreadPanic,
                    Ok(()) => RuntimeError::ChannelClosed,
                });
            }
        }

        tracing::debug!("[engine_loop] {} is ready", name);

        Ok(Self {
            name,
            cmd_tx,
            terminated,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue `task` and return immediately.
    pub fn run_on_loop<F>(&self, task: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&mut LoopState) + Send + 'static,
    {
        if self.is_closed() {
            return Err(RuntimeError::Terminated);
        }
        self.cmd_tx
            .send(LoopCommand::Run(Box::new(task)))
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Run `task` on the loop and wait for its result.
    ///
    /// Each call gets its own single-use completion channel. Whatever the task
    /// returns, errors included, is handed back to the caller; a panicking
    /// task is reported as [`RuntimeError::TaskPanicked`].
    pub async fn call<T, F>(&self, task: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&mut LoopState) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.run_on_loop(move |state| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| task(state)));
            let _ = reply_tx.send(result.map_err(|_| RuntimeError::TaskPanicked));
        })?;

        match reply_rx.await {
            Ok(result) => result,
            Err(_) if self.is_closed() => Err(RuntimeError::Terminated),
            Err(_) => Err(RuntimeError::ChannelClosed),
        }
    }

    /// Stop the loop and wait for its worker to exit. Safe to call repeatedly.
    ///
    /// A script that is still running is interrupted.
    pub fn close(&self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            tracing::debug!("[engine_loop:{}] Closing", self.name);
            let _ = self.cmd_tx.send(LoopCommand::Shutdown);
        }

        let handle = self.thread_handle.lock().take();
        if let Some(handle) = handle {
            // Closing from inside a task: the worker exits once the task returns.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("[engine_loop:{}] Worker thread panicked", self.name);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl Drop for EngineLoop {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn start(name: &str) -> EngineLoop {
        EngineLoop::start(name, EngineOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_call_returns_script_result() {
        let engine = start("call-result");
        let value = engine
            .call(|state| state.with(|ctx| ctx.eval::<i32, _>("20 + 22").unwrap()))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let engine = start("fifo");
        for i in 0..20 {
            engine
                .run_on_loop(move |state| {
                    state.with(|ctx| {
                        ctx.eval::<(), _>(format!("(globalThis.order = globalThis.order || []).push({i})"))
                            .unwrap()
                    })
                })
                .unwrap();
        }

        let order = engine
            .call(|state| {
                state.with(|ctx| ctx.eval::<Vec<i32>, _>("globalThis.order").unwrap())
            })
            .await
            .unwrap();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_tasks_share_state_on_one_thread() {
        let engine = start("one-thread");
        let first = engine.call(|_| thread::current().id()).await.unwrap();
        let second = engine.call(|_| thread::current().id()).await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first, thread::current().id());
    }

    #[tokio::test]
    async fn test_task_errors_reach_the_caller() {
        let engine = start("errors");
        let result: Result<(), String> = engine
            .call(|state| {
                state.with(|ctx| {
                    ctx.eval::<(), _>("throw new Error('nope')")
                        .map_err(|e| e.to_string())
                })
            })
            .await
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_and_loop_survives() {
        let engine = start("panics");
        let result = engine.call(|_| -> i32 { panic!("task blew up") }).await;
        assert!(matches!(result, Err(RuntimeError::TaskPanicked)));

        let value = engine.call(|_| 7).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_prompt() {
        let engine = start("close");
        let started = Instant::now();
        engine.close();
        engine.close();
        assert!(engine.is_closed());
        assert!(started.elapsed() < Duration::from_secs(5));

        let result = engine.call(|_| ()).await;
        assert!(matches!(result, Err(RuntimeError::Terminated)));
        assert!(matches!(engine.run_on_loop(|_| ()), Err(RuntimeError::Terminated)));
    }

    #[tokio::test]
    async fn test_close_interrupts_busy_script() {
        let engine = Arc::new(start("busy"));
        engine
            .run_on_loop(|state| {
                state.with(|ctx| {
                    let _ = ctx.eval::<(), _>("while (true) {}");
                })
            })
            .unwrap();

        // Give the worker a moment to enter the loop.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        engine.close();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
