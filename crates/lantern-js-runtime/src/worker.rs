//! Worker thread implementation for the engine loop.
//!
//! The worker owns the QuickJS runtime and context. Nothing else ever touches
//! them: the host hands work in as [`Task`](crate::Task)s and receives results
//! through whatever channel the task carries.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Object, Persistent, Runtime, Value};
use tokio::sync::mpsc;

use crate::command::LoopCommand;
use crate::error::RuntimeError;

/// Globals every plugin sees before its own code runs. Bundled plugins expect
/// a CommonJS-style `module.exports`.
const PRELUDE: &str = r#"
var global = globalThis;
var self = globalThis;
var module = { exports: {} };
var exports = module.exports;
"#;

/// Target used for plugin console output.
pub(crate) const PLUGIN_LOG_TARGET: &str = "lantern::plugin";

/// Limits applied when the engine is created.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Heap limit for the plugin's QuickJS runtime, in bytes.
    pub memory_limit: Option<usize>,
    /// Maximum native stack used by script execution, in bytes.
    pub max_stack_size: Option<usize>,
}

/// Engine state owned by the worker thread.
///
/// Field order matters: the persisted plugin instance must be released
/// before the context, and the context before the runtime.
pub struct LoopState {
    plugin: Option<Persistent<Object<'static>>>,
    context: Context,
    #[allow(dead_code)]
    runtime: Runtime,
    name: String,
}

impl LoopState {
    fn new(name: String, options: EngineOptions, terminated: Arc<AtomicBool>) -> Result<Self, RuntimeError> {
        let runtime = Runtime::new().map_err(|e| RuntimeError::Engine(e.to_string()))?;
        if let Some(limit) = options.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = options.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        // Lets `close` abort a script that never yields.
        runtime.set_interrupt_handler(Some(Box::new(move || terminated.load(Ordering::SeqCst))));

        let context = Context::full(&runtime).map_err(|e| RuntimeError::Engine(e.to_string()))?;
        context
            .with(|ctx| install_prelude(&ctx, &name))
            .map_err(|e| RuntimeError::Engine(format!("installing prelude: {e}")))?;

        Ok(Self {
            plugin: None,
            context,
            runtime,
            name,
        })
    }

    /// Name of the plugin this loop belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enter the script context.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Ctx<'_>) -> R,
    {
        self.context.with(f)
    }

    pub(crate) fn set_plugin(&mut self, plugin: Persistent<Object<'static>>) {
        self.plugin = Some(plugin);
    }

    pub(crate) fn plugin(&self) -> Option<Persistent<Object<'static>>> {
        self.plugin.clone()
    }
}

/// The main worker loop that runs inside the spawned thread.
pub(crate) fn run_worker(
    name: String,
    options: EngineOptions,
    terminated: Arc<AtomicBool>,
    mut cmd_rx: mpsc::UnboundedReceiver<LoopCommand>,
    ready_tx: std::sync::mpsc::SyncSender<Result<(), RuntimeError>>,
) {
    tracing::debug!("[worker:{}] Creating engine", name);
    let mut state = match LoopState::new(name.clone(), options, terminated.clone()) {
        Ok(state) => state,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));
    tracing::debug!("[worker:{}] Engine ready, entering command loop", name);

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            LoopCommand::Run(task) => {
                if terminated.load(Ordering::SeqCst) {
                    tracing::debug!("[worker:{}] Dropping task queued after close", name);
                    continue;
                }
                if panic::catch_unwind(AssertUnwindSafe(|| task(&mut state))).is_err() {
                    tracing::error!("[worker:{}] Task panicked", name);
                }
            }
            LoopCommand::Shutdown => {
                tracing::debug!("[worker:{}] Shutdown command received", name);
                break;
            }
        }
    }

    tracing::debug!("[worker:{}] Worker finished", name);
}

// ─────────────────────────────────────────────────────────────────────────────
// Prelude and console
// ─────────────────────────────────────────────────────────────────────────────

fn install_prelude<'js>(ctx: &Ctx<'js>, plugin: &str) -> rquickjs::Result<()> {
    ctx.eval::<(), _>(PRELUDE)?;
    register_console(ctx, plugin)
}

#[derive(Debug, Clone, Copy)]
enum ConsoleLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Register `console` with output routed to tracing, tagged with the plugin name.
fn register_console<'js>(ctx: &Ctx<'js>, plugin: &str) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;

    console.set("log", console_fn(ctx, plugin, ConsoleLevel::Info)?)?;
    console.set("info", console_fn(ctx, plugin, ConsoleLevel::Info)?)?;
    console.set("debug", console_fn(ctx, plugin, ConsoleLevel::Debug)?)?;
    console.set("warn", console_fn(ctx, plugin, ConsoleLevel::Warn)?)?;
    console.set("error", console_fn(ctx, plugin, ConsoleLevel::Error)?)?;

    ctx.globals().set("console", console)?;
    Ok(())
}

fn console_fn<'js>(ctx: &Ctx<'js>, plugin: &str, level: ConsoleLevel) -> rquickjs::Result<Function<'js>> {
    let plugin = plugin.to_string();
    Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
        let msg = args
            .0
            .into_iter()
            .map(|value| display_value(&ctx, value))
            .collect::<Vec<_>>()
            .join(" ");
        match level {
            ConsoleLevel::Debug => tracing::debug!(target: PLUGIN_LOG_TARGET, plugin = %plugin, "{}", msg),
            ConsoleLevel::Info => tracing::info!(target: PLUGIN_LOG_TARGET, plugin = %plugin, "{}", msg),
            ConsoleLevel::Warn => tracing::warn!(target: PLUGIN_LOG_TARGET, plugin = %plugin, "{}", msg),
            ConsoleLevel::Error => tracing::error!(target: PLUGIN_LOG_TARGET, plugin = %plugin, "{}", msg),
        }
    })
}

/// Strings print as-is, everything else as JSON when it has a JSON form.
fn display_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> String {
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    let type_name = value.type_name();
    match ctx.json_stringify(value) {
        Ok(Some(json)) => json.to_string().unwrap_or_else(|_| type_name.to_string()),
        _ => type_name.to_string(),
    }
}
