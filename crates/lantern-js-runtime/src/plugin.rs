//! JavaScript plugin instances and the request dispatcher.

use std::path::{Path, PathBuf};

use lantern_types::{
    ActionPayload, ContentResponse, Metadata, Navigation, ObjectStatusResponse, PrintResponse,
    TabResponse,
};
use rquickjs::context::EvalOptions;
use rquickjs::function::This;
use rquickjs::{Ctx, Persistent, Value};
use serde::Serialize;
use tokio::runtime::Handle;

use crate::bridge::{self, ScriptException};
use crate::decode;
use crate::error::{BridgeError, CallError, LoadError, PluginError};
use crate::extract;
use crate::globals;
use crate::handle::EngineLoop;
use crate::services::PluginServices;
use crate::worker::{EngineOptions, LoopState};

/// Whether `path` names a JavaScript plugin.
pub fn is_javascript_plugin(path: impl AsRef<Path>) -> bool {
    path.as_ref().extension().is_some_and(|ext| ext == "js")
}

/// A loaded JavaScript plugin.
///
/// Owns one [`EngineLoop`]. Operations may be called from any task; they are
/// serialized per instance, so handler bodies never interleave.
pub struct JsPlugin {
    path: PathBuf,
    metadata: Metadata,
    engine: EngineLoop,
    call_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for JsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsPlugin")
            .field("path", &self.path)
            .field("name", &self.metadata.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl JsPlugin {
    /// Read, evaluate and instantiate the plugin at `path`.
    ///
    /// Must be called from within a tokio runtime; store calls made by the
    /// plugin are driven on that runtime. On failure the engine is shut down
    /// and nothing usable is returned.
    pub async fn load(
        path: impl AsRef<Path>,
        services: PluginServices,
        options: EngineOptions,
    ) -> Result<Self, PluginError> {
        let path = path.as_ref().to_path_buf();
        let runtime = Handle::try_current().map_err(|_| LoadError::NoRuntime)?;

        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LoadError::ReadScript {
                path: path.clone(),
                source,
            })?;

        let engine = EngineLoop::start(loop_name(&path), options)?;

        let script_path = path.clone();
        let metadata = engine
            .call(move |state| load_on_loop(state, &script_path, &source, &services, runtime))
            .await??;

        tracing::info!(
            plugin = %metadata.name,
            path = %path.display(),
            module = metadata.capabilities.is_module,
            "loaded javascript plugin"
        );

        Ok(Self {
            path,
            metadata,
            engine,
            call_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shut the plugin's engine down. Safe to call more than once.
    pub fn close(&self) {
        self.engine.close();
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Ask the plugin for its navigation tree.
    pub async fn navigation(&self) -> Result<Navigation, PluginError> {
        const OPERATION: &str = "navigation";
        const HANDLER: &str = "navigationHandler";

        let response = self.dispatch(OPERATION, HANDLER, None).await?;
        decode::navigation(response).map_err(|e| PluginError::call(OPERATION, HANDLER, e))
    }

    /// Render the content for `content_path`.
    pub async fn content(&self, content_path: &str) -> Result<ContentResponse, PluginError> {
        const OPERATION: &str = "content";
        const HANDLER: &str = "contentHandler";

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ContentRequest<'a> {
            content_path: &'a str,
        }

        let envelope = envelope(OPERATION, HANDLER, &ContentRequest { content_path })?;
        let response = self.dispatch(OPERATION, HANDLER, Some(envelope)).await?;
        decode::content(response).map_err(|e| PluginError::call(OPERATION, HANDLER, e))
    }

    /// Summary sections for `object`.
    pub async fn print(&self, object: &serde_json::Value) -> Result<PrintResponse, PluginError> {
        const OPERATION: &str = "print";
        const HANDLER: &str = "printHandler";

        let envelope = envelope(OPERATION, HANDLER, &ObjectRequest { object })?;
        let response = self.dispatch(OPERATION, HANDLER, Some(envelope)).await?;
        decode::print(response).map_err(|e| PluginError::call(OPERATION, HANDLER, e))
    }

    /// The tab the plugin contributes for `object`.
    pub async fn print_tab(&self, object: &serde_json::Value) -> Result<TabResponse, PluginError> {
        const OPERATION: &str = "printTab";
        const HANDLER: &str = "tabHandler";

        let envelope = envelope(OPERATION, HANDLER, &ObjectRequest { object })?;
        let response = self.dispatch(OPERATION, HANDLER, Some(envelope)).await?;
        decode::tab(response).map_err(|e| PluginError::call(OPERATION, HANDLER, e))
    }

    pub async fn object_status(&self, object: &serde_json::Value) -> Result<ObjectStatusResponse, PluginError> {
        const OPERATION: &str = "objectStatus";
        const HANDLER: &str = "objectStatusHandler";

        let envelope = envelope(OPERATION, HANDLER, &ObjectRequest { object })?;
        let response = self.dispatch(OPERATION, HANDLER, Some(envelope)).await?;
        decode::object_status(response).map_err(|e| PluginError::call(OPERATION, HANDLER, e))
    }

    /// Run the action `action_name`. Fails when the handler reports an error.
    pub async fn handle_action(&self, action_name: &str, payload: &ActionPayload) -> Result<(), PluginError> {
        const OPERATION: &str = "handleAction";
        const HANDLER: &str = "actionHandler";

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ActionRequest<'a> {
            action_name: &'a str,
            payload: &'a ActionPayload,
        }

        let envelope = envelope(OPERATION, HANDLER, &ActionRequest { action_name, payload })?;
        let response = self.dispatch(OPERATION, HANDLER, Some(envelope)).await?;
        let plugin = self.path.display().to_string();
        decode::action(&plugin, response).map_err(|e| PluginError::call(OPERATION, HANDLER, e))
    }

    /// Invoke `handler` on the loop and return its JSON result.
    async fn dispatch(
        &self,
        operation: &'static str,
        handler: &'static str,
        envelope: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, PluginError> {
        let _guard = self.call_lock.lock().await;
        tracing::debug!(plugin = %self.metadata.name, handler, "dispatching {}", operation);

        self.engine
            .call(move |state| invoke_handler(state, handler, envelope))
            .await?
            .map_err(|e| PluginError::call(operation, handler, e))
    }
}

impl Drop for JsPlugin {
    fn drop(&mut self) {
        tracing::debug!(plugin = %self.metadata.name, "dropping javascript plugin");
    }
}

#[derive(Serialize)]
struct ObjectRequest<'a> {
    object: &'a serde_json::Value,
}

fn envelope<T: Serialize>(
    operation: &'static str,
    handler: &'static str,
    request: &T,
) -> Result<serde_json::Value, PluginError> {
    serde_json::to_value(request).map_err(|source| {
        PluginError::call(
            operation,
            handler,
            BridgeError::Encode {
                what: "call envelope".to_string(),
                source,
            }
            .into(),
        )
    })
}

fn loop_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop-side tasks
// ─────────────────────────────────────────────────────────────────────────────

fn load_on_loop(
    state: &mut LoopState,
    path: &Path,
    source: &str,
    services: &PluginServices,
    runtime: Handle,
) -> Result<Metadata, LoadError> {
    let (plugin, metadata) = state.with(|ctx| -> Result<_, LoadError> {
        globals::register_capabilities(&ctx, services, runtime).map_err(|e| {
            LoadError::Evaluate(format!(
                "registering capabilities: {}",
                ScriptException::from_error(&ctx, e)
            ))
        })?;

        evaluate(&ctx, path, source)?;

        let plugin = extract::instantiate(&ctx)?;
        let metadata = extract::metadata(&ctx, &plugin)?;
        Ok((Persistent::save(&ctx, plugin), metadata))
    })?;

    state.set_plugin(plugin);
    Ok(metadata)
}

fn evaluate(ctx: &Ctx<'_>, path: &Path, source: &str) -> Result<(), LoadError> {
    let mut options = EvalOptions::default();
    options.global = true;
    options.strict = false;

    ctx.eval_with_options::<(), _>(source, options).map_err(|e| {
        let exception = ScriptException::from_error(ctx, e);
        if let Some(stack) = &exception.stack {
            tracing::debug!("script failed at:\n{}", stack);
        }
        if exception.is_syntax_error() {
            LoadError::Compile {
                path: path.to_path_buf(),
                message: exception.to_string(),
            }
        } else {
            LoadError::Evaluate(exception.to_string())
        }
    })
}

fn invoke_handler(
    state: &mut LoopState,
    handler: &'static str,
    envelope: Option<serde_json::Value>,
) -> Result<Option<serde_json::Value>, CallError> {
    let not_found = || CallError::HandlerNotFound {
        handler: handler.to_string(),
    };
    let plugin = state.plugin().ok_or_else(not_found)?;

    state.with(|ctx| {
        let script_error = |e: rquickjs::Error| CallError::Script {
            handler: handler.to_string(),
            message: ScriptException::from_error(&ctx, e).to_string(),
        };

        let plugin = plugin.restore(&ctx).map_err(script_error)?;
        let function: Value = plugin.get(handler).map_err(script_error)?;
        if function.is_undefined() || function.is_null() {
            return Err(not_found());
        }
        let Some(function) = function.into_function() else {
            return Err(CallError::HandlerNotCallable {
                handler: handler.to_string(),
            });
        };

        let result: Value = match envelope {
            Some(envelope) => {
                let request = bridge::to_js(&ctx, &envelope, "call envelope")?;
                function.call::<_, Value>((This(plugin.clone()), request))
            }
            None => function.call::<_, Value>((This(plugin.clone()),)),
        }
        .map_err(script_error)?;

        Ok(bridge::from_js(&ctx, result, handler)?)
    })
}
