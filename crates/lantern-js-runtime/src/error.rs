//! Error types for the plugin runtime.

use std::path::PathBuf;

/// Errors raised by the engine loop itself.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Engine loop has terminated")]
    Terminated,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Task panicked on the engine loop")]
    TaskPanicked,

    #[error("Engine loop thread panicked")]
    ThreadPanic,

    #[error("Failed to create engine: {0}")]
    Engine(String),

    #[error("Failed to spawn thread: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// Conversion failures between host values and script values.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unable to encode {what}: {source}")]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("engine error converting {what}: {message}")]
    Engine { what: String, message: String },
}

/// Errors that make a plugin unloadable. The instance is never returned.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading script {path}: {source}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compiling {path}: {message}")]
    Compile { path: PathBuf, message: String },

    #[error("script execution: {0}")]
    Evaluate(String),

    #[error("loading plugin class: {0}")]
    Export(String),

    #[error("loading metadata: {0}")]
    Metadata(String),

    #[error("plugins must be loaded from within a tokio runtime")]
    NoRuntime,
}

/// Errors that fail a single dispatcher call. The instance stays usable.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("unable to load {handler} from plugin")]
    HandlerNotFound { handler: String },

    #[error("{handler} is not callable")]
    HandlerNotCallable { handler: String },

    #[error("calling {handler}: {message}")]
    Script { handler: String, message: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("{0}")]
    MissingField(String),

    #[error("{0}")]
    InvalidShape(String),

    #[error("unknown printHandler response section: {0}")]
    UnknownSection(String),

    #[error("{plugin} actionHandler: {message:?}")]
    Action { plugin: String, message: String },
}

/// Top-level error returned by [`JsPlugin`](crate::JsPlugin).
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{operation} ({handler}): {source}")]
    Call {
        operation: &'static str,
        handler: &'static str,
        #[source]
        source: CallError,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl PluginError {
    pub(crate) fn call(operation: &'static str, handler: &'static str, source: CallError) -> Self {
        PluginError::Call {
            operation,
            handler,
            source,
        }
    }

    pub fn is_load(&self) -> bool {
        matches!(self, PluginError::Load(_))
    }

    /// The call-level cause, if this error came from a dispatcher call.
    pub fn call_error(&self) -> Option<&CallError> {
        match self {
            PluginError::Call { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors reported by an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("store error: {0}")]
    Backend(String),
}

/// Errors reported by an [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("reading response body: {0}")]
    Body(String),
}
