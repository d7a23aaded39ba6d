//! Lantern JavaScript Plugin Runtime
//!
//! Loads third-party dashboard plugins written in JavaScript and drives them
//! through a narrow, typed contract. It follows the worker pattern: each
//! plugin runs in its own OS thread with its own QuickJS runtime, and the host
//! talks to it only by message passing.
//!
//! # Architecture
//!
//! - [`EngineLoop`]: one worker thread per plugin; tasks run FIFO, one at a time
//! - [`bridge`]: host values ⇄ script values through canonical JSON text
//! - capability surface: `dashboardClient`, `httpClient` and `console`,
//!   installed before plugin code runs
//! - contract extraction: instantiate the exported plugin class, read metadata
//! - [`JsPlugin`]: the request dispatcher (navigation, content, print, tab,
//!   object status, actions)

pub mod bridge;
mod command;
mod decode;
mod error;
mod extract;
mod globals;
mod handle;
mod memory;
mod plugin;
mod services;
mod worker;

pub use lantern_types;

pub use command::Task;
pub use error::{BridgeError, CallError, HttpError, LoadError, PluginError, RuntimeError, StoreError};
pub use handle::EngineLoop;
pub use memory::MemoryStore;
pub use plugin::{is_javascript_plugin, JsPlugin};
pub use services::{
    HttpTransport, ObjectStore, PluginServices, ReqwestTransport, DEFAULT_HTTP_TIMEOUT,
};
pub use worker::{EngineOptions, LoopState};
