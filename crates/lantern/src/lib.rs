//! Lantern plugin host
//!
//! Configuration, plugin discovery and fixture loading behind the `lantern`
//! command-line tool.

pub mod config;
pub mod host;

pub use config::Config;
pub use host::{discover_plugins, load_fixtures, Host};
