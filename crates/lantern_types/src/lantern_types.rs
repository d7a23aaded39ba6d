//! Lantern Types - Host data model shared by the plugin runtime and the CLI
//!
//! This crate contains the pure data structures that flow between the host
//! and JavaScript plugins: resource identifiers, store keys, view components,
//! navigation trees and the plugin contract's metadata and response shapes.
//!
//! Every record uses camelCase serde names so the same annotations drive
//! both directions of the value bridge.

mod component;
mod de;
mod gvk;
mod navigation;
mod plugin;
mod store;

pub use component::*;
pub use gvk::*;
pub use navigation::*;
pub use plugin::*;
pub use store::*;
