//! Plugin system for wirebot
//!
//! Plugins are Lua files, Lua package directories or entry points declared
//! by installed packages. Each becomes a [`PluginHandle`]; loading a handle
//! runs its code in the [`LuaRuntime`](crate::infrastructure::lua::LuaRuntime).

pub mod discovery;
pub mod entry_point;
pub mod handle;
pub mod manifest;
pub mod module;
pub mod registry;

pub use discovery::{list_plugin_filenames, PluginFilename};
pub use entry_point::{EntryPoint, ENTRY_POINT_GROUP};
pub use handle::{PluginHandle, PluginKind, PluginMeta, PluginSource, PACKAGE_INITIALIZER, SOURCE_EXTENSION};
pub use manifest::{discover_entry_points, PluginManifest, RegisteredEntryPoint};
pub use module::{Attribute, AttributeKind, LoadedModule};
pub use registry::{CallableRef, PluginRegistry};
