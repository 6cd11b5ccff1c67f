//! wirebot - plugin discovery and loading for an extensible chat bot
//!
//! Plugins are Lua files, Lua packages or entry points declared by installed
//! packages. The [`PluginService`](application::services::PluginService)
//! enumerates them, builds a [`PluginHandle`](infrastructure::plugins::PluginHandle)
//! for each and loads them into a shared [`LuaRuntime`](infrastructure::lua::LuaRuntime).

pub mod application;
pub mod domain;
pub mod infrastructure;
