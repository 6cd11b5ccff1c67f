//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Lua: The interpreter plugin code runs in
//! - Plugins: Discovery, handles and the loaded plugin registry

pub mod config;
pub mod lua;
pub mod plugins;
