//! Application services - Use case orchestration

pub mod plugin_service;

pub use plugin_service::{LoadReport, PluginCandidate, PluginService};
