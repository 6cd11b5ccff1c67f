//! Application layer errors

use std::path::PathBuf;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Plugin construction and loading errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Not a plugin source file (expected *.{extension}): {path}")]
    NotASourceFile { path: PathBuf, extension: &'static str },

    #[error("Plugin package has no {initializer}: {path}")]
    MissingInitializer { path: PathBuf, initializer: &'static str },

    #[error("Invalid plugin path: {0}")]
    InvalidPath(PathBuf),

    #[error("Invalid entry point '{name}': {reason}")]
    InvalidEntryPoint { name: String, reason: String },

    #[error("Module '{module}' for entry point '{name}' not found:{searched}")]
    ModuleNotFound {
        name: String,
        module: String,
        searched: String,
    },

    #[error("Plugin '{name}' failed to execute: {message}")]
    Execution { name: String, message: String },

    #[error("Plugin '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error("Plugin '{0}' is not loaded")]
    NotLoaded(String),

    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Hook '{hook}' of plugin '{name}' failed: {message}")]
    Hook {
        name: String,
        hook: &'static str,
        message: String,
    },

    #[error("Failed to read plugin source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Lua runtime error: {0}")]
    Runtime(#[from] mlua::Error),
}

impl PluginError {
    /// True for errors raised while building a handle, before any code runs.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            PluginError::NotASourceFile { .. }
                | PluginError::MissingInitializer { .. }
                | PluginError::InvalidPath(_)
                | PluginError::InvalidEntryPoint { .. }
        )
    }

    /// True for errors raised by `load()`.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            PluginError::ModuleNotFound { .. }
                | PluginError::Execution { .. }
                | PluginError::AlreadyLoaded(_)
                | PluginError::Read { .. }
        )
    }
}

pub type PluginResult<T> = Result<T, PluginError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
