//! Plugin handle - one discoverable, loadable unit of bot functionality
//!
//! A handle is built from a Lua file, a Lua package directory or an entry
//! point. Construction only validates the shape of the source; no plugin
//! code runs until [`PluginHandle::load`].

use std::fmt;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use crate::application::errors::{PluginError, PluginResult};
use crate::domain::entities::{BotInfo, Callables};
use crate::infrastructure::lua::LuaRuntime;
use super::entry_point::EntryPoint;
use super::module::{LoadedModule, SETUP_HOOK, SHUTDOWN_HOOK};

/// Extension of plugin source files
pub const SOURCE_EXTENSION: &str = "lua";

/// File that makes a directory a plugin package
pub const PACKAGE_INITIALIZER: &str = "init.lua";

/// Where a plugin's code lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    /// A single `*.lua` file
    File(PathBuf),
    /// A directory with an `init.lua`
    Package(PathBuf),
    /// A module resolved through the search path
    EntryPoint(EntryPoint),
}

impl PluginSource {
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginSource::File(_) => PluginKind::LuaFile,
            PluginSource::Package(_) => PluginKind::LuaPackage,
            PluginSource::EntryPoint(_) => PluginKind::EntryPoint,
        }
    }
}

impl fmt::Display for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSource::File(path) | PluginSource::Package(path) => write!(f, "{}", path.display()),
            PluginSource::EntryPoint(ep) => write!(f, "{}", ep),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    LuaFile,
    LuaPackage,
    EntryPoint,
}

impl PluginKind {
    pub fn as_str(&self) -> &str {
        match self {
            PluginKind::LuaFile => "lua-file",
            PluginKind::LuaPackage => "lua-package",
            PluginKind::EntryPoint => "entry-point",
        }
    }
}

/// Description of a plugin for listings
#[derive(Debug, Clone, Serialize)]
pub struct PluginMeta {
    pub name: String,
    pub label: String,
    pub kind: PluginKind,
    pub source: String,
    pub version: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// A discovered plugin, before and after loading
#[derive(Debug)]
pub struct PluginHandle {
    name: String,
    source: PluginSource,
    module: Option<LoadedModule>,
}

impl PluginHandle {
    /// Build a handle from a file or a package directory
    pub fn from_path(path: impl AsRef<Path>) -> PluginResult<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_package(path)
        } else if path.is_file() {
            Self::from_file(path)
        } else {
            Err(PluginError::InvalidPath(path.to_path_buf()))
        }
    }

    /// Build a handle from a single `*.lua` file
    pub fn from_file(path: impl AsRef<Path>) -> PluginResult<Self> {
        let path = path.as_ref();
        let has_extension = path
            .extension()
            .map(|ext| ext == SOURCE_EXTENSION)
            .unwrap_or(false);
        if !has_extension {
            return Err(PluginError::NotASourceFile {
                path: path.to_path_buf(),
                extension: SOURCE_EXTENSION,
            });
        }
        if !path.is_file() {
            return Err(PluginError::InvalidPath(path.to_path_buf()));
        }

        let name = file_name_part(path, path.file_stem())?;
        Ok(Self::new(name, PluginSource::File(path.to_path_buf())))
    }

    /// Build a handle from a directory holding an `init.lua`
    pub fn from_package(dir: impl AsRef<Path>) -> PluginResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PluginError::InvalidPath(dir.to_path_buf()));
        }
        if !dir.join(PACKAGE_INITIALIZER).is_file() {
            return Err(PluginError::MissingInitializer {
                path: dir.to_path_buf(),
                initializer: PACKAGE_INITIALIZER,
            });
        }

        let name = file_name_part(dir, dir.file_name())?;
        // Sibling modules are required as `<name>.<module>`
        if name.contains('.') {
            return Err(PluginError::InvalidPath(dir.to_path_buf()));
        }
        Ok(Self::new(name, PluginSource::Package(dir.to_path_buf())))
    }

    /// Build a handle from an entry point record
    pub fn from_entry_point(entry_point: EntryPoint) -> PluginResult<Self> {
        entry_point.validate()?;
        let name = entry_point.name.clone();
        Ok(Self::new(name, PluginSource::EntryPoint(entry_point)))
    }

    fn new(name: String, source: PluginSource) -> Self {
        Self {
            name,
            source,
            module: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &PluginSource {
        &self.source
    }

    pub fn kind(&self) -> PluginKind {
        self.source.kind()
    }

    pub fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    /// The executed module, once [`load`](Self::load) succeeded
    pub fn module(&self) -> Option<&LoadedModule> {
        self.module.as_ref()
    }

    /// Execute the plugin's code.
    ///
    /// A handle loads once; calling this again returns
    /// [`PluginError::AlreadyLoaded`] without running anything.
    pub fn load(&mut self, runtime: &LuaRuntime) -> PluginResult<()> {
        if self.module.is_some() {
            return Err(PluginError::AlreadyLoaded(self.name.clone()));
        }

        let module = match &self.source {
            PluginSource::File(path) => runtime.exec_file(&self.name, path)?,
            PluginSource::Package(dir) => {
                let parent = match dir.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => Path::new("."),
                };
                let _search_path = runtime.push_search_dir(parent)?;
                runtime.exec_file(&self.name, &dir.join(PACKAGE_INITIALIZER))?
            }
            PluginSource::EntryPoint(entry_point) => runtime.exec_entry_point(entry_point)?,
        };

        info!(
            "Loaded plugin {} ({}) from {}",
            self.name,
            self.kind().as_str(),
            module.origin().display()
        );
        self.module = Some(module);
        Ok(())
    }

    pub fn has_setup(&self) -> bool {
        self.module.as_ref().map(LoadedModule::has_setup).unwrap_or(false)
    }

    pub fn has_shutdown(&self) -> bool {
        self.module.as_ref().map(LoadedModule::has_shutdown).unwrap_or(false)
    }

    /// Run the plugin's `setup(bot)` hook, if it defines one
    pub fn setup(&self, runtime: &LuaRuntime, bot: &BotInfo) -> PluginResult<bool> {
        self.call_hook(runtime, SETUP_HOOK, bot)
    }

    /// Run the plugin's `shutdown(bot)` hook, if it defines one
    pub fn shutdown(&self, runtime: &LuaRuntime, bot: &BotInfo) -> PluginResult<bool> {
        self.call_hook(runtime, SHUTDOWN_HOOK, bot)
    }

    fn call_hook(&self, runtime: &LuaRuntime, hook: &'static str, bot: &BotInfo) -> PluginResult<bool> {
        let module = self
            .module
            .as_ref()
            .ok_or_else(|| PluginError::NotLoaded(self.name.clone()))?;
        runtime.call_hook(&self.name, module, hook, bot)
    }

    /// Tagged functions; empty until loaded
    pub fn callables(&self) -> Callables {
        self.module
            .as_ref()
            .map(LoadedModule::callables)
            .unwrap_or_default()
    }

    /// Human readable label: the module's leading comment, or `<name> plugin`
    pub fn label(&self) -> String {
        self.module
            .as_ref()
            .and_then(LoadedModule::doc)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} plugin", self.name))
    }

    pub fn version(&self) -> Option<&str> {
        self.module.as_ref().and_then(LoadedModule::version)
    }

    /// When the plugin's code was executed
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.module.as_ref().map(LoadedModule::loaded_at)
    }

    pub fn meta_description(&self) -> PluginMeta {
        PluginMeta {
            name: self.name.clone(),
            label: self.label(),
            kind: self.kind(),
            source: self.source.to_string(),
            version: self.version().map(str::to_string),
            loaded_at: self.loaded_at(),
        }
    }
}

fn file_name_part(path: &Path, part: Option<&std::ffi::OsStr>) -> PluginResult<String> {
    part.map(|p| p.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| PluginError::InvalidPath(path.to_path_buf()))
}
