//! Lua runtime - executes plugin code
//!
//! Every plugin chunk runs in its own environment table that falls back to
//! the shared globals, so module-level names stay with the plugin that
//! defined them.

pub mod tags;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use mlua::{Function, Lua, LuaSerdeExt, Table, Value};
use tracing::{debug, warn};
use crate::application::errors::{PluginError, PluginResult};
use crate::domain::entities::BotInfo;
use crate::infrastructure::plugins::entry_point::EntryPoint;
use crate::infrastructure::plugins::module::{
    leading_comment, Attribute, AttributeKind, LoadedModule, VERSION_ATTR,
};

/// Owner of the interpreter state shared by all plugins
pub struct LuaRuntime {
    lua: Lua,
}

impl LuaRuntime {
    /// Create a runtime with the tagging API installed
    pub fn new() -> PluginResult<Self> {
        let lua = Lua::new();
        tags::install(&lua)?;
        Ok(Self { lua })
    }

    /// Current `package.path`
    pub fn search_path(&self) -> PluginResult<String> {
        Ok(self.package()?.get::<_, String>("path")?)
    }

    fn set_search_path(&self, path: &str) -> mlua::Result<()> {
        self.package()?.set("path", path)
    }

    /// Make modules under `dir` resolvable until the guard is dropped
    pub fn push_search_dir(&self, dir: impl AsRef<Path>) -> PluginResult<SearchPathGuard<'_>> {
        let dir = dir.as_ref();
        let entry = format!(
            "{dir}/?.lua;{dir}/?/init.lua;",
            dir = dir.display()
        );
        let current = self.search_path()?;
        self.set_search_path(&format!("{}{}", entry, current))?;
        debug!("Added {} to the module search path", dir.display());

        Ok(SearchPathGuard {
            runtime: self,
            entry,
        })
    }

    /// Locate the file `require(module)` would load.
    ///
    /// `Ok(Err(searched))` carries the list of tried locations.
    pub fn resolve_module(&self, module: &str) -> PluginResult<Result<PathBuf, String>> {
        let package = self.package()?;
        let searchpath: Function = package.get("searchpath")?;
        let path: String = package.get("path")?;
        let (found, searched): (Option<String>, Option<String>) = searchpath.call((module, path))?;

        Ok(match found {
            Some(file) => Ok(PathBuf::from(file)),
            None => Err(searched.unwrap_or_default()),
        })
    }

    /// Execute a source file as the code of plugin `name`
    pub fn exec_file(&self, name: &str, path: &Path) -> PluginResult<LoadedModule> {
        let source = std::fs::read_to_string(path).map_err(|source| PluginError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = self.exec_chunk(name, path, &source)?;
        self.snapshot(table, path, leading_comment(&source))
    }

    /// Resolve an entry point's target module and execute it
    pub fn exec_entry_point(&self, entry_point: &EntryPoint) -> PluginResult<LoadedModule> {
        let invalid = |reason: &str| PluginError::InvalidEntryPoint {
            name: entry_point.name.clone(),
            reason: reason.to_string(),
        };
        let module = entry_point.module().ok_or_else(|| invalid("malformed target"))?;

        let path = self.resolve_module(module)?.map_err(|searched| PluginError::ModuleNotFound {
            name: entry_point.name.clone(),
            module: module.to_string(),
            searched,
        })?;
        debug!("Resolved entry point {} to {}", entry_point, path.display());

        let source = std::fs::read_to_string(&path).map_err(|source| PluginError::Read {
            path: path.clone(),
            source,
        })?;

        // Same module cache as `require`
        let loaded: Table = self.package()?.get("loaded")?;
        let mut table = match loaded.raw_get::<_, Value>(module)? {
            Value::Table(cached) => cached,
            _ => {
                let table = self.exec_chunk(&entry_point.name, &path, &source)?;
                loaded.raw_set(module, table.clone())?;
                table
            }
        };

        if let Some(attr) = entry_point.attr() {
            for part in attr.split('.') {
                table = match table.raw_get::<_, Value>(part)? {
                    Value::Table(inner) => inner,
                    _ => {
                        return Err(PluginError::Execution {
                            name: entry_point.name.clone(),
                            message: format!("module '{}' has no table '{}'", module, attr),
                        })
                    }
                };
            }
        }

        self.snapshot(table, &path, leading_comment(&source))
    }

    /// Call a module-level function with the bot identity.
    ///
    /// Returns `false` when the module has no such function.
    pub fn call_hook(
        &self,
        plugin: &str,
        module: &LoadedModule,
        hook: &'static str,
        bot: &BotInfo,
    ) -> PluginResult<bool> {
        let table: Table = self.lua.registry_value(&module.key)?;
        let Value::Function(func) = table.raw_get::<_, Value>(hook)? else {
            return Ok(false);
        };

        let bot = self.lua.to_value(bot)?;
        func.call::<_, ()>(bot).map_err(|e| PluginError::Hook {
            name: plugin.to_string(),
            hook,
            message: e.to_string(),
        })?;
        Ok(true)
    }

    fn package(&self) -> mlua::Result<Table<'_>> {
        self.lua.globals().get("package")
    }

    fn exec_chunk(&self, name: &str, path: &Path, source: &str) -> PluginResult<Table<'_>> {
        let env = self.lua.create_table()?;
        let fallback = self.lua.create_table()?;
        fallback.set("__index", self.lua.globals())?;
        env.set_metatable(Some(fallback));

        let returned: Value = self
            .lua
            .load(source)
            .set_name(format!("@{}", path.display()))
            .set_environment(env.clone())
            .eval()
            .map_err(|e| {
                warn!("Plugin {} raised while executing {}: {}", name, path.display(), e);
                PluginError::Execution {
                    name: name.to_string(),
                    message: e.to_string(),
                }
            })?;

        Ok(match returned {
            Value::Table(module) => module,
            _ => env,
        })
    }

    fn snapshot<'lua>(
        &'lua self,
        table: Table<'lua>,
        origin: &Path,
        doc: Option<String>,
    ) -> PluginResult<LoadedModule> {
        let mut attributes = BTreeMap::new();
        for pair in table.clone().pairs::<Value, Value>() {
            let (key, value) = pair?;
            let Value::String(key) = key else {
                continue;
            };
            let Ok(name) = key.to_str() else {
                continue;
            };

            let (kind, tags) = match &value {
                Value::Function(func) => (AttributeKind::Function, tags::tags_for(&self.lua, func)?),
                Value::Table(_) => (AttributeKind::Table, Vec::new()),
                Value::String(_) => (AttributeKind::String, Vec::new()),
                Value::Integer(_) | Value::Number(_) => (AttributeKind::Number, Vec::new()),
                Value::Boolean(_) => (AttributeKind::Boolean, Vec::new()),
                _ => (AttributeKind::Other, Vec::new()),
            };
            attributes.insert(name.to_string(), Attribute { kind, tags });
        }

        let version = match table.raw_get::<_, Value>(VERSION_ATTR)? {
            Value::String(v) => v.to_str().ok().map(str::to_string),
            _ => None,
        };
        let key = self.lua.create_registry_value(table)?;

        Ok(LoadedModule::new(key, origin.to_path_buf(), doc, version, attributes))
    }
}

/// Scoped search path entry; removed from `package.path` on drop
#[must_use = "the directory leaves the search path as soon as the guard is dropped"]
pub struct SearchPathGuard<'rt> {
    runtime: &'rt LuaRuntime,
    entry: String,
}

impl Drop for SearchPathGuard<'_> {
    fn drop(&mut self) {
        let restored = self
            .runtime
            .search_path()
            .map(|current| current.replacen(&self.entry, "", 1));
        match restored {
            Ok(path) => {
                if let Err(e) = self.runtime.set_search_path(&path) {
                    warn!("Failed to restore the module search path: {}", e);
                }
            }
            Err(e) => warn!("Failed to read the module search path: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_search_path_guard_restores_on_drop() {
        let runtime = LuaRuntime::new().unwrap();
        let before = runtime.search_path().unwrap();
        {
            let _guard = runtime.push_search_dir("/opt/plugins").unwrap();
            let during = runtime.search_path().unwrap();
            assert!(during.starts_with("/opt/plugins/?.lua;/opt/plugins/?/init.lua;"));
        }
        assert_eq!(runtime.search_path().unwrap(), before);
    }

    #[test]
    fn test_nested_guards_unwind() {
        let runtime = LuaRuntime::new().unwrap();
        let before = runtime.search_path().unwrap();
        let outer = runtime.push_search_dir("/a").unwrap();
        let inner = runtime.push_search_dir("/b").unwrap();
        drop(outer);
        assert!(runtime.search_path().unwrap().starts_with("/b/?.lua;"));
        drop(inner);
        assert_eq!(runtime.search_path().unwrap(), before);
    }

    #[test]
    fn test_resolve_module_through_pushed_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("greet.lua"), "return {}").unwrap();
        let runtime = LuaRuntime::new().unwrap();

        assert!(runtime.resolve_module("greet").unwrap().is_err());
        let _guard = runtime.push_search_dir(dir.path()).unwrap();
        let found = runtime.resolve_module("greet").unwrap().unwrap();
        assert_eq!(found, dir.path().join("greet.lua"));
    }

    #[test]
    fn test_exec_file_isolates_globals() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.lua");
        let b = dir.path().join("b.lua");
        fs::write(&a, "only_in_a = 1\nfunction greet() end\n").unwrap();
        fs::write(&b, "VERSION = '2.0'\n").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        let module_a = runtime.exec_file("a", &a).unwrap();
        let module_b = runtime.exec_file("b", &b).unwrap();

        assert!(module_a.has_attr("only_in_a"));
        assert_eq!(module_a.attribute("greet").unwrap().kind, AttributeKind::Function);
        assert!(!module_b.has_attr("only_in_a"));
        assert_eq!(module_b.version(), Some("2.0"));
    }

    #[test]
    fn test_exec_file_prefers_returned_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.lua");
        fs::write(&path, "helper = 1\nlocal M = {}\nfunction M.run() end\nreturn M\n").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        let module = runtime.exec_file("m", &path).unwrap();
        assert!(module.has_attr("run"));
        assert!(!module.has_attr("helper"));
    }

    #[test]
    fn test_exec_file_reports_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.lua");
        fs::write(&path, "function (").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        let err = runtime.exec_file("broken", &path).unwrap_err();
        assert!(matches!(err, PluginError::Execution { .. }));
    }

    #[test]
    fn test_entry_point_reuses_loaded_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shared.lua"), "error('should not run twice')\n").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        runtime
            .lua
            .load("package.loaded['shared'] = { cached = true }")
            .exec()
            .unwrap();
        let _guard = runtime.push_search_dir(dir.path()).unwrap();

        let entry_point = EntryPoint::new("shared", "shared", "wirebot.plugins");
        let module = runtime.exec_entry_point(&entry_point).unwrap();
        assert!(module.has_attr("cached"));
        assert_eq!(module.origin(), dir.path().join("shared.lua"));
    }

    #[test]
    fn test_entry_point_caches_executed_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("once.lua"), "return { hits = 1 }\n").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        let _guard = runtime.push_search_dir(dir.path()).unwrap();
        runtime
            .exec_entry_point(&EntryPoint::new("once", "once", "wirebot.plugins"))
            .unwrap();

        let hits: i64 = runtime
            .lua
            .load("return package.loaded['once'].hits")
            .eval()
            .unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_entry_point_attribute_must_be_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bundle.lua"), "return { chat = 'hello' }\n").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        let _guard = runtime.push_search_dir(dir.path()).unwrap();

        for target in ["bundle:chat", "bundle:missing"] {
            let entry_point = EntryPoint::new("bundle", target, "wirebot.plugins");
            let err = runtime.exec_entry_point(&entry_point).unwrap_err();
            assert!(matches!(err, PluginError::Execution { .. }), "{}: {}", target, err);
            assert!(err.is_load_error());
        }
    }

    #[test]
    fn test_call_hook_passes_bot_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hooks.lua");
        fs::write(&path, "seen = nil\nfunction setup(bot) seen = bot.name end\n").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        let module = runtime.exec_file("hooks", &path).unwrap();
        let bot = BotInfo::new("wirebot", "!");

        assert!(runtime.call_hook("hooks", &module, "setup", &bot).unwrap());
        assert!(!runtime.call_hook("hooks", &module, "shutdown", &bot).unwrap());

        let table: Table = runtime.lua.registry_value(&module.key).unwrap();
        assert_eq!(table.get::<_, String>("seen").unwrap(), "wirebot");
    }
}
