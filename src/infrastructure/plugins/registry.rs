//! Plugin registry - Manages loaded plugins

use std::collections::BTreeMap;
use crate::application::errors::PluginError;
use crate::domain::entities::Callables;
use super::handle::PluginHandle;

/// Where a tagged function lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableRef {
    pub plugin: String,
    pub function: String,
}

/// Registry of loaded plugins and the callables they expose
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginHandle>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded plugin
    pub fn register(&mut self, plugin: PluginHandle) -> Result<(), PluginError> {
        if !plugin.is_loaded() {
            return Err(PluginError::NotLoaded(plugin.name().to_string()));
        }

        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(PluginError::AlreadyLoaded(name));
        }

        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Get a plugin by name
    pub fn get(&self, name: &str) -> Option<&PluginHandle> {
        self.plugins.get(name)
    }

    /// All registered plugins, by name
    pub fn all(&self) -> impl Iterator<Item = &PluginHandle> {
        self.plugins.values()
    }

    /// Get all plugin names
    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Check if a plugin is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Remove a plugin, handing it back to the caller
    pub fn unload(&mut self, name: &str) -> Result<PluginHandle, PluginError> {
        match self.plugins.remove(name) {
            Some(plugin) => {
                tracing::info!("Unloaded plugin: {}", name);
                Ok(plugin)
            }
            None => Err(PluginError::NotFound(name.to_string())),
        }
    }

    /// Plugin function bound to a command name (case-insensitive)
    pub fn find_command(&self, command: &str) -> Option<CallableRef> {
        self.plugins.values().find_map(|plugin| {
            plugin
                .callables()
                .commands()
                .find(|(name, _)| name.eq_ignore_ascii_case(command))
                .map(|(_, function)| CallableRef {
                    plugin: plugin.name().to_string(),
                    function: function.to_string(),
                })
        })
    }

    /// `(seconds, callable)` for every interval job
    pub fn intervals(&self) -> Vec<(f64, CallableRef)> {
        self.collect(|callables| {
            callables
                .intervals()
                .map(|(secs, function)| (secs, function.to_string()))
                .collect()
        })
    }

    /// `(pattern, callable)` for every URL matcher
    pub fn url_patterns(&self) -> Vec<(String, CallableRef)> {
        self.collect(|callables| {
            callables
                .url_patterns()
                .map(|(pattern, function)| (pattern.to_string(), function.to_string()))
                .collect()
        })
    }

    /// Handlers registered for a protocol event (case-insensitive)
    pub fn event_handlers(&self, event: &str) -> Vec<CallableRef> {
        self.collect(|callables| {
            callables
                .events()
                .filter(|(name, _)| name.eq_ignore_ascii_case(event))
                .map(|(name, function)| (name.to_string(), function.to_string()))
                .collect()
        })
        .into_iter()
        .map(|(_, callable)| callable)
        .collect()
    }

    fn collect<K>(
        &self,
        select: impl Fn(&Callables) -> Vec<(K, String)>,
    ) -> Vec<(K, CallableRef)> {
        self.plugins
            .values()
            .flat_map(|plugin| {
                select(&plugin.callables())
                    .into_iter()
                    .map(|(key, function)| {
                        (
                            key,
                            CallableRef {
                                plugin: plugin.name().to_string(),
                                function,
                            },
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Get the number of loaded plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if no plugins are loaded
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl IntoIterator for PluginRegistry {
    type Item = PluginHandle;
    type IntoIter = std::collections::btree_map::IntoValues<String, PluginHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.plugins.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::lua::LuaRuntime;
    use std::fs;
    use std::path::Path;

    fn loaded(runtime: &LuaRuntime, dir: &Path, name: &str, source: &str) -> PluginHandle {
        let path = dir.join(format!("{}.lua", name));
        fs::write(&path, source).unwrap();
        let mut handle = PluginHandle::from_file(&path).unwrap();
        handle.load(runtime).unwrap();
        handle
    }

    #[test]
    fn test_register_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LuaRuntime::new().unwrap();
        let mut registry = PluginRegistry::new();

        registry
            .register(loaded(
                &runtime,
                dir.path(),
                "greet",
                "hello = plugin.commands('hello', 'hi')(function() end)\n\
                 tick = plugin.interval(30)(function() end)\n",
            ))
            .unwrap();
        registry
            .register(loaded(
                &runtime,
                dir.path(),
                "topic",
                "on_topic = plugin.event('TOPIC')(function() end)\n\
                 links = plugin.url('https?://example%.com/.*')(function() end)\n",
            ))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["greet", "topic"]);
        assert_eq!(
            registry.find_command("HI"),
            Some(CallableRef {
                plugin: "greet".to_string(),
                function: "hello".to_string()
            })
        );
        assert!(registry.find_command("missing").is_none());
        assert_eq!(registry.intervals()[0].0, 30.0);
        assert_eq!(registry.url_patterns().len(), 1);
        assert_eq!(registry.event_handlers("topic")[0].function, "on_topic");
    }

    #[test]
    fn test_rejects_duplicates_and_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LuaRuntime::new().unwrap();
        let mut registry = PluginRegistry::new();

        registry.register(loaded(&runtime, dir.path(), "dup", "")).unwrap();
        let sub = dir.path().join("again");
        fs::create_dir(&sub).unwrap();
        let err = registry.register(loaded(&runtime, &sub, "dup", "")).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyLoaded(_)));

        fs::write(dir.path().join("idle.lua"), "").unwrap();
        let idle = PluginHandle::from_file(dir.path().join("idle.lua")).unwrap();
        assert!(matches!(registry.register(idle), Err(PluginError::NotLoaded(_))));
    }

    #[test]
    fn test_unload() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LuaRuntime::new().unwrap();
        let mut registry = PluginRegistry::new();
        registry.register(loaded(&runtime, dir.path(), "gone", "")).unwrap();

        let handle = registry.unload("gone").unwrap();
        assert_eq!(handle.name(), "gone");
        assert!(registry.is_empty());
        assert!(matches!(registry.unload("gone"), Err(PluginError::NotFound(_))));
    }
}
