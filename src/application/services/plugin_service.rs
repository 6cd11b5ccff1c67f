//! Plugin service - finds plugin candidates and drives their loading

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::application::errors::{PluginError, PluginResult};
use crate::domain::entities::BotInfo;
use crate::infrastructure::config::PluginConfig;
use crate::infrastructure::lua::LuaRuntime;
use crate::infrastructure::plugins::{
    discover_entry_points, list_plugin_filenames, EntryPoint, PluginHandle, PluginRegistry,
    ENTRY_POINT_GROUP,
};

/// A constructed handle waiting to be loaded
#[derive(Debug)]
pub struct PluginCandidate {
    pub handle: PluginHandle,
    pub enabled: bool,
    /// Put on the search path while loading (entry points from manifests)
    pub search_dir: Option<PathBuf>,
}

/// Outcome of [`PluginService::load_all`]
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub disabled: Vec<String>,
    pub failed: Vec<(String, PluginError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Service for discovering, loading and shutting down plugins
pub struct PluginService {
    bot: BotInfo,
    registry: PluginRegistry,
}

impl PluginService {
    pub fn new(bot: BotInfo) -> Self {
        Self {
            bot,
            registry: PluginRegistry::new(),
        }
    }

    /// Every plugin the config points at, in discovery order:
    /// main directory, extra directories, configured entry points, manifests.
    ///
    /// Sources that fail validation are logged and left out.
    pub fn enumerate(config: &PluginConfig) -> Vec<PluginCandidate> {
        let mut candidates = Vec::new();

        let directories = std::iter::once(&config.directory).chain(config.extra_directories.iter());
        for dir in directories {
            for handle in handles_from_directory(dir) {
                candidates.push(candidate(config, handle, None));
            }
        }

        for entry_point in &config.entry_points {
            if let Some(handle) = handle_from_entry_point(entry_point.clone()) {
                candidates.push(candidate(config, handle, None));
            }
        }

        if let Some(dir) = &config.manifests_directory {
            match discover_entry_points(dir, ENTRY_POINT_GROUP) {
                Ok(registered) => {
                    for reg in registered {
                        if let Some(handle) = handle_from_entry_point(reg.entry_point) {
                            candidates.push(candidate(config, handle, reg.search_dir));
                        }
                    }
                }
                Err(e) => warn!("Failed to read manifests from {}: {}", dir.display(), e),
            }
        }

        candidates
    }

    /// One candidate per name; later candidates replace earlier ones
    pub fn usable(candidates: Vec<PluginCandidate>) -> Vec<PluginCandidate> {
        let mut by_name = BTreeMap::new();
        for candidate in candidates {
            if let Some(previous) = by_name.insert(candidate.handle.name().to_string(), candidate) {
                debug!(
                    "Plugin {} from {} is overridden",
                    previous.handle.name(),
                    previous.handle.source()
                );
            }
        }
        by_name.into_values().collect()
    }

    /// Load every enabled candidate.
    ///
    /// A failing plugin is reported and skipped; the others still load.
    pub fn load_all(&mut self, runtime: &LuaRuntime, candidates: Vec<PluginCandidate>) -> LoadReport {
        let mut report = LoadReport::default();

        for candidate in candidates {
            let name = candidate.handle.name().to_string();
            if !candidate.enabled {
                debug!("Plugin {} is disabled", name);
                report.disabled.push(name);
                continue;
            }

            match self.load_one(runtime, candidate) {
                Ok(()) => report.loaded.push(name),
                Err(e) => {
                    warn!("Failed to load plugin {}: {}", name, e);
                    report.failed.push((name, e));
                }
            }
        }

        info!(
            "Loaded {} plugins ({} disabled, {} failed)",
            report.loaded.len(),
            report.disabled.len(),
            report.failed.len()
        );
        report
    }

    /// Load, set up and register a single candidate
    pub fn load_one(&mut self, runtime: &LuaRuntime, candidate: PluginCandidate) -> PluginResult<()> {
        let mut handle = candidate.handle;
        if self.registry.is_loaded(handle.name()) {
            return Err(PluginError::AlreadyLoaded(handle.name().to_string()));
        }

        {
            let _search_path = match &candidate.search_dir {
                Some(dir) => Some(runtime.push_search_dir(dir)?),
                None => None,
            };
            handle.load(runtime)?;
        }

        if handle.setup(runtime, &self.bot)? {
            debug!("Ran setup hook of plugin {}", handle.name());
        }

        self.registry.register(handle)
    }

    /// Run the `shutdown` hook of every loaded plugin; returns how many ran
    pub fn shutdown_all(&self, runtime: &LuaRuntime) -> usize {
        let mut count = 0;
        for plugin in self.registry.all().filter(|p| p.has_shutdown()) {
            match plugin.shutdown(runtime, &self.bot) {
                Ok(_) => count += 1,
                Err(e) => warn!("Shutdown hook of plugin {} failed: {}", plugin.name(), e),
            }
        }
        count
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn bot(&self) -> &BotInfo {
        &self.bot
    }
}

fn candidate(config: &PluginConfig, handle: PluginHandle, search_dir: Option<PathBuf>) -> PluginCandidate {
    PluginCandidate {
        enabled: config.is_enabled(handle.name()),
        handle,
        search_dir,
    }
}

fn handles_from_directory(dir: &Path) -> Vec<PluginHandle> {
    if !dir.exists() {
        warn!("Plugin directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let filenames = match list_plugin_filenames(dir) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to read plugin directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    filenames
        .into_iter()
        .filter_map(|found| match PluginHandle::from_path(&found.path) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Skipping plugin {}: {}", found.name, e);
                None
            }
        })
        .collect()
}

fn handle_from_entry_point(entry_point: EntryPoint) -> Option<PluginHandle> {
    if entry_point.group != ENTRY_POINT_GROUP {
        debug!("Ignoring entry point {} of group {}", entry_point, entry_point.group);
        return None;
    }

    match PluginHandle::from_entry_point(entry_point) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Skipping entry point: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::plugins::PluginKind;
    use std::fs;

    fn config_for(dir: &Path) -> PluginConfig {
        PluginConfig {
            directory: dir.to_path_buf(),
            ..PluginConfig::default()
        }
    }

    #[test]
    fn test_enumerate_directory_and_entry_points() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("greet.lua"), "").unwrap();
        fs::write(dir.path().join("old.luac"), "").unwrap();

        let mut config = config_for(dir.path());
        config.entry_points = vec![
            EntryPoint::new("weather", "weather.main", ENTRY_POINT_GROUP),
            EntryPoint::new("other", "other.mod", "someone.else"),
            EntryPoint::new("broken", "not a module", ENTRY_POINT_GROUP),
        ];
        config.exclude = vec!["weather".to_string()];

        let candidates = PluginService::enumerate(&config);
        let summary: Vec<(&str, PluginKind, bool)> = candidates
            .iter()
            .map(|c| (c.handle.name(), c.handle.kind(), c.enabled))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("greet", PluginKind::LuaFile, true),
                ("weather", PluginKind::EntryPoint, false),
            ]
        );
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir.path().join("absent"));
        assert!(PluginService::enumerate(&config).is_empty());
    }

    #[test]
    fn test_later_candidates_override() {
        let main = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        fs::write(main.path().join("dice.lua"), "").unwrap();
        fs::create_dir(extra.path().join("dice")).unwrap();
        fs::write(extra.path().join("dice").join("init.lua"), "").unwrap();

        let mut config = config_for(main.path());
        config.extra_directories = vec![extra.path().to_path_buf()];

        let usable = PluginService::usable(PluginService::enumerate(&config));
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].handle.kind(), PluginKind::LuaPackage);
    }

    #[test]
    fn test_load_all_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.lua"), "function setup(bot) ready = bot.name end\n").unwrap();
        fs::write(dir.path().join("bad.lua"), "error('nope')\n").unwrap();
        fs::write(dir.path().join("off.lua"), "").unwrap();

        let mut config = config_for(dir.path());
        config.exclude = vec!["off".to_string()];

        let runtime = LuaRuntime::new().unwrap();
        let mut service = PluginService::new(BotInfo::new("wirebot", "!"));
        let candidates = PluginService::usable(PluginService::enumerate(&config));
        let report = service.load_all(&runtime, candidates);

        assert_eq!(report.loaded, vec!["good"]);
        assert_eq!(report.disabled, vec!["off"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert!(!report.is_clean());
        assert!(service.registry().is_loaded("good"));
        assert!(!service.registry().is_loaded("bad"));
    }

    #[test]
    fn test_manifest_entry_point_uses_scoped_search_dir() {
        let packages = tempfile::tempdir().unwrap();
        let lua_dir = packages.path().join("lua");
        fs::create_dir(&lua_dir).unwrap();
        fs::write(lua_dir.join("forecast.lua"), "rain = plugin.commands('rain')(function() end)\n").unwrap();
        fs::write(
            packages.path().join("forecast.yaml"),
            "name: forecast-pkg\nsearch-path: lua\nentry-points:\n  wirebot.plugins:\n    weather: forecast\n",
        )
        .unwrap();

        let empty = tempfile::tempdir().unwrap();
        let mut config = config_for(empty.path());
        config.manifests_directory = Some(packages.path().to_path_buf());

        let runtime = LuaRuntime::new().unwrap();
        let before = runtime.search_path().unwrap();
        let mut service = PluginService::new(BotInfo::new("wirebot", "!"));
        let report = service.load_all(&runtime, PluginService::enumerate(&config));

        assert!(report.is_clean(), "{:?}", report.failed);
        assert_eq!(runtime.search_path().unwrap(), before);
        let found = service.registry().find_command("rain").unwrap();
        assert_eq!(found.plugin, "weather");
        assert_eq!(found.function, "rain");
    }

    #[test]
    fn test_shutdown_all_counts_hooks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.lua"), "function shutdown(bot) end\n").unwrap();
        fs::write(dir.path().join("b.lua"), "function shutdown(bot) error('stuck') end\n").unwrap();
        fs::write(dir.path().join("c.lua"), "x = 1\n").unwrap();

        let runtime = LuaRuntime::new().unwrap();
        let mut service = PluginService::new(BotInfo::new("wirebot", "!"));
        service.load_all(&runtime, PluginService::enumerate(&config_for(dir.path())));

        assert_eq!(service.registry().len(), 3);
        assert_eq!(service.shutdown_all(&runtime), 1);
    }
}
