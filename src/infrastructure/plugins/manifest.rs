//! Package manifests - declare entry points for installed plugin packages
//!
//! ```yaml
//! name: wirebot-weather
//! version: 1.2.0
//! search-path: lua
//! entry-points:
//!   wirebot.plugins:
//!     weather: weather.main
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::application::errors::PluginError;
use super::entry_point::EntryPoint;

/// Installed package metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginManifest {
    /// Package name (required)
    pub name: String,

    /// Package version
    #[serde(default)]
    pub version: Option<String>,

    /// Package description
    #[serde(default)]
    pub description: Option<String>,

    /// Directory holding the package's modules, relative to the manifest
    #[serde(default)]
    pub search_path: Option<PathBuf>,

    /// `group -> (name -> target)`
    #[serde(default)]
    pub entry_points: BTreeMap<String, BTreeMap<String, String>>,
}

/// An entry point together with where its package keeps its modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEntryPoint {
    pub entry_point: EntryPoint,
    /// Directory to put on the search path while loading
    pub search_dir: Option<PathBuf>,
    pub package: String,
    pub version: Option<String>,
}

impl PluginManifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PluginError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PluginError::Manifest(format!("Failed to read manifest: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| PluginError::Manifest(format!("Failed to parse manifest: {}", e)))
    }

    /// Entry points of one group; `base` is the manifest's directory
    pub fn entry_points(&self, group: &str, base: &Path) -> Vec<RegisteredEntryPoint> {
        let Some(declared) = self.entry_points.get(group) else {
            return Vec::new();
        };

        let search_dir = self.search_path.as_ref().map(|p| base.join(p));
        declared
            .iter()
            .map(|(name, target)| RegisteredEntryPoint {
                entry_point: EntryPoint::new(name.clone(), target.clone(), group),
                search_dir: search_dir.clone(),
                package: self.name.clone(),
                version: self.version.clone(),
            })
            .collect()
    }
}

/// Collect entry points of `group` from every `*.yaml`/`*.yml` manifest in `dir`.
///
/// A missing directory yields nothing; unreadable manifests are skipped.
pub fn discover_entry_points(dir: impl AsRef<Path>, group: &str) -> Result<Vec<RegisteredEntryPoint>, PluginError> {
    let dir = dir.as_ref();
    let mut found = Vec::new();

    if !dir.exists() {
        warn!("Manifest directory does not exist: {}", dir.display());
        return Ok(found);
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| PluginError::Manifest(format!("Failed to read manifest directory: {}", e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
        })
        .collect();
    paths.sort();

    for path in paths {
        match PluginManifest::from_file(&path) {
            Ok(manifest) => found.extend(manifest.entry_points(group, dir)),
            Err(e) => warn!("Skipping manifest {}: {}", path.display(), e),
        }
    }

    Ok(found)
}
