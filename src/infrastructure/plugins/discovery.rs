//! Plugin discovery - lists plugin sources found directly inside a directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use super::handle::{PACKAGE_INITIALIZER, SOURCE_EXTENSION};

/// A plugin source found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFilename {
    /// Entry name without the source extension
    pub name: String,
    /// Absolute path of the entry; symlinks are kept, not replaced by their target
    pub path: PathBuf,
}

/// List plugin files and package directories inside `dir`.
///
/// Entries that cannot be resolved (dangling symlinks, vanished files) are
/// skipped. Only failing to read `dir` itself is an error.
pub fn list_plugin_filenames(dir: impl AsRef<Path>) -> io::Result<Vec<PluginFilename>> {
    let dir = fs::canonicalize(dir.as_ref())?;
    let mut found = Vec::new();

    for entry in fs::read_dir(&dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        let resolved = match fs::canonicalize(&path) {
            Ok(p) => p,
            Err(e) => {
                debug!("Plugin path does not resolve, skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let name = if resolved.is_dir() {
            if !resolved.join(PACKAGE_INITIALIZER).is_file() {
                continue;
            }
            if file_name.contains('.') {
                debug!("Package name is not a module name, skipping {}", path.display());
                continue;
            }
            file_name.to_string()
        } else {
            let Some(stem) = file_name.strip_suffix(&format!(".{}", SOURCE_EXTENSION)) else {
                continue;
            };
            if stem.is_empty() || !resolved.is_file() {
                continue;
            }
            stem.to_string()
        };

        found.push(PluginFilename { name, path });
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}
