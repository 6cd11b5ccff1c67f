//! Loaded plugin module - what a handle holds once its code has run

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use mlua::RegistryKey;
use crate::domain::entities::{Callable, Callables, Tag};

/// Hook called after a plugin is loaded
pub const SETUP_HOOK: &str = "setup";

/// Hook called when the bot shuts down
pub const SHUTDOWN_HOOK: &str = "shutdown";

/// Module-level string read as the plugin version
pub const VERSION_ATTR: &str = "VERSION";

/// Lua type of a module-level name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Function,
    Table,
    String,
    Number,
    Boolean,
    Other,
}

/// One module-level name and the tags attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub tags: Vec<Tag>,
}

impl Attribute {
    pub fn is_function(&self) -> bool {
        self.kind == AttributeKind::Function
    }
}

/// Executed plugin code
///
/// The attribute map is captured right after execution; the live module
/// table stays in the Lua registry behind `key` so hooks can be called.
#[derive(Debug)]
pub struct LoadedModule {
    pub(crate) key: RegistryKey,
    origin: PathBuf,
    doc: Option<String>,
    version: Option<String>,
    attributes: BTreeMap<String, Attribute>,
    loaded_at: DateTime<Utc>,
}

impl LoadedModule {
    pub(crate) fn new(
        key: RegistryKey,
        origin: PathBuf,
        doc: Option<String>,
        version: Option<String>,
        attributes: BTreeMap<String, Attribute>,
    ) -> Self {
        Self {
            key,
            origin,
            doc,
            version,
            attributes,
            loaded_at: Utc::now(),
        }
    }

    /// File whose code was executed
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// First line of the leading comment block of the source
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// All module-level names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Tagged functions of the module
    pub fn callables(&self) -> Callables {
        Callables::new(
            self.attributes
                .iter()
                .filter(|(_, attr)| attr.is_function() && !attr.tags.is_empty())
                .map(|(name, attr)| Callable::new(name.clone(), attr.tags.clone()))
                .collect(),
        )
    }

    pub fn has_setup(&self) -> bool {
        self.has_function(SETUP_HOOK)
    }

    pub fn has_shutdown(&self) -> bool {
        self.has_function(SHUTDOWN_HOOK)
    }

    fn has_function(&self, name: &str) -> bool {
        self.attributes
            .get(name)
            .map(Attribute::is_function)
            .unwrap_or(false)
    }
}

/// Extract the first text line of the leading `--` comment block
pub(crate) fn leading_comment(source: &str) -> Option<String> {
    for (idx, line) in source.lines().enumerate() {
        let line = line.trim();
        if idx == 0 && line.starts_with("#!") {
            continue;
        }
        if line.is_empty() {
            continue;
        }
        let Some(comment) = line.strip_prefix("--") else {
            return None;
        };
        let text = comment
            .trim_start_matches(&['-', '[', '='][..])
            .trim_end_matches(&[']', '='][..])
            .trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }
    None
}
