//! Entry points - named references to a plugin module declared by a package

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use crate::application::errors::{PluginError, PluginResult};

/// Group the bot reads plugin entry points from
pub const ENTRY_POINT_GROUP: &str = "wirebot.plugins";

/// `module.path` optionally followed by `:attr.path`
static TARGET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<module>[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*(?::\s*(?P<attr>[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*)?$",
    )
    .expect("entry point pattern is valid")
});

/// A `(group, name, target)` registration record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct EntryPoint {
    /// Declared plugin name
    pub name: String,
    /// Target specifier, `module.path[:attr]`
    pub value: String,
    pub group: String,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, value: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            group: group.into(),
        }
    }

    /// Check the record is well formed. Does not touch the search path.
    pub fn validate(&self) -> PluginResult<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("empty name"));
        }
        if self.name.chars().any(|c| c.is_whitespace() || c == '=') {
            return Err(self.invalid("name contains whitespace or '='"));
        }
        if self.group.trim().is_empty() {
            return Err(self.invalid("empty group"));
        }
        if self.target().is_none() {
            return Err(self.invalid(format!("malformed target '{}'", self.value)));
        }
        Ok(())
    }

    /// Module part of the target
    pub fn module(&self) -> Option<&str> {
        self.target().map(|(module, _)| module)
    }

    /// Attribute part of the target, if any
    pub fn attr(&self) -> Option<&str> {
        self.target().and_then(|(_, attr)| attr)
    }

    fn target(&self) -> Option<(&str, Option<&str>)> {
        let caps = TARGET_PATTERN.captures(&self.value)?;
        let module = caps.name("module")?.as_str();
        let attr = caps.name("attr").map(|m| m.as_str());
        Some((module, attr))
    }

    fn invalid(&self, reason: impl Into<String>) -> PluginError {
        PluginError::InvalidEntryPoint {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}
