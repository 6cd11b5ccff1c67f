//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::application::errors::ConfigError;
use crate::domain::entities::BotInfo;
use crate::infrastructure::plugins::EntryPoint;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub plugins: PluginConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginConfig {
    /// Main plugin directory
    pub directory: PathBuf,
    /// More directories scanned after the main one
    pub extra_directories: Vec<PathBuf>,
    /// Directory of installed package manifests declaring entry points
    pub manifests_directory: Option<PathBuf>,
    /// Entry points declared directly in the config
    pub entry_points: Vec<EntryPoint>,
    /// When non-empty, only these plugins are enabled
    pub enable: Vec<String>,
    /// Plugins never enabled
    pub exclude: Vec<String>,
    pub auto_load: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "wirebot".to_string(),
            prefix: "!".to_string(),
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_dir(),
            extra_directories: Vec::new(),
            manifests_directory: None,
            entry_points: Vec::new(),
            enable: Vec::new(),
            exclude: Vec::new(),
            auto_load: true,
        }
    }
}

/// `~/.wirebot/plugins`, or `./plugins` without a home directory
fn default_plugin_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".wirebot").join("plugins"))
        .unwrap_or_else(|| PathBuf::from("./plugins"))
}

impl PluginConfig {
    /// Whether the plugin `name` should be loaded
    pub fn is_enabled(&self, name: &str) -> bool {
        if self.exclude.iter().any(|n| n == name) {
            return false;
        }
        self.enable.is_empty() || self.enable.iter().any(|n| n == name)
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("WIREBOT_PLUGINS_DIR") {
            config.plugins.directory = PathBuf::from(dir);
        }

        if let Ok(name) = std::env::var("BOT_NAME") {
            config.bot.name = name;
        }

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            config.bot.prefix = prefix;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.name.trim().is_empty() {
            return Err(ConfigError::MissingField("bot.name".to_string()));
        }
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::MissingField("bot.prefix".to_string()));
        }
        if let Some(name) = self.plugins.enable.iter().find(|n| self.plugins.exclude.contains(n)) {
            return Err(ConfigError::InvalidValue(format!(
                "plugin '{}' is both enabled and excluded",
                name
            )));
        }
        Ok(())
    }

    /// Identity passed to plugin hooks
    pub fn bot_info(&self) -> BotInfo {
        BotInfo::new(&self.bot.name, &self.bot.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
bot:
  name: helper
  prefix: "."
plugins:
  directory: /srv/bot/plugins
  extra-directories: [/srv/shared]
  manifests-directory: /srv/bot/packages
  entry-points:
    - name: weather
      value: weather.main
      group: wirebot.plugins
  exclude: [admin]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bot.name, "helper");
        assert_eq!(config.plugins.directory, PathBuf::from("/srv/bot/plugins"));
        assert_eq!(config.plugins.extra_directories.len(), 1);
        assert_eq!(config.plugins.entry_points[0].value, "weather.main");
        assert!(config.plugins.auto_load);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = serde_yaml::from_str("bot:\n  name: x\n  prefix: '!'\n").unwrap();
        assert!(config.plugins.entry_points.is_empty());
        assert!(config.plugins.enable.is_empty());
    }

    #[test]
    fn test_enable_and_exclude() {
        let mut plugins = PluginConfig::default();
        assert!(plugins.is_enabled("anything"));

        plugins.exclude = vec!["admin".to_string()];
        assert!(!plugins.is_enabled("admin"));
        assert!(plugins.is_enabled("dice"));

        plugins.enable = vec!["dice".to_string()];
        assert!(plugins.is_enabled("dice"));
        assert!(!plugins.is_enabled("weather"));
    }

    #[test]
    fn test_validate_conflicting_lists() {
        let mut config = Config::default();
        config.plugins.enable = vec!["dice".to_string()];
        config.plugins.exclude = vec!["dice".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_default_roundtrips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.bot.prefix, "!");
    }
}
