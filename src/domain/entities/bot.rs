use serde::{Deserialize, Serialize};

/// Bot identity handed to plugin `setup` and `shutdown` hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    pub name: String,
    pub prefix: String,
}

impl BotInfo {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
        }
    }
}
