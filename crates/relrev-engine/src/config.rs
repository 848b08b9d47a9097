use std::path::Path;

use relrev_codec::DEFAULT_TRUNCATED_TEXT_LEN;
use relrev_store::StoreBackend;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Most issues kept per item, counting the one just appended.
pub const DEFAULT_ISSUE_HISTORY_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: StoreBackend,
    pub issue_history_limit: usize,
    pub truncated_text_len: usize,
    pub seed_default_users: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            issue_history_limit: DEFAULT_ISSUE_HISTORY_LIMIT,
            truncated_text_len: DEFAULT_TRUNCATED_TEXT_LEN,
            seed_default_users: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.issue_history_limit == 0 {
            return Err(EngineError::Config("issue_history_limit must be at least 1".into()));
        }
        if self.truncated_text_len == 0 {
            return Err(EngineError::Config("truncated_text_len must be at least 1".into()));
        }
        Ok(())
    }
}
