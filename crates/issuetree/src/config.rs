//! Configuration management for issuetree.
//!
//! Configuration lives in a small YAML file:
//!
//! ```yaml
//! rollup:
//!   stale-after-days: 14
//!   count-new-as-active: true
//! fields:
//!   epic-link: customfield_12311140
//!   parent-link: customfield_12313140
//! ```
//!
//! Every section is optional; missing sections fall back to [`Default`].

use crate::error::{Error, Result};
use crate::rollup::RollupPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Default name of the configuration file
pub const CONFIG_FILE_NAME: &str = "issuetree.yaml";

/// Default custom field carrying the epic link
pub const DEFAULT_EPIC_LINK_FIELD: &str = "customfield_12311140";

/// Default custom field carrying the hierarchy ("Parent Link") parent
pub const DEFAULT_PARENT_LINK_FIELD: &str = "customfield_12313140";

/// Top-level configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuetreeConfig {
    /// Roll-up thresholds
    #[serde(default)]
    pub rollup: RollupPolicy,

    /// Tracker field names used when translating raw records
    #[serde(default)]
    pub fields: FieldMap,
}

/// Names of the tracker-specific custom fields that carry parent references.
///
/// Custom field ids differ between tracker instances, so they are
/// configuration rather than constants baked into record translation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct FieldMap {
    /// Field holding the epic key of a story
    pub epic_link: String,

    /// Field holding the hierarchy parent key
    pub parent_link: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            epic_link: DEFAULT_EPIC_LINK_FIELD.to_string(),
            parent_link: DEFAULT_PARENT_LINK_FIELD.to_string(),
        }
    }
}

impl IssuetreeConfig {
    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from `path` if given, otherwise use defaults.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check values that deserialize fine but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.rollup.stale_after_days <= 0 {
            return Err(Error::Config(format!(
                "stale-after-days must be positive, got {}",
                self.rollup.stale_after_days
            )));
        }

        for (name, value) in [
            ("epic-link", &self.fields.epic_link),
            ("parent-link", &self.fields.parent_link),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("field name '{name}' cannot be empty")));
            }
        }

        Ok(())
    }
}
