//! Pipeline configuration (midir.toml)
//!
//! ```toml
//! [opt]
//! level = "release"
//! max_iterations = 10
//! rebuild_cfg = true
//! ```
//!
//! Every field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IrError, Result};
use crate::opt::OptLevel;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optimization settings
    #[serde(default)]
    pub opt: OptConfig,
}

/// `[opt]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OptConfig {
    /// Pass set to run (default: "debug", no passes)
    #[serde(default)]
    pub level: OptLevel,

    /// Upper bound on pipeline iterations per function (default: 10)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Rebuild the CFG of functions the passes changed (default: true)
    #[serde(default = "default_rebuild_cfg")]
    pub rebuild_cfg: bool,
}

fn default_max_iterations() -> usize {
    10
}

fn default_rebuild_cfg() -> bool {
    true
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            level: OptLevel::default(),
            max_iterations: default_max_iterations(),
            rebuild_cfg: default_rebuild_cfg(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| IrError::config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| IrError::io_error(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IrError::config_error(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.opt.max_iterations == 0 {
            return Err(IrError::config_error("opt.max_iterations must be at least 1"));
        }
        Ok(())
    }
}
