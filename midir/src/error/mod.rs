//! Error types

use crate::cfg::UnresolvedTarget;
use crate::ir::{BlockId, Value};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, IrError>;

/// IR construction, analysis and configuration error
#[derive(Debug, Error)]
pub enum IrError {
    #[error("Block `{name}` already exists in function `{function}`")]
    DuplicateBlock { function: String, name: String },

    /// An operand handle that is not a live value of the function
    #[error("Value {value} is not a live value of function `{function}`")]
    InvalidValue { function: String, value: Value },

    #[error("Block {block} does not exist in function `{function}`")]
    UnknownBlock { function: String, block: BlockId },

    /// Raised only by strict CFG construction; the default builder tolerates
    /// unresolved targets.
    #[error("Unresolved jump targets in function `{function}`: {}", format_targets(.targets))]
    UnresolvedTargets {
        function: String,
        targets: Vec<UnresolvedTarget>,
    },

    #[error("CFG of function `{function}` is inconsistent: {message}")]
    InvalidCfg { function: String, message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl IrError {
    pub fn duplicate_block(function: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateBlock {
            function: function.into(),
            name: name.into(),
        }
    }

    pub fn invalid_value(function: impl Into<String>, value: Value) -> Self {
        Self::InvalidValue {
            function: function.into(),
            value,
        }
    }

    pub fn unknown_block(function: impl Into<String>, block: BlockId) -> Self {
        Self::UnknownBlock {
            function: function.into(),
            block,
        }
    }

    pub fn invalid_cfg(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCfg {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Name of the function the error refers to, if any
    pub fn function(&self) -> Option<&str> {
        match self {
            Self::DuplicateBlock { function, .. }
            | Self::InvalidValue { function, .. }
            | Self::UnknownBlock { function, .. }
            | Self::UnresolvedTargets { function, .. }
            | Self::InvalidCfg { function, .. } => Some(function),
            Self::Config { .. } | Self::Io { .. } => None,
        }
    }
}

fn format_targets(targets: &[UnresolvedTarget]) -> String {
    targets
        .iter()
        .map(|t| format!("{} -> {}", t.block, t.target))
        .collect::<Vec<_>>()
        .join(", ")
}
