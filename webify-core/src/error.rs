//! Error taxonomy for a build run.
//!
//! Every variant is fatal. Non-fatal findings are reported as
//! [`Diagnostic`](crate::models::Diagnostic)s instead.

use serde_yaml::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BuildError {
    /// Malformed input: ambiguous links, unmergeable patches, missing
    /// required fields.
    #[error("{message}")]
    Structural { message: String },

    #[error("{what} {} could not be found", path.display())]
    MissingResource { what: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid notebook: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render page: {0}")]
    Render(#[from] askama::Error),
}

impl BuildError {
    pub fn structural(message: impl Into<String>) -> Self {
        BuildError::Structural {
            message: message.into(),
        }
    }

    /// Structural error that quotes the offending node.
    pub fn malformed(message: impl fmt::Display, node: &Value) -> Self {
        let repr = serde_yaml::to_string(node).unwrap_or_else(|_| format!("{:?}", node));
        BuildError::Structural {
            message: format!("{}:\n{}", message, repr.trim_end()),
        }
    }

    pub fn missing(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        BuildError::MissingResource {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, BuildError::Structural { .. })
    }

    pub fn is_missing_resource(&self) -> bool {
        matches!(self, BuildError::MissingResource { .. })
    }
}
