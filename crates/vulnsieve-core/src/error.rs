//! Error types for vulnsieve core

use std::path::PathBuf;

use thiserror::Error;

/// A built-in detection pattern failed to compile.
#[derive(Error, Debug)]
#[error("invalid pattern for {category} ({description}): {source}")]
pub struct CatalogError {
    pub category: &'static str,
    pub description: &'static str,
    #[source]
    pub source: regex::Error,
}

/// Faults that abort a whole scan. Per-file faults never surface here.
///
/// `Inaccessible` keeps the I/O error as text so the enum stays comparable.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScanError {
    /// Scan root does not exist
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// Scan root exists but cannot be inspected
    #[error("Cannot access {}: {reason}", .path.display())]
    Inaccessible { path: PathBuf, reason: String },
}

/// Faults raised while loading or running a collaborator.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PluginError {
    /// Module identifier has no loader in the module table
    #[error("plugin module not found: {category}.{module}")]
    ModuleNotFound { category: String, module: String },

    /// Loader ran but could not build the collaborator
    #[error("failed to load plugin {module}: {reason}")]
    Load { module: String, reason: String },

    /// Collaborator exposes neither entry point
    #[error("plugin {0} has no run() or run_plugin() entry point")]
    MissingEntryPoint(String),

    /// Argument present but of the wrong shape
    #[error("invalid argument `{key}`: {reason}")]
    InvalidArgument { key: String, reason: String },

    /// Collaborator failed while running
    #[error("{0}")]
    Execution(String),

    /// Collaborator panicked
    #[error("plugin panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl PluginError {
    pub fn invalid_argument(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
