use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Strata operations
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("Compilation failed after {} attempt(s): {}", attempts.len(), attempts.join("; "))]
    CompilationFailed { attempts: Vec<String> },

    #[error("Build attempt failed: {0}")]
    BuildAttempt(String),

    #[error("Classpath scan failed: {0}")]
    ClasspathScanFailed(String),

    #[error("Could not read source {}: {reason}", path.display())]
    SourceReadFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build descriptor error: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, StrataError>;
