// src/core/tuning.rs
//! Threshold tuning from what a project looks like.

use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;
use super::metadata::detect_architecture;
use super::source::{java_files, SourceReader};

/// Above this many sources, sequence tracing is switched off
pub const LARGE_PROJECT_FILES: usize = 500;

/// Architectures that usually come split into several build units
const MODULAR_ARCHITECTURES: [&str; 4] = ["Spring Boot", "Camunda BPM", "Apache Camel", "Feign Client"];

/// Adjust `config` to the project at `project`
pub fn apply(config: &mut Config, project: &Path) {
    let reader = match SourceReader::new() {
        Ok(reader) => reader,
        Err(e) => {
            warn!("⚠️ Auto-tuning skipped: {}", e);
            return;
        }
    };

    let files = java_files(project).len();
    if files > LARGE_PROJECT_FILES {
        config.sequence.enabled = false;
        info!("🎛️ {} source files, sequence tracing disabled", files);
    }

    let architecture = detect_architecture(&reader, project);
    config.execution.detect_multi_module = MODULAR_ARCHITECTURES.contains(&architecture.as_str());
    info!(
        "🎛️ Tuned for {} ({} files): multi-module detection {}",
        architecture,
        files,
        if config.execution.detect_multi_module { "on" } else { "off" }
    );
}
