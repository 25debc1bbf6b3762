use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::core::tuning;
use crate::error::{Result, StrataError};

/// Candidate config file names, searched in the working directory
const CONFIG_CANDIDATES: [&str; 3] = ["Strata.toml", "strata.toml", ".strata.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General run settings
    pub general: GeneralConfig,

    /// Structural extraction limits
    #[serde(alias = "uml")]
    pub structure: StructureConfig,

    /// Compilation and scheduling
    pub execution: ExecutionConfig,

    /// Behavioral extraction settings
    pub sequence: SequenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory the JSON handoff is written to
    pub output_dir: PathBuf,

    /// Re-tune thresholds from the analyzed project before each run
    pub auto_tune: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Hard cap on emitted class nodes per module
    #[serde(alias = "max_class_count", alias = "limit_classes")]
    pub max_classes: usize,

    /// Maximum number of distinct packages accepted into the package filter
    #[serde(alias = "max_packages")]
    pub package_cap: usize,

    /// Depth used when hunting for nested `classes` directories
    #[serde(alias = "max_scan_depth")]
    pub scan_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-attempt build timeout, in minutes
    #[serde(alias = "compile_timeout", alias = "timeout_minutes")]
    pub compile_timeout_minutes: u64,

    /// Split the root into independently built modules
    pub detect_multi_module: bool,

    /// Upper bound on concurrently processed modules
    pub max_workers: usize,

    pub use_maven_wrapper: bool,
    pub use_gradle_wrapper: bool,

    /// Fall back to a direct javac pass when build tools fail
    #[serde(alias = "fallback_to_java_compiler")]
    pub fallback_to_javac: bool,

    pub clean_before_compile: bool,
    pub skip_tests: bool,

    /// Local dependency caches scanned for the fallback classpath (read-only).
    /// Empty means the usual Maven and Gradle caches under the home directory.
    pub dependency_cache_dirs: Vec<PathBuf>,

    /// Cap on jars placed on the fallback classpath
    pub max_classpath_jars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Whether call sequences are traced at all
    pub enabled: bool,

    /// Case-insensitive patterns for call names that never become edges
    #[serde(alias = "ignored_patterns", alias = "ignore_list")]
    pub ignore_patterns: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("strata-output"),
            auto_tune: false,
        }
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            max_classes: 500,
            package_cap: 150,
            scan_depth: 4,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            compile_timeout_minutes: 5,
            detect_multi_module: true,
            max_workers: 2,
            use_maven_wrapper: true,
            use_gradle_wrapper: true,
            fallback_to_javac: true,
            clean_before_compile: true,
            skip_tests: true,
            dependency_cache_dirs: Vec::new(),
            max_classpath_jars: 400,
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        let ignore_patterns = [
            "get.*", "set.*", "to.*", "from.*",
            "equals", "hashcode", "tostring", "builder", "mapstruct.*",
            "trace", "debug", "info", "warn", "error", "logger",
            "valid.*", "validate.*", "check.*",
            ".*dto.*", ".*entity.*", ".*converter.*", ".*util.*",
        ];

        Self {
            enabled: true,
            ignore_patterns: ignore_patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ExecutionConfig {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_minutes.max(1) * 60)
    }

    /// Dependency caches to search, falling back to `~/.m2` and the Gradle module cache
    pub fn dependency_caches(&self) -> Vec<PathBuf> {
        if !self.dependency_cache_dirs.is_empty() {
            return self.dependency_cache_dirs.clone();
        }

        match dirs::home_dir() {
            Some(home) => vec![
                home.join(".m2").join("repository"),
                home.join(".gradle").join("caches").join("modules-2").join("files-2.1"),
            ],
            None => Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| StrataError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StrataError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                for candidate in &CONFIG_CANDIDATES {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    /// Re-read the configuration and re-apply tuning for the session's last analyzed project
    pub fn reload(session: &ConfigSession) -> Result<Self> {
        info!("🔄 Reloading configuration");
        let mut config = Self::load_or_default(session.config_path.as_deref())?;

        if config.general.auto_tune {
            if let Some(project) = &session.last_analyzed {
                tuning::apply(&mut config, project);
            }
        }

        debug!("Reloaded configuration: {:?}", config);
        Ok(config)
    }
}

/// State a reload needs: where the configuration came from and what was analyzed last
#[derive(Debug, Clone, Default)]
pub struct ConfigSession {
    pub config_path: Option<PathBuf>,
    pub last_analyzed: Option<PathBuf>,
}

impl ConfigSession {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            last_analyzed: None,
        }
    }

    pub fn record_analysis(&mut self, project: &Path) {
        self.last_analyzed = Some(project.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("strata.toml");
        file.write_str("[structure]\nmax_classes = 42\n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.structure.max_classes, 42);
        assert_eq!(config.structure.package_cap, 150);
        assert_eq!(config.execution.compile_timeout_minutes, 5);
        assert!(config.sequence.ignore_patterns.iter().any(|p| p == "tostring"));
    }

    #[test]
    fn test_legacy_aliases() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("strata.toml");
        file.write_str(
            "[uml]\nlimit_classes = 10\n\n[execution]\ntimeout_minutes = 3\n\n[sequence]\nignore_list = [\"audit\"]\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.structure.max_classes, 10);
        assert_eq!(config.execution.compile_timeout(), Duration::from_secs(180));
        assert_eq!(config.sequence.ignore_patterns, vec!["audit".to_string()]);
    }

    #[test]
    fn test_save_and_load() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.path().join("strata.toml");

        let mut config = Config::default();
        config.execution.max_workers = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.execution.max_workers, 7);
    }

    #[test]
    fn test_reload_uses_session_state() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("strata.toml");
        file.write_str("[general]\nauto_tune = true\n\n[execution]\ndetect_multi_module = true\n")
            .unwrap();

        let project = temp.child("project");
        project
            .child("src/main/java/App.java")
            .write_str("public class App { public static void main(String[] a) {} }")
            .unwrap();

        let mut session = ConfigSession::new(Some(file.path().to_path_buf()));
        let before = Config::reload(&session).unwrap();
        assert!(before.execution.detect_multi_module);

        session.record_analysis(project.path());
        let after = Config::reload(&session).unwrap();
        // Plain Java projects are tuned down to a single module
        assert!(!after.execution.detect_multi_module);
    }
}
