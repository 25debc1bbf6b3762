// src/core/modules.rs
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::ExecutionConfig;
use crate::error::{Result, StrataError};

/// Build descriptors that make a directory a buildable unit on their own
const BUILD_FILES: [&str; 3] = ["pom.xml", "build.gradle", "build.gradle.kts"];

/// Directories never searched for modules
const SKIPPED_DIRS: [&str; 5] = ["target", "build", "out", "bin", "node_modules"];

/// One independently built unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRoot {
    pub name: String,
    pub path: PathBuf,
}

/// Splits a project root into its buildable units
pub struct ModuleResolver {
    detect_multi_module: bool,
}

impl ModuleResolver {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            detect_multi_module: config.detect_multi_module,
        }
    }

    /// Partition `root`. Single-module projects yield `[root]`.
    pub fn partition(&self, root: &Path) -> Result<Vec<ModuleRoot>> {
        if !root.is_dir() {
            return Err(StrataError::ResourceNotFound(root.to_path_buf()));
        }

        let whole = vec![ModuleRoot {
            name: module_name(root),
            path: root.to_path_buf(),
        }];

        if !self.detect_multi_module {
            debug!("Multi-module detection disabled, using {}", root.display());
            return Ok(whole);
        }

        let mut qualifiers: Vec<PathBuf> = Vec::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e));

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_dir() || !is_buildable(entry.path()) {
                continue;
            }

            // Sorted walk visits parents first, so nested qualifiers are absorbed here
            if qualifiers.iter().any(|q| entry.path().starts_with(q)) {
                continue;
            }
            qualifiers.push(entry.into_path());
        }

        if qualifiers.len() < 2 {
            return Ok(whole);
        }

        info!("🧱 Multi-module project: {} modules", qualifiers.len());
        Ok(qualifiers
            .into_iter()
            .map(|path| ModuleRoot {
                name: relative_name(root, &path),
                path,
            })
            .collect())
    }
}

/// A directory with a build descriptor or a conventional source root
pub fn is_buildable(dir: &Path) -> bool {
    BUILD_FILES.iter().any(|f| dir.join(f).is_file())
        || dir.join("src").join("main").join("java").is_dir()
        || dir.join("src").is_dir()
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn module_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string())
}

/// `parent/child` style name relative to the project root
fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| module_name(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn resolver(detect: bool) -> ModuleResolver {
        let mut config = ExecutionConfig::default();
        config.detect_multi_module = detect;
        ModuleResolver::new(&config)
    }

    #[test]
    fn test_two_independent_units() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("orders/pom.xml").write_str("<project/>").unwrap();
        temp.child("orders/src/main/java/A.java").write_str("class A {}").unwrap();
        temp.child("billing/build.gradle").write_str("").unwrap();
        temp.child("docs/readme.txt").write_str("").unwrap();

        let modules = resolver(true).partition(temp.path()).unwrap();
        let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["billing", "orders"]);
    }

    #[test]
    fn test_single_unit_is_the_root() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("pom.xml").write_str("<project/>").unwrap();
        temp.child("src/main/java/A.java").write_str("class A {}").unwrap();

        let modules = resolver(true).partition(temp.path()).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].path, temp.path());
    }

    #[test]
    fn test_nested_qualifiers_are_absorbed() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app/pom.xml").write_str("<project/>").unwrap();
        temp.child("app/src/Main.java").write_str("class Main {}").unwrap();
        temp.child("app/core/pom.xml").write_str("<project/>").unwrap();
        temp.child("target/classes/pom.xml").write_str("").unwrap();
        temp.child("lib/src/Util.java").write_str("class Util {}").unwrap();

        let modules = resolver(true).partition(temp.path()).unwrap();
        let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["app", "lib"]);
    }

    #[test]
    fn test_detection_disabled() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a/pom.xml").write_str("<project/>").unwrap();
        temp.child("b/pom.xml").write_str("<project/>").unwrap();

        let modules = resolver(false).partition(temp.path()).unwrap();
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn test_missing_root() {
        let err = resolver(true).partition(Path::new("/no/such/root")).unwrap_err();
        assert!(matches!(err, StrataError::ResourceNotFound(_)));
    }
}
