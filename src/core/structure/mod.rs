// src/core/structure/mod.rs
//! Class graph recovery from compiled output.

mod classfile;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::StructureConfig;
use crate::error::{Result, StrataError};
use super::model::{ClassGraph, ClassNode};
use classfile::ClassHeader;

#[cfg(test)]
pub(crate) use classfile::synthesize;

/// Conventional compiled-output locations, relative to a module root
pub const CLASS_DIR_CANDIDATES: [&str; 3] = ["target/classes", "build/classes/java/main", "bin"];

const TRIVIAL_SUPERCLASS: &str = "java/lang/Object";

/// Compiled-class directories under `root` that actually hold `.class` files.
/// Conventional locations come first; a directory nested in (or enclosing) one
/// already found is not listed again.
pub fn find_class_dirs(root: &Path, depth: usize) -> Vec<PathBuf> {
    let conventional = CLASS_DIR_CANDIDATES.iter().map(|c| root.join(c));
    let discovered = WalkDir::new(root)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.file_name().to_string_lossy().ends_with("classes"))
        .map(|e| e.into_path());

    let mut found: Vec<PathBuf> = Vec::new();
    let mut canonical: Vec<PathBuf> = Vec::new();

    for dir in conventional.chain(discovered) {
        if !dir.is_dir() {
            continue;
        }
        let real = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        if canonical.iter().any(|c| real.starts_with(c) || c.starts_with(&real)) {
            continue;
        }
        if !contains_class_files(&dir) {
            continue;
        }

        canonical.push(real);
        found.push(dir);
    }

    found
}

fn contains_class_files(dir: &Path) -> bool {
    class_files(dir).next().is_some()
}

fn class_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().map(|x| x == "class").unwrap_or(false))
        .map(|e| e.into_path())
}

/// Package of a class file, from its path relative to the classes root
fn package_of(classes_root: &Path, class_file: &Path) -> Option<String> {
    let relative = class_file.strip_prefix(classes_root).ok()?;
    let parent = relative.parent()?;
    let package = parent
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(".");
    Some(package)
}

/// Simple name from an internal name such as `com/acme/Outer$Inner`
pub fn simple_name(internal: &str) -> String {
    internal
        .rsplit(|c: char| c == '/' || c == '$')
        .next()
        .unwrap_or(internal)
        .to_string()
}

pub struct StructuralExtractor {
    max_classes: usize,
    package_cap: usize,
}

impl StructuralExtractor {
    pub fn new(config: &StructureConfig) -> Self {
        Self {
            max_classes: config.max_classes,
            package_cap: config.package_cap,
        }
    }

    /// Distinct packages seen under the class directories, at most `package_cap`
    pub fn detect_packages(&self, class_dirs: &[PathBuf]) -> BTreeSet<String> {
        let mut packages = BTreeSet::new();

        for dir in class_dirs {
            for file in class_files(dir) {
                if let Some(package) = package_of(dir, &file) {
                    if packages.len() >= self.package_cap && !packages.contains(&package) {
                        debug!("Package cap {} reached, ignoring {}", self.package_cap, package);
                        continue;
                    }
                    packages.insert(package);
                }
            }
        }

        packages
    }

    /// Build the class graph. Any unreadable or undecodable class file fails the scan.
    pub fn extract(&self, class_dirs: &[PathBuf]) -> Result<ClassGraph> {
        let packages = self.detect_packages(class_dirs);
        info!("📦 {} packages detected", packages.len());

        let mut graph = ClassGraph {
            classes: Vec::new(),
            packages,
            truncated: false,
        };

        'dirs: for dir in class_dirs {
            for file in class_files(dir) {
                let in_filter = package_of(dir, &file)
                    .map(|p| graph.packages.contains(&p))
                    .unwrap_or(false);
                if !in_filter || is_descriptor_file(&file) {
                    continue;
                }

                let bytes = std::fs::read(&file).map_err(|e| {
                    StrataError::ClasspathScanFailed(format!("{}: {}", file.display(), e))
                })?;
                let header = classfile::parse(&bytes).map_err(|e| {
                    StrataError::ClasspathScanFailed(format!("{}: {}", file.display(), e))
                })?;

                if !is_standard_class(&header) {
                    continue;
                }

                if graph.classes.len() >= self.max_classes {
                    warn!("⚠️ Class limit of {} reached, truncating graph", self.max_classes);
                    graph.truncated = true;
                    break 'dirs;
                }

                graph.classes.push(to_node(&header));
            }
        }

        info!(
            "📊 {} classes in graph, {} inheritance and {} implementation edges",
            graph.classes.len(),
            graph.inheritance_edges().count(),
            graph.implementation_edges().count()
        );
        Ok(graph)
    }
}

fn is_descriptor_file(file: &Path) -> bool {
    matches!(
        file.file_name().and_then(|n| n.to_str()),
        Some("module-info.class") | Some("package-info.class")
    )
}

fn is_standard_class(header: &ClassHeader) -> bool {
    !header.is_interface() && !header.is_annotation() && !header.is_synthetic() && !header.is_anonymous()
}

fn to_node(header: &ClassHeader) -> ClassNode {
    ClassNode {
        name: simple_name(&header.this_class),
        superclass: header
            .super_class
            .as_deref()
            .filter(|s| *s != TRIVIAL_SUPERCLASS)
            .map(simple_name),
        interfaces: header.interfaces.iter().map(|i| simple_name(i)).collect(),
    }
}
