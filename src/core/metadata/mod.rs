// src/core/metadata/mod.rs
//! Build-description scanning: Maven, Gradle and packaged/exploded JARs.
//!
//! Each format has its own [`MetadataScanner`]; [`ScannerSelector`] probes a
//! project root and dispatches to the one that applies.

mod gradle;
mod jar;
mod maven;

pub use gradle::GradleScanner;
pub use jar::JarScanner;
pub use maven::MavenScanner;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use super::model::{ProjectType, TechStackSummary};
use super::source::{java_files, SourceReader};

/// Depth searched for build descriptors below the given root
const DESCRIPTOR_SEARCH_DEPTH: usize = 4;

/// Source markers, first match decides the architecture
const ARCHITECTURE_MARKERS: [(&[&str], &str); 7] = [
    (&["@RestController", "@SpringBootApplication"], "Spring Boot"),
    (&["org.camunda", "ProcessEngine"], "Camunda BPM"),
    (&["camelContext", "RouteBuilder"], "Apache Camel"),
    (&["@FeignClient"], "Feign Client"),
    (&["@EJB", "@Stateless", "@Stateful", "SessionBean"], "EJB / Java EE"),
    (&["extends HttpServlet", "@WebServlet"], "Servlet / JEE"),
    (&["jakarta.persistence", "@Entity"], "Jakarta EE / JPA"),
];

/// Import prefixes of libraries worth listing even when no build file declares them
const SOURCE_LIBRARIES: [(&str, &str); 9] = [
    ("import lombok.", "lombok"),
    ("import org.slf4j.", "slf4j"),
    ("import org.apache.log4j.", "log4j"),
    ("import org.junit.", "junit"),
    ("import org.mockito.", "mockito"),
    ("import org.hibernate.", "hibernate"),
    ("import org.camunda.", "camunda"),
    ("import org.apache.camel.", "camel"),
    ("import feign.", "feign"),
];

/// One build-description format
pub trait MetadataScanner: Send + Sync {
    /// Read the build description found at `root`
    fn scan(&self, root: &Path) -> Result<TechStackSummary>;

    fn project_type(&self) -> ProjectType;
}

/// Picks the scanner matching what is present at a project root
pub struct ScannerSelector {
    maven: MavenScanner,
    gradle: GradleScanner,
    jar: JarScanner,
    reader: SourceReader,
}

impl ScannerSelector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            maven: MavenScanner::new()?,
            gradle: GradleScanner::new()?,
            jar: JarScanner::new()?,
            reader: SourceReader::new()?,
        })
    }

    /// Decide which scanner applies and the directory (or archive) it should read
    pub fn select(&self, path: &Path) -> Option<(&dyn MetadataScanner, PathBuf)> {
        if path.is_file() {
            let is_jar = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("war"))
                .unwrap_or(false);
            return is_jar.then(|| (&self.jar as &dyn MetadataScanner, path.to_path_buf()));
        }

        if let Some(pom) = find_file(path, &["pom.xml"]) {
            let root = pom.parent().unwrap_or(path).to_path_buf();
            return Some((&self.maven as &dyn MetadataScanner, root));
        }

        if let Some(build) = find_file(path, &["build.gradle", "build.gradle.kts"]) {
            let root = build.parent().unwrap_or(path).to_path_buf();
            return Some((&self.gradle as &dyn MetadataScanner, root));
        }

        if has_compiled_artifacts(path) {
            return Some((&self.jar as &dyn MetadataScanner, path.to_path_buf()));
        }

        None
    }

    /// Produce the tech-stack summary. Failures become a typed empty summary.
    pub fn scan(&self, path: &Path) -> TechStackSummary {
        if !path.exists() {
            error!("❌ Project path not found: {}", path.display());
            return TechStackSummary::empty(ProjectType::NotFound);
        }

        let mut summary = match self.select(path) {
            Some((scanner, root)) => {
                info!("🧩 {:?} project detected at {}", scanner.project_type(), root.display());
                match scanner.scan(&root) {
                    Ok(summary) => summary,
                    Err(e) => {
                        error!("❌ Failed to read {:?} build description: {}", scanner.project_type(), e);
                        TechStackSummary::empty(ProjectType::Error)
                    }
                }
            }
            None => {
                warn!("⚠️ No pom.xml, build.gradle or manifest found under {}", path.display());
                TechStackSummary::empty(ProjectType::Unknown)
            }
        };

        if path.is_dir() {
            summary.architecture = Some(detect_architecture(&self.reader, path));
            for (library, marker) in detect_libraries_from_source(&self.reader, path) {
                summary.dependencies.entry(library).or_insert(marker);
            }
        }

        info!(
            "Tech stack: java={:?} framework={:?} runtime={:?} libraries={}",
            summary.language_version,
            summary.framework_version,
            summary.runtime_version,
            summary.dependencies.len()
        );

        summary
    }
}

/// Shallowest file below `root` whose name matches one of `names`
fn find_file(root: &Path, names: &[&str]) -> Option<PathBuf> {
    WalkDir::new(root)
        .max_depth(DESCRIPTOR_SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            names.iter().any(|n| name.eq_ignore_ascii_case(n))
        })
        .min_by_key(|e| e.depth())
        .map(|e| e.into_path())
}

fn has_compiled_artifacts(root: &Path) -> bool {
    WalkDir::new(root)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| {
            let name = e.file_name().to_string_lossy();
            name.ends_with(".class") || name.ends_with(".jar") || name == "MANIFEST.MF"
        })
}

/// Architecture label from the first source file carrying a known marker
pub fn detect_architecture(reader: &SourceReader, root: &Path) -> String {
    for file in java_files(root) {
        let Ok(content) = reader.read_raw(&file) else {
            continue;
        };

        for (markers, label) in ARCHITECTURE_MARKERS {
            if markers.iter().any(|m| content.contains(m)) {
                return label.to_string();
            }
        }
    }

    "Plain Java".to_string()
}

/// Libraries recognised from import statements, keyed `source:<name>`
pub fn detect_libraries_from_source(reader: &SourceReader, root: &Path) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();

    for file in java_files(root) {
        let Ok(content) = reader.read_raw(&file) else {
            continue;
        };

        for (prefix, name) in SOURCE_LIBRARIES {
            if content.contains(prefix) {
                found.insert(format!("source:{}", name), "detected".to_string());
            }
        }

        if found.len() == SOURCE_LIBRARIES.len() {
            break;
        }
    }

    found
}

/// Framework version: explicit spring-core/spring-context, else the Boot version
pub(crate) fn framework_version(
    dependencies: &BTreeMap<String, String>,
    runtime_version: Option<&str>,
) -> Option<String> {
    dependencies
        .iter()
        .filter(|(coordinate, _)| coordinate.contains("spring-core") || coordinate.contains("spring-context"))
        .map(|(_, version)| version)
        .find(|version| !version.eq_ignore_ascii_case("unspecified"))
        .cloned()
        .or_else(|| runtime_version.map(str::to_string))
}
