// src/core/compile/classpath.rs
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::core::source::SourceReader;

/// Source keywords and the jar-name prefixes they pull onto the classpath
const KEYWORD_PREFIXES: [(&[&str], &[&str]); 8] = [
    (
        &["org.springframework", "@SpringBootApplication", "@Autowired"],
        &["spring-"],
    ),
    (
        &["javax.ejb", "jakarta.ejb", "javax.servlet", "jakarta.servlet", "javax.ws.rs", "jakarta.ws.rs"],
        &["javaee-api", "jakartaee-api", "javax.", "jakarta."],
    ),
    (&["org.camunda"], &["camunda-"]),
    (&["org.apache.camel"], &["camel-"]),
    (
        &["import feign.", "io.grpc", "javax.xml.ws", "jakarta.xml.ws"],
        &["feign-", "grpc-", "protobuf-", "jaxws-"],
    ),
    (
        &["javax.persistence", "jakarta.persistence", "org.hibernate"],
        &["hibernate-", "javax.persistence", "jakarta.persistence"],
    ),
    (&["lombok"], &["lombok"]),
    (
        &["org.slf4j", "org.apache.log4j", "org.apache.logging"],
        &["slf4j-", "log4j-", "logback-"],
    ),
];

/// Module-local directories holding bundled jars
const MODULE_LIB_DIRS: [&str; 3] = ["lib", "WEB-INF/lib", "src/main/webapp/WEB-INF/lib"];

/// Deepest jar below a cache root: `group/.../artifact/version[/hash]/x.jar`
const CACHE_SCAN_DEPTH: usize = 10;

/// Assembles a best-effort classpath for direct compilation.
/// Dependency caches are only ever read.
#[derive(Debug, Clone)]
pub struct ClasspathBuilder {
    caches: Vec<PathBuf>,
    max_jars: usize,
}

impl ClasspathBuilder {
    pub fn new(caches: Vec<PathBuf>, max_jars: usize) -> Self {
        Self { caches, max_jars }
    }

    /// Module jars first, then cache jars matching prefixes inferred from `sources`.
    /// Only the first version of each artifact, in name order, is taken.
    pub fn build(&self, module_root: &Path, sources: &[PathBuf], reader: &SourceReader) -> Vec<PathBuf> {
        let mut classpath = module_jars(module_root);
        classpath.truncate(self.max_jars);

        let prefixes = infer_prefixes(sources, reader);
        if prefixes.is_empty() {
            debug!("No framework keywords found, classpath limited to module jars");
            return classpath;
        }
        debug!("Classpath prefixes: {:?}", prefixes);

        let mut seen: BTreeSet<String> = classpath
            .iter()
            .filter_map(|p| p.file_name().map(|n| artifact_id(&n.to_string_lossy()).to_string()))
            .collect();

        'caches: for cache in &self.caches {
            if !cache.is_dir() {
                continue;
            }

            let walker = WalkDir::new(cache).max_depth(CACHE_SCAN_DEPTH).sort_by_file_name();
            for entry in walker.into_iter().filter_map(|e| e.ok()) {
                if classpath.len() >= self.max_jars {
                    break 'caches;
                }

                let name = entry.file_name().to_string_lossy();
                if !is_library_jar(&name) || !prefixes.iter().any(|p| name.starts_with(p)) {
                    continue;
                }

                if seen.insert(artifact_id(&name).to_string()) {
                    classpath.push(entry.into_path());
                } else {
                    debug!("Skipping {}, another version is already on the classpath", name);
                }
            }
        }

        info!("📚 Fallback classpath: {} jars", classpath.len());
        classpath
    }
}

/// Jar-name prefixes implied by keywords found in the module's sources
pub fn infer_prefixes(sources: &[PathBuf], reader: &SourceReader) -> BTreeSet<&'static str> {
    let mut prefixes = BTreeSet::new();

    for source in sources {
        let Ok(content) = reader.read_raw(source) else {
            continue;
        };

        for (keywords, jar_prefixes) in KEYWORD_PREFIXES {
            if keywords.iter().any(|k| content.contains(k)) {
                prefixes.extend(jar_prefixes.iter().copied());
            }
        }
    }

    prefixes
}

/// Jars shipped inside the module itself
pub fn module_jars(module_root: &Path) -> Vec<PathBuf> {
    let mut jars = Vec::new();

    for dir in MODULE_LIB_DIRS {
        let dir = module_root.join(dir);
        if !dir.is_dir() {
            continue;
        }

        jars.extend(
            WalkDir::new(&dir)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_library_jar(&e.file_name().to_string_lossy()))
                .map(|e| e.into_path()),
        );
    }

    jars
}

/// `spring-core-6.0.9.jar` -> `spring-core`
fn artifact_id(jar_name: &str) -> &str {
    let stem = jar_name.strip_suffix(".jar").unwrap_or(jar_name);
    stem.match_indices('-')
        .find(|(i, _)| stem[i + 1..].starts_with(|c: char| c.is_ascii_digit()))
        .map(|(i, _)| &stem[..i])
        .unwrap_or(stem)
}

fn is_library_jar(name: &str) -> bool {
    name.ends_with(".jar") && !name.ends_with("-sources.jar") && !name.ends_with("-javadoc.jar")
}
