// src/core/metadata/jar.rs
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use regex::Regex;
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Result, StrataError};
use crate::core::model::{ProjectType, TechStackSummary};
use super::{framework_version, MetadataScanner};

const MANIFEST: &str = "META-INF/MANIFEST.MF";

/// Directories holding bundled dependency jars in fat jars and wars
const BUNDLED_LIB_DIRS: [&str; 3] = ["BOOT-INF/lib/", "WEB-INF/lib/", "lib/"];

/// Reads a packaged archive or an exploded one through its manifest and bundled jars
pub struct JarScanner {
    jar_name_regex: Regex,
}

/// What an archive exposes: the manifest text and the file names inside it
#[derive(Debug, Default)]
struct ArchiveContents {
    manifest: Option<String>,
    entries: Vec<String>,
}

impl JarScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            jar_name_regex: Regex::new(r"^(.+?)-(\d[\w.\-]*)\.jar$")?,
        })
    }

    fn summarize(&self, contents: &ArchiveContents) -> TechStackSummary {
        let manifest = contents
            .manifest
            .as_deref()
            .map(parse_manifest)
            .unwrap_or_default();

        let runtime_version = manifest
            .get("Spring-Boot-Version")
            .or_else(|| manifest.get("Implementation-Version"))
            .cloned();

        let language_version = manifest
            .get("Build-Jdk-Spec")
            .or_else(|| manifest.get("Build-Jdk"))
            .cloned();

        let mut dependencies = BTreeMap::new();
        for entry in &contents.entries {
            let Some(file_name) = BUNDLED_LIB_DIRS
                .iter()
                .find_map(|dir| entry.strip_prefix(dir))
            else {
                continue;
            };

            if file_name.contains('/') {
                continue;
            }

            if let Some(caps) = self.jar_name_regex.captures(file_name) {
                dependencies.insert(caps[1].to_string(), caps[2].to_string());
            }
        }

        let has_spring_classes = contents
            .entries
            .iter()
            .any(|e| e.starts_with("org/springframework/"));

        let framework_version = framework_version(&dependencies, runtime_version.as_deref())
            .or_else(|| has_spring_classes.then(|| "present".to_string()));

        if framework_version.is_none() {
            warn!("⚠️ No Spring indicator found in archive");
        }

        TechStackSummary {
            project_type: ProjectType::Jar,
            language_version,
            framework_version,
            runtime_version,
            architecture: None,
            dependencies,
        }
    }
}

impl MetadataScanner for JarScanner {
    fn scan(&self, root: &Path) -> Result<TechStackSummary> {
        let contents = if root.is_file() {
            info!("📦 Reading archive {}", root.display());
            read_archive(root)?
        } else {
            info!("📚 Reading exploded archive {}", root.display());
            read_exploded(root)?
        };

        Ok(self.summarize(&contents))
    }

    fn project_type(&self) -> ProjectType {
        ProjectType::Jar
    }
}

fn read_archive(path: &Path) -> Result<ArchiveContents> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| StrataError::Metadata(e.to_string()))?;

    let entries: Vec<String> = archive.file_names().map(str::to_string).collect();

    let manifest = match archive.by_name(MANIFEST) {
        Ok(mut entry) => {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            Some(text)
        }
        Err(_) => None,
    };

    Ok(ArchiveContents { manifest, entries })
}

fn read_exploded(root: &Path) -> Result<ArchiveContents> {
    let mut contents = ArchiveContents::default();

    for entry in WalkDir::new(root).max_depth(6).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        if contents.manifest.is_none() && relative.ends_with(MANIFEST) {
            contents.manifest = Some(std::fs::read_to_string(entry.path())?);
        }
        contents.entries.push(relative);
    }

    Ok(contents)
}

/// `Key: Value` pairs; lines starting with a space continue the previous value
fn parse_manifest(text: &str) -> BTreeMap<String, String> {
    let mut attributes: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some(value) = last_key.as_ref().and_then(|k| attributes.get_mut(k)) {
                value.push_str(continuation);
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            attributes.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }

    attributes
}
