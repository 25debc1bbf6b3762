// src/core/metadata/maven.rs
use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::info;

use crate::error::{Result, StrataError};
use crate::core::model::{ProjectType, TechStackSummary};
use super::{framework_version, MetadataScanner};

const JAVA_VERSION_PROPERTIES: [&str; 4] = [
    "java.version",
    "maven.compiler.release",
    "maven.compiler.source",
    "maven.compiler.target",
];

const BOOT_GROUP: &str = "org.springframework.boot";

/// Reads `pom.xml`
pub struct MavenScanner {
    placeholder_regex: Regex,
}

/// Fields of a `pom.xml` the summary needs
#[derive(Debug, Default)]
struct PomModel {
    properties: BTreeMap<String, String>,
    version: Option<String>,
    parent: PartialDependency,
    dependencies: Vec<PartialDependency>,
}

#[derive(Debug, Default, Clone)]
struct PartialDependency {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
}

impl MavenScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            placeholder_regex: Regex::new(r"\$\{([^}]+)\}")?,
        })
    }

    /// Summarize a pom document
    pub fn summarize(&self, content: &str) -> Result<TechStackSummary> {
        let model = parse_pom(content)?;

        let language_version = JAVA_VERSION_PROPERTIES
            .iter()
            .find_map(|key| model.properties.get(*key))
            .map(|v| self.resolve(v, &model));

        let mut dependencies = BTreeMap::new();
        for dep in &model.dependencies {
            let (Some(group), Some(artifact)) = (&dep.group_id, &dep.artifact_id) else {
                continue;
            };
            let version = dep
                .version
                .as_deref()
                .map(|v| self.resolve(v, &model))
                .unwrap_or_else(|| "unspecified".to_string());
            dependencies.insert(format!("{}:{}", group, artifact), version);
        }

        let runtime_version = self.boot_version(&model);
        let framework_version = framework_version(&dependencies, runtime_version.as_deref());

        Ok(TechStackSummary {
            project_type: ProjectType::Maven,
            language_version,
            framework_version,
            runtime_version,
            architecture: None,
            dependencies,
        })
    }

    fn boot_version(&self, model: &PomModel) -> Option<String> {
        if model.parent.group_id.as_deref() == Some(BOOT_GROUP) {
            if let Some(version) = &model.parent.version {
                return Some(self.resolve(version, model));
            }
        }

        model
            .properties
            .get("spring-boot.version")
            .filter(|v| !v.trim().is_empty())
            .map(|v| self.resolve(v, model))
    }

    /// Substitute `${property}` placeholders; unknown ones are left as written
    fn resolve(&self, value: &str, model: &PomModel) -> String {
        self.placeholder_regex
            .replace_all(value, |caps: &regex::Captures| {
                let key = &caps[1];
                let resolved = match key {
                    "project.version" | "version" => model.version.clone(),
                    "project.parent.version" => model.parent.version.clone(),
                    _ => model.properties.get(key).cloned(),
                };
                resolved.unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl MetadataScanner for MavenScanner {
    fn scan(&self, root: &Path) -> Result<TechStackSummary> {
        let pom = root.join("pom.xml");
        info!("📖 Reading {}", pom.display());

        let content = std::fs::read_to_string(&pom)?;
        self.summarize(&content)
    }

    fn project_type(&self) -> ProjectType {
        ProjectType::Maven
    }
}

/// Walk the pom with an element-path stack; only top-level sections are read,
/// so `dependencyManagement` and plugin dependencies stay out.
fn parse_pom(content: &str) -> Result<PomModel> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut model = PomModel::default();
    let mut path: Vec<String> = Vec::new();
    let mut current_dep: Option<PartialDependency> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "dependency" && is_path(&path, &["project", "dependencies"]) {
                    current_dep = Some(PartialDependency::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                let closed = path.pop();
                if closed.as_deref() == Some("dependency") && is_path(&path, &["project", "dependencies"]) {
                    if let Some(dep) = current_dep.take() {
                        model.dependencies.push(dep);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| StrataError::Metadata(e.to_string()))?
                    .to_string();
                assign_text(&mut model, &mut current_dep, &path, text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(StrataError::Metadata(format!("pom.xml parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(model)
}

fn is_path(path: &[String], expected: &[&str]) -> bool {
    path.len() == expected.len() && path.iter().zip(expected).all(|(a, b)| a == b)
}

fn assign_text(
    model: &mut PomModel,
    current_dep: &mut Option<PartialDependency>,
    path: &[String],
    text: String,
) {
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();

    match segments.as_slice() {
        ["project", "version"] => model.version = Some(text),
        ["project", "properties", key] => {
            model.properties.insert(key.to_string(), text);
        }
        ["project", "parent", field] => set_field(&mut model.parent, field, text),
        ["project", "dependencies", "dependency", field] => {
            if let Some(dep) = current_dep.as_mut() {
                set_field(dep, field, text);
            }
        }
        _ => {}
    }
}

fn set_field(dep: &mut PartialDependency, field: &str, text: String) {
    match field {
        "groupId" => dep.group_id = Some(text),
        "artifactId" => dep.artifact_id = Some(text),
        "version" => dep.version = Some(text),
        _ => {}
    }
}
