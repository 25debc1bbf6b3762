// src/core/metadata/gradle.rs
use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use tracing::info;

use crate::error::Result;
use crate::core::model::{ProjectType, TechStackSummary};
use super::{framework_version, MetadataScanner};

/// Reads `build.gradle` / `build.gradle.kts`
pub struct GradleScanner {
    source_compat_regex: Regex,
    toolchain_regex: Regex,
    boot_plugin_regex: Regex,
    boot_coordinate_regex: Regex,
    dependency_regex: Regex,
    variable_regex: Regex,
    placeholder_regex: Regex,
}

impl GradleScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            source_compat_regex: Regex::new(
                r#"sourceCompatibility\s*=?\s*['"]?(?:JavaVersion\.VERSION_)?(\d+(?:[._]\d+)?)['"]?"#,
            )?,
            toolchain_regex: Regex::new(r"languageVersion[^\n]*?JavaLanguageVersion\.of\(\s*(\d+)\s*\)")?,
            boot_plugin_regex: Regex::new(
                r#"id\s*\(?\s*['"]org\.springframework\.boot['"]\s*\)?\s*version\s*['"]([^'"]+)['"]"#,
            )?,
            boot_coordinate_regex: Regex::new(r#"spring-boot[\w-]*\s*[:=]\s*['"]?(\d+\.\d+\.\d+[\w.-]*)"#)?,
            dependency_regex: Regex::new(
                r#"^\s*(?:implementation|api|compile|compileOnly|runtimeOnly|annotationProcessor|testImplementation|testCompileOnly|testRuntimeOnly)\s*\(?\s*(?:platform\s*\(\s*)?["']([^"']+)["']"#,
            )?,
            variable_regex: Regex::new(r#"(?m)^\s*(?:set\(\s*)?['"]?(\w+)['"]?\s*[=,]\s*['"]([^'"\n]+)['"]"#)?,
            placeholder_regex: Regex::new(r"\$\{?(\w+)\}?")?,
        })
    }

    /// Summarize a Gradle build script
    pub fn summarize(&self, content: &str) -> TechStackSummary {
        let variables: BTreeMap<String, String> = self
            .variable_regex
            .captures_iter(content)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect();

        let language_version = self
            .source_compat_regex
            .captures(content)
            .or_else(|| self.toolchain_regex.captures(content))
            .map(|caps| caps[1].replace('_', "."));

        let runtime_version = self
            .boot_plugin_regex
            .captures(content)
            .or_else(|| self.boot_coordinate_regex.captures(content))
            .map(|caps| caps[1].to_string());

        let mut dependencies = BTreeMap::new();
        for line in content.lines() {
            let code = match line.find("//") {
                Some(idx) => &line[..idx],
                None => line,
            };

            let Some(caps) = self.dependency_regex.captures(code) else {
                continue;
            };

            let parts: Vec<&str> = caps[1].split(':').collect();
            if parts.len() < 2 {
                continue;
            }

            let version = parts
                .get(2)
                .map(|v| self.resolve(v, &variables))
                .unwrap_or_else(|| "unspecified".to_string());
            dependencies.insert(format!("{}:{}", parts[0], parts[1]), version);
        }

        let framework_version = framework_version(&dependencies, runtime_version.as_deref());

        TechStackSummary {
            project_type: ProjectType::Gradle,
            language_version,
            framework_version,
            runtime_version,
            architecture: None,
            dependencies,
        }
    }

    /// Substitute `$name` / `${name}` from variables declared in the script
    fn resolve(&self, value: &str, variables: &BTreeMap<String, String>) -> String {
        self.placeholder_regex
            .replace_all(value, |caps: &regex::Captures| {
                variables
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl MetadataScanner for GradleScanner {
    fn scan(&self, root: &Path) -> Result<TechStackSummary> {
        let groovy = root.join("build.gradle");
        let build = if groovy.exists() { groovy } else { root.join("build.gradle.kts") };
        info!("📖 Reading {}", build.display());

        let content = std::fs::read_to_string(&build)?;
        Ok(self.summarize(&content))
    }

    fn project_type(&self) -> ProjectType {
        ProjectType::Gradle
    }
}
