// src/core/compile/strategies.rs
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::info;

use crate::core::source::{find_source_dir, java_files, SourceReader};
use crate::error::{Result, StrataError};
use super::process::BuildCommand;
use super::CompileContext;

/// One way of turning a module root into compiled classes
#[async_trait]
pub trait CompileStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the tooling this strategy needs is present for `root`
    fn applies(&self, root: &Path) -> bool;

    async fn run(&self, root: &Path, ctx: &CompileContext) -> Result<()>;
}

const MAVEN_WRAPPERS: [&str; 2] = ["mvnw", "mvnw.cmd"];
const GRADLE_WRAPPERS: [&str; 3] = ["gradlew", "gradlew.bat", "gradlew.cmd"];

/// Wrapper script for the host platform, if one is checked in
fn wrapper_script(root: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .filter(|name| cfg!(windows) == name.contains('.'))
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

fn has_pom(root: &Path) -> bool {
    root.join("pom.xml").is_file()
}

fn has_gradle_build(root: &Path) -> bool {
    root.join("build.gradle").is_file() || root.join("build.gradle.kts").is_file()
}

fn maven_goals(ctx: &CompileContext) -> Vec<&'static str> {
    let mut goals = Vec::new();
    if ctx.clean {
        goals.push("clean");
    }
    goals.extend(["compile", "-q"]);
    if ctx.skip_tests {
        goals.push("-DskipTests");
    }
    goals
}

fn gradle_tasks(ctx: &CompileContext) -> Vec<&'static str> {
    let mut tasks = Vec::new();
    if ctx.clean {
        tasks.push("clean");
    }
    tasks.push("build");
    if ctx.skip_tests {
        tasks.extend(["-x", "test"]);
    }
    tasks
}

pub struct MavenWrapper;

#[async_trait]
impl CompileStrategy for MavenWrapper {
    fn name(&self) -> &'static str {
        "maven-wrapper"
    }

    fn applies(&self, root: &Path) -> bool {
        wrapper_script(root, &MAVEN_WRAPPERS).is_some()
    }

    async fn run(&self, root: &Path, ctx: &CompileContext) -> Result<()> {
        let script = wrapper_script(root, &MAVEN_WRAPPERS)
            .ok_or_else(|| StrataError::BuildAttempt("maven wrapper disappeared".to_string()))?;
        BuildCommand::script(&script)
            .args(maven_goals(ctx))
            .run(root, ctx.timeout)
            .await
    }
}

pub struct Maven;

#[async_trait]
impl CompileStrategy for Maven {
    fn name(&self) -> &'static str {
        "maven"
    }

    fn applies(&self, root: &Path) -> bool {
        has_pom(root) && which::which("mvn").is_ok()
    }

    async fn run(&self, root: &Path, ctx: &CompileContext) -> Result<()> {
        let mvn = which::which("mvn").map_err(|e| StrataError::BuildAttempt(e.to_string()))?;
        BuildCommand::new(mvn)
            .args(maven_goals(ctx))
            .run(root, ctx.timeout)
            .await
    }
}

pub struct GradleWrapper;

#[async_trait]
impl CompileStrategy for GradleWrapper {
    fn name(&self) -> &'static str {
        "gradle-wrapper"
    }

    fn applies(&self, root: &Path) -> bool {
        wrapper_script(root, &GRADLE_WRAPPERS).is_some()
    }

    async fn run(&self, root: &Path, ctx: &CompileContext) -> Result<()> {
        let script = wrapper_script(root, &GRADLE_WRAPPERS)
            .ok_or_else(|| StrataError::BuildAttempt("gradle wrapper disappeared".to_string()))?;
        BuildCommand::script(&script)
            .args(gradle_tasks(ctx))
            .run(root, ctx.timeout)
            .await
    }
}

pub struct Gradle;

#[async_trait]
impl CompileStrategy for Gradle {
    fn name(&self) -> &'static str {
        "gradle"
    }

    fn applies(&self, root: &Path) -> bool {
        has_gradle_build(root) && which::which("gradle").is_ok()
    }

    async fn run(&self, root: &Path, ctx: &CompileContext) -> Result<()> {
        let gradle = which::which("gradle").map_err(|e| StrataError::BuildAttempt(e.to_string()))?;
        BuildCommand::new(gradle)
            .args(gradle_tasks(ctx))
            .run(root, ctx.timeout)
            .await
    }
}

/// Single `javac` pass over every source file, with a guessed classpath
pub struct DirectJavac;

#[async_trait]
impl CompileStrategy for DirectJavac {
    fn name(&self) -> &'static str {
        "javac"
    }

    fn applies(&self, root: &Path) -> bool {
        find_source_dir(root).is_some() && which::which("javac").is_ok()
    }

    async fn run(&self, root: &Path, ctx: &CompileContext) -> Result<()> {
        let javac = which::which("javac").map_err(|e| StrataError::BuildAttempt(e.to_string()))?;
        let source_dir = find_source_dir(root)
            .ok_or_else(|| StrataError::BuildAttempt("no source root".to_string()))?;

        let sources = java_files(&source_dir);
        if sources.is_empty() {
            return Err(StrataError::BuildAttempt(format!(
                "no .java files under {}",
                source_dir.display()
            )));
        }

        let reader = SourceReader::new()?;
        let classpath = ctx.classpath.build(root, &sources, &reader);

        let out_dir = root.join("target").join("classes");
        std::fs::create_dir_all(&out_dir)?;

        let argfile = write_argfile(&out_dir, &classpath, &sources)?;
        info!("☕ javac over {} sources, {} classpath jars", sources.len(), classpath.len());

        BuildCommand::new(javac)
            .arg(format!("@{}", argfile.path().display()))
            .run(root, ctx.timeout)
            .await
    }
}

/// `javac` argument file; dropped (and deleted) once the attempt finishes
fn write_argfile(out_dir: &Path, classpath: &[PathBuf], sources: &[PathBuf]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "-d {}", quote(out_dir))?;
    writeln!(file, "-encoding UTF-8")?;
    writeln!(file, "-nowarn")?;

    if !classpath.is_empty() {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let joined = classpath
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(separator);
        writeln!(file, "-cp {}", quote(Path::new(&joined)))?;
    }

    for source in sources {
        writeln!(file, "{}", quote(source))?;
    }

    file.flush()?;
    Ok(file)
}

fn quote(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_wrapper_matches_host() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("mvnw").write_str("#!/bin/sh\n").unwrap();
        temp.child("mvnw.cmd").write_str("@echo off\n").unwrap();

        let found = wrapper_script(temp.path(), &MAVEN_WRAPPERS).unwrap();
        let expected = if cfg!(windows) { "mvnw.cmd" } else { "mvnw" };
        assert_eq!(found, temp.path().join(expected));

        assert!(MavenWrapper.applies(temp.path()));
        assert!(!GradleWrapper.applies(temp.path()));
    }

    #[test]
    fn test_command_lines_follow_flags() {
        let mut ctx = CompileContext::for_tests();
        assert_eq!(maven_goals(&ctx), vec!["clean", "compile", "-q", "-DskipTests"]);
        assert_eq!(gradle_tasks(&ctx), vec!["clean", "build", "-x", "test"]);

        ctx.clean = false;
        ctx.skip_tests = false;
        assert_eq!(maven_goals(&ctx), vec!["compile", "-q"]);
        assert_eq!(gradle_tasks(&ctx), vec!["build"]);
    }

    #[test]
    fn test_argfile_quotes_paths() {
        let argfile = write_argfile(
            Path::new("/tmp/out dir"),
            &[PathBuf::from("/m2/a.jar"), PathBuf::from("/m2/b.jar")],
            &[PathBuf::from("/src/My App.java")],
        )
        .unwrap();

        let content = std::fs::read_to_string(argfile.path()).unwrap();
        assert!(content.contains("-d \"/tmp/out dir\""));
        assert!(content.contains("\"/src/My App.java\""));
        assert!(content.contains("a.jar"));
    }
}
