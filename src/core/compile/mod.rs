// src/core/compile/mod.rs
//! Cascading compilation: build-tool wrappers, build tools on the PATH, then
//! a direct `javac` pass. Strategies are tried in order; the first one that
//! leaves compiled classes behind wins.

mod classpath;
mod process;
mod strategies;

pub use classpath::ClasspathBuilder;
pub use strategies::{CompileStrategy, DirectJavac, Gradle, GradleWrapper, Maven, MavenWrapper};

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StrataError};
use super::structure::find_class_dirs;

/// Settings every strategy reads
#[derive(Debug, Clone)]
pub struct CompileContext {
    pub timeout: Duration,
    pub clean: bool,
    pub skip_tests: bool,
    /// Depth searched for `classes` directories after a build
    pub scan_depth: usize,
    pub classpath: ClasspathBuilder,
}

impl CompileContext {
    pub fn from_config(config: &Config) -> Self {
        let execution = &config.execution;
        Self {
            timeout: execution.compile_timeout(),
            clean: execution.clean_before_compile,
            skip_tests: execution.skip_tests,
            scan_depth: config.structure.scan_depth,
            classpath: ClasspathBuilder::new(execution.dependency_caches(), execution.max_classpath_jars),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            clean: true,
            skip_tests: true,
            scan_depth: 4,
            classpath: ClasspathBuilder::new(Vec::new(), 10),
        }
    }
}

/// Where compiled classes ended up and who put them there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledOutput {
    pub strategy: String,
    pub class_dirs: Vec<PathBuf>,
}

pub struct CompilationOrchestrator {
    strategies: Vec<Box<dyn CompileStrategy>>,
    context: CompileContext,
}

impl CompilationOrchestrator {
    /// Strategy chain in priority order, honoring the enable flags
    pub fn new(config: &Config) -> Self {
        let execution = &config.execution;
        let mut strategies: Vec<Box<dyn CompileStrategy>> = Vec::new();

        if execution.use_maven_wrapper {
            strategies.push(Box::new(MavenWrapper));
        }
        strategies.push(Box::new(Maven));
        if execution.use_gradle_wrapper {
            strategies.push(Box::new(GradleWrapper));
        }
        strategies.push(Box::new(Gradle));
        if execution.fallback_to_javac {
            strategies.push(Box::new(DirectJavac));
        }

        Self::with_strategies(strategies, CompileContext::from_config(config))
    }

    pub fn with_strategies(strategies: Vec<Box<dyn CompileStrategy>>, context: CompileContext) -> Self {
        Self { strategies, context }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Compile one module root; `CompilationFailed` lists every attempt made
    pub async fn compile(&self, root: &Path) -> Result<CompiledOutput> {
        if !root.is_dir() {
            return Err(StrataError::ResourceNotFound(root.to_path_buf()));
        }

        debug!("Build strategies for {}: {}", root.display(), self.strategy_names().join(" -> "));
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            if !strategy.applies(root) {
                debug!("Strategy {} does not apply to {}", strategy.name(), root.display());
                continue;
            }

            info!("🔧 Compiling {} with {}", root.display(), strategy.name());
            match strategy.run(root, &self.context).await {
                Ok(()) => {
                    let class_dirs = find_class_dirs(root, self.context.scan_depth);
                    if class_dirs.is_empty() {
                        warn!("⚠️ {} finished but left no compiled classes", strategy.name());
                        attempts.push(format!("{}: no compiled classes produced", strategy.name()));
                        continue;
                    }

                    info!("✅ {} produced {} class directories", strategy.name(), class_dirs.len());
                    return Ok(CompiledOutput {
                        strategy: strategy.name().to_string(),
                        class_dirs,
                    });
                }
                Err(e) => {
                    warn!("⚠️ {} failed: {}", strategy.name(), e);
                    attempts.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        if attempts.is_empty() {
            attempts.push("no applicable build strategy".to_string());
        }

        Err(StrataError::CompilationFailed { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeStrategy {
        name: &'static str,
        applies: bool,
        succeeds: bool,
        writes_classes: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeStrategy {
        fn boxed(name: &'static str, applies: bool, succeeds: bool, writes_classes: bool) -> (Box<dyn CompileStrategy>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Self { name, applies, succeeds, writes_classes, calls: calls.clone() };
            (Box::new(strategy), calls)
        }
    }

    #[async_trait]
    impl CompileStrategy for FakeStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn applies(&self, _root: &Path) -> bool {
            self.applies
        }

        async fn run(&self, root: &Path, _ctx: &CompileContext) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.writes_classes {
                let dir = root.join("target/classes/com/acme");
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join(format!("{}.class", self.name.replace('-', "_"))), b"")?;
            }
            if self.succeeds {
                Ok(())
            } else {
                Err(StrataError::BuildAttempt(format!("{} broke", self.name)))
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let temp = assert_fs::TempDir::new().unwrap();
        let (wrapper, wrapper_calls) = FakeStrategy::boxed("wrapper", true, true, true);
        let (tool, tool_calls) = FakeStrategy::boxed("tool", true, true, true);
        let (javac, javac_calls) = FakeStrategy::boxed("javac", true, true, true);

        let orchestrator = CompilationOrchestrator::with_strategies(
            vec![wrapper, tool, javac],
            CompileContext::for_tests(),
        );
        let output = orchestrator.compile(temp.path()).await.unwrap();

        assert_eq!(output.strategy, "wrapper");
        assert_eq!(output.class_dirs, vec![temp.path().join("target/classes")]);
        assert_eq!(wrapper_calls.load(Ordering::SeqCst), 1);
        assert_eq!(tool_calls.load(Ordering::SeqCst), 0);
        assert_eq!(javac_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_advance_to_fallback() {
        let temp = assert_fs::TempDir::new().unwrap();
        let (absent, absent_calls) = FakeStrategy::boxed("absent", false, true, true);
        let (broken, _) = FakeStrategy::boxed("broken", true, false, false);
        let (empty, _) = FakeStrategy::boxed("empty", true, true, false);
        let (javac, javac_calls) = FakeStrategy::boxed("javac", true, true, true);

        let orchestrator = CompilationOrchestrator::with_strategies(
            vec![absent, broken, empty, javac],
            CompileContext::for_tests(),
        );
        let output = orchestrator.compile(temp.path()).await.unwrap();

        assert_eq!(output.strategy, "javac");
        assert_eq!(absent_calls.load(Ordering::SeqCst), 0);
        assert_eq!(javac_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_strategies_fail() {
        let temp = assert_fs::TempDir::new().unwrap();
        let (broken, _) = FakeStrategy::boxed("broken", true, false, false);
        let (empty, _) = FakeStrategy::boxed("empty", true, true, false);

        let orchestrator = CompilationOrchestrator::with_strategies(vec![broken, empty], CompileContext::for_tests());
        match orchestrator.compile(temp.path()).await {
            Err(StrataError::CompilationFailed { attempts }) => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("broken"));
                assert!(attempts[1].contains("no compiled classes"));
            }
            other => panic!("expected CompilationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nothing_applies() {
        let temp = assert_fs::TempDir::new().unwrap();
        let orchestrator = CompilationOrchestrator::with_strategies(Vec::new(), CompileContext::for_tests());
        let err = orchestrator.compile(temp.path()).await.unwrap_err();
        assert!(err.to_string().contains("no applicable build strategy"));
    }

    #[test]
    fn test_flags_shape_the_chain() {
        let mut config = Config::default();
        assert_eq!(
            CompilationOrchestrator::new(&config).strategy_names(),
            vec!["maven-wrapper", "maven", "gradle-wrapper", "gradle", "javac"]
        );

        config.execution.use_maven_wrapper = false;
        config.execution.fallback_to_javac = false;
        assert_eq!(
            CompilationOrchestrator::new(&config).strategy_names(),
            vec!["maven", "gradle-wrapper", "gradle"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_wrapper_script_wins() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("pom.xml").write_str("<project/>").unwrap();
        temp.child("mvnw")
            .write_str("#!/bin/sh\nmkdir -p target/classes/com/acme\n: > target/classes/com/acme/App.class\n")
            .unwrap();

        let (javac, javac_calls) = FakeStrategy::boxed("javac", true, true, true);
        let orchestrator = CompilationOrchestrator::with_strategies(
            vec![Box::new(MavenWrapper) as Box<dyn CompileStrategy>, javac],
            CompileContext::for_tests(),
        );
        let output = orchestrator.compile(temp.path()).await.unwrap();

        assert_eq!(output.strategy, "maven-wrapper");
        assert_eq!(javac_calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wrapper_timeout_falls_through() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("mvnw").write_str("#!/bin/sh\nsleep 30\n").unwrap();

        let (javac, javac_calls) = FakeStrategy::boxed("javac", true, true, true);
        let mut ctx = CompileContext::for_tests();
        ctx.timeout = Duration::from_millis(300);

        let orchestrator = CompilationOrchestrator::with_strategies(vec![Box::new(MavenWrapper) as Box<dyn CompileStrategy>, javac], ctx);
        let output = orchestrator.compile(temp.path()).await.unwrap();

        assert_eq!(output.strategy, "javac");
        assert_eq!(javac_calls.load(Ordering::SeqCst), 1);
    }
}
