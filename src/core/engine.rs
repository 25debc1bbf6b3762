// src/core/engine.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigSession};
use crate::error::StrataError;
use super::behavior::BehavioralExtractor;
use super::compile::CompilationOrchestrator;
use super::metadata::ScannerSelector;
use super::model::{
    AnalysisReport, CallSequence, ClassGraph, ModuleReport, ModuleStatus, ProjectType, RoleCounts, TechStackSummary,
};
use super::modules::{ModuleResolver, ModuleRoot};
use super::roles::RoleClassifier;
use super::source::find_source_dir;
use super::structure::StructuralExtractor;
use super::tuning;

/// Per-run switches layered over the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub single_module: bool,
    pub auto_tune: bool,
}

/// Main orchestration engine: metadata, module partitioning and per-module extraction
pub struct Engine {
    config: Config,
    session: ConfigSession,
}

/// What the compile and class-scan branch of one module produced
#[derive(Default)]
struct StructuralOutcome {
    class_graph: Option<ClassGraph>,
    compiled_with: Option<String>,
    error: Option<String>,
}

/// What the classify and trace branch of one module produced
#[derive(Default)]
struct BehavioralOutcome {
    roles: RoleCounts,
    sequences: BTreeMap<String, Vec<CallSequence>>,
    error: Option<String>,
}

/// Placeholder written where an artifact could not be produced
#[derive(Serialize)]
struct ErrorArtifact<'a> {
    module: &'a str,
    status: ModuleStatus,
    problems: &'a [String],
}

impl Engine {
    /// Create a new engine, loading configuration from `config_path` or the usual candidates
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path).context("Failed to load configuration")?;
        debug!("Loaded configuration: {:?}", config);

        Ok(Self {
            config,
            session: ConfigSession::new(config_path.map(Path::to_path_buf)),
        })
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            session: ConfigSession::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze one project root. Module failures are reported, never raised.
    pub async fn analyze(&mut self, root: &Path, options: &AnalyzeOptions) -> Result<AnalysisReport> {
        let started_at = Utc::now();

        self.session.record_analysis(root);
        let config = self.run_config(root, options)?;

        info!("🔍 Analyzing {}", root.display());
        let tech_stack = self.stack(root).await?;

        let modules = match ModuleResolver::new(&config.execution).partition(root) {
            Ok(modules) => modules,
            Err(e) => {
                error!("❌ {}", e);
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "root".to_string());
                return Ok(AnalysisReport {
                    root: root.to_path_buf(),
                    tech_stack,
                    modules: vec![ModuleReport::failed(name, root.to_path_buf(), e.to_string())],
                    started_at,
                    finished_at: Utc::now(),
                });
            }
        };

        let reports = analyze_modules(Arc::new(config), modules).await;

        let succeeded = reports.iter().filter(|r| r.status == ModuleStatus::Success).count();
        info!("🎉 {} of {} modules fully analyzed", succeeded, reports.len());

        Ok(AnalysisReport {
            root: root.to_path_buf(),
            tech_stack,
            modules: reports,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Configuration for one run: the base, or the file re-read when there is
    /// one, with tuning and per-run options layered on. The base is never touched.
    fn run_config(&self, root: &Path, options: &AnalyzeOptions) -> Result<Config> {
        let (mut config, tuned) = match &self.session.config_path {
            Some(_) => {
                let config = Config::reload(&self.session).context("Failed to reload configuration")?;
                let tuned = config.general.auto_tune;
                (config, tuned)
            }
            None => (self.config.clone(), false),
        };

        if !tuned && (options.auto_tune || config.general.auto_tune) {
            tuning::apply(&mut config, root);
        }
        if options.single_module {
            config.execution.detect_multi_module = false;
        }
        Ok(config)
    }

    /// Tech-stack summary of a project root
    pub async fn stack(&self, root: &Path) -> Result<TechStackSummary> {
        let path = root.to_path_buf();
        let summary = tokio::task::spawn_blocking(move || -> crate::error::Result<TechStackSummary> {
            Ok(ScannerSelector::new()?.scan(&path))
        })
        .await
        .context("Metadata scan panicked")??;

        if summary.project_type == ProjectType::NotFound {
            warn!("⚠️ No tech stack for missing root {}", root.display());
        }
        Ok(summary)
    }

    /// Buildable units of a project root
    pub fn modules(&self, root: &Path) -> crate::error::Result<Vec<ModuleRoot>> {
        ModuleResolver::new(&self.config.execution).partition(root)
    }

    /// Write the defaults to `path` (or `strata.toml`)
    pub fn init_config(&self, path: Option<PathBuf>) -> Result<PathBuf> {
        let path = path.unwrap_or_else(|| PathBuf::from("strata.toml"));
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }

        Config::default()
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("📝 Wrote default configuration to {}", path.display());
        Ok(path)
    }

    /// Write the JSON handoff for `report` into `output_dir`
    pub fn write_report(&self, report: &AnalysisReport, output_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        write_json(&output_dir.join("report.json"), report)?;
        write_json(&output_dir.join("tech-stack.json"), &report.tech_stack)?;

        for module in &report.modules {
            let module_dir = output_dir.join(&module.name);
            std::fs::create_dir_all(&module_dir)
                .with_context(|| format!("Failed to create {}", module_dir.display()))?;

            if module.status == ModuleStatus::Failed {
                write_json(&module_dir.join("error.json"), &error_artifact(module))?;
                continue;
            }

            match (&module.class_graph, &module.structure_error) {
                (Some(graph), None) => write_json(&module_dir.join("class-graph.json"), graph)?,
                _ => write_json(&module_dir.join("class-graph.error.json"), &error_artifact(module))?,
            }
            write_json(&module_dir.join("sequences.json"), &module.sequences)?;
        }

        info!("📁 Results written to {}", output_dir.display());
        Ok(())
    }
}

/// Process modules on a bounded pool; results come back in partition order
async fn analyze_modules(config: Arc<Config>, modules: Vec<ModuleRoot>) -> Vec<ModuleReport> {
    let workers = config.execution.max_workers.max(1);
    info!("⚙️ Processing {} module(s) with {} worker(s)", modules.len(), workers);

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for (index, module) in modules.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        let config = config.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            (index, analyze_module(config, module).await)
        });
    }

    let mut slots: Vec<Option<ModuleReport>> = vec![None; modules.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => slots[index] = Some(report),
            Err(e) => error!("❌ Module worker died: {}", e),
        }
    }

    slots
        .into_iter()
        .zip(modules)
        .map(|(slot, module)| {
            slot.unwrap_or_else(|| {
                ModuleReport::failed(module.name, module.path, "module worker terminated abnormally".to_string())
            })
        })
        .collect()
}

fn error_artifact(module: &ModuleReport) -> ErrorArtifact<'_> {
    ErrorArtifact {
        module: &module.name,
        status: module.status,
        problems: &module.problems,
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Both branches of one module, joined. Never fails; problems land in the report.
async fn analyze_module(config: Arc<Config>, module: ModuleRoot) -> ModuleReport {
    info!("📦 Module {}", module.name);

    if !module.path.is_dir() {
        let problem = StrataError::ResourceNotFound(module.path.clone()).to_string();
        return ModuleReport::failed(module.name, module.path, problem);
    }

    let (structural, behavioral) = tokio::join!(
        structural_branch(config.clone(), module.path.clone()),
        behavioral_branch(config.clone(), module.path.clone()),
    );

    let problems: Vec<String> = [structural.error.clone(), behavioral.error.clone()]
        .into_iter()
        .flatten()
        .collect();

    let status = match (structural.error.is_none(), behavioral.error.is_none()) {
        (true, true) => ModuleStatus::Success,
        (false, false) => ModuleStatus::Failed,
        _ => ModuleStatus::Partial,
    };

    match status {
        ModuleStatus::Success => info!("✅ Module {} analyzed", module.name),
        _ => warn!("⚠️ Module {} finished as {:?}: {}", module.name, status, problems.join("; ")),
    }

    ModuleReport {
        name: module.name,
        root: module.path,
        status,
        class_graph: structural.class_graph,
        compiled_with: structural.compiled_with,
        structure_error: structural.error,
        roles: behavioral.roles,
        sequences: behavioral.sequences,
        problems,
    }
}

/// Compile, then scan the compiled classes. A failed compile skips the scan.
async fn structural_branch(config: Arc<Config>, root: PathBuf) -> StructuralOutcome {
    let orchestrator = CompilationOrchestrator::new(&config);
    let output = match orchestrator.compile(&root).await {
        Ok(output) => output,
        Err(e) => {
            warn!("⚠️ Structural extraction skipped for {}: {}", root.display(), e);
            return StructuralOutcome {
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
    };

    let extractor = StructuralExtractor::new(&config.structure);
    let class_dirs = output.class_dirs.clone();
    let scanned = tokio::task::spawn_blocking(move || extractor.extract(&class_dirs)).await;

    let (class_graph, error) = match scanned {
        Ok(Ok(graph)) => (Some(graph), None),
        Ok(Err(e)) => {
            error!("❌ {}", e);
            (Some(ClassGraph::default()), Some(e.to_string()))
        }
        Err(e) => {
            let e = StrataError::ClasspathScanFailed(format!("scan task died: {}", e));
            error!("❌ {}", e);
            (Some(ClassGraph::default()), Some(e.to_string()))
        }
    };

    StructuralOutcome {
        class_graph,
        compiled_with: Some(output.strategy),
        error,
    }
}

/// Classify roles, then trace entry points. Only needs source text.
async fn behavioral_branch(config: Arc<Config>, root: PathBuf) -> BehavioralOutcome {
    if !config.sequence.enabled {
        info!("⏭️ Sequence tracing disabled for {}", root.display());
        return BehavioralOutcome::default();
    }

    let traced = tokio::task::spawn_blocking(move || -> crate::error::Result<BehavioralOutcome> {
        let source_dir = find_source_dir(&root).ok_or_else(|| StrataError::ResourceNotFound(root.join("src")))?;

        let roles = RoleClassifier::new()?.classify_module(&source_dir);
        let sequences = BehavioralExtractor::new(&config.sequence)?.trace_module(&roles, &source_dir);

        Ok(BehavioralOutcome {
            roles: roles.counts(),
            sequences,
            error: None,
        })
    })
    .await;

    match traced {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!("⚠️ Behavioral extraction failed: {}", e);
            BehavioralOutcome {
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
        Err(e) => BehavioralOutcome {
            error: Some(format!("trace task died: {}", e)),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Terminal;
    use crate::core::structure::synthesize;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    const CONTROLLER: &str = r#"
        @RestController
        public class OrderController {
            @Autowired private OrderService orderService;

            @GetMapping("/{id}")
            public OrderDto show(@PathVariable Long id) { return orderService.findOrder(id); }
        }
    "#;

    const SERVICE: &str = r#"
        @Service
        public class OrderService {
            @Autowired private OrderRepository orderRepository;

            public OrderDto findOrder(Long id) { return orderRepository.findById(id); }
        }
    "#;

    const REPOSITORY: &str = "@Repository public interface OrderRepository { OrderDto findById(Long id); }";

    fn test_config() -> Config {
        let mut config = Config::default();
        config.execution.fallback_to_javac = false;
        config.execution.dependency_cache_dirs = vec![PathBuf::from("/nonexistent-cache")];
        config
    }

    fn write_module(root: &assert_fs::fixture::ChildPath, wrapper: &str) {
        root.child("mvnw").write_str(wrapper).unwrap();
        root.child("src/main/java/com/acme/web/OrderController.java").write_str(CONTROLLER).unwrap();
        root.child("src/main/java/com/acme/service/OrderService.java").write_str(SERVICE).unwrap();
        root.child("src/main/java/com/acme/repository/OrderRepository.java").write_str(REPOSITORY).unwrap();
    }

    #[tokio::test]
    async fn test_missing_root_is_reported() {
        let mut engine = Engine::with_config(test_config());
        let report = engine
            .analyze(Path::new("/no/such/project"), &AnalyzeOptions::default())
            .await
            .unwrap();

        assert_eq!(report.tech_stack.project_type, ProjectType::NotFound);
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.modules[0].status, ModuleStatus::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_compile_does_not_stop_other_modules() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("fixture/OrderService.class")
            .write_binary(&synthesize(0x0021, "com/acme/service/OrderService", Some("java/lang/Object"), &[]))
            .unwrap();

        write_module(
            &temp.child("orders"),
            "#!/bin/sh\nmkdir -p target/classes/com/acme/service\ncp ../fixture/OrderService.class target/classes/com/acme/service/\n",
        );
        write_module(&temp.child("billing"), "#!/bin/sh\nexit 1\n");

        let mut engine = Engine::with_config(test_config());
        let report = engine.analyze(temp.path(), &AnalyzeOptions::default()).await.unwrap();

        let names: Vec<&str> = report.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["billing", "orders"]);

        let orders = report.module("orders").unwrap();
        assert_eq!(orders.status, ModuleStatus::Success);
        assert_eq!(orders.compiled_with.as_deref(), Some("maven-wrapper"));
        let graph = orders.class_graph.as_ref().unwrap();
        assert_eq!(graph.classes[0].name, "OrderService");

        let billing = report.module("billing").unwrap();
        assert_eq!(billing.status, ModuleStatus::Partial);
        assert!(billing.class_graph.is_none());
        assert!(billing.structure_error.as_deref().unwrap().contains("maven-wrapper"));

        // Tracing runs regardless of compilation
        for module in [orders, billing] {
            let sequence = &module.sequences["OrderController"][0];
            assert_eq!(sequence.len(), 2);
            assert_eq!(sequence.terminal, Terminal::DataAccess);
            assert_eq!(module.roles.components, 1);
        }

        let output = temp.child("out");
        engine.write_report(&report, output.path()).unwrap();
        output.child("report.json").assert(predicate::path::is_file());
        output.child("tech-stack.json").assert(predicate::path::is_file());
        output.child("orders/class-graph.json").assert(predicate::path::is_file());
        output.child("orders/sequences.json").assert(predicate::str::contains("findOrder"));
        output
            .child("orders/sequences.json")
            .assert(predicate::str::contains("\"label\": \"fetch Order\""));
        output.child("billing/class-graph.error.json").assert(predicate::str::contains("Compilation failed"));
        output.child("billing/class-graph.json").assert(predicate::path::missing());
    }

    #[tokio::test]
    async fn test_single_module_without_build_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main/java/com/acme/web/OrderController.java").write_str(CONTROLLER).unwrap();
        temp.child("src/main/java/com/acme/service/OrderService.java").write_str(SERVICE).unwrap();
        temp.child("src/main/java/com/acme/repository/OrderRepository.java").write_str(REPOSITORY).unwrap();

        let mut engine = Engine::with_config(test_config());
        let options = AnalyzeOptions {
            single_module: true,
            auto_tune: false,
        };
        let report = engine.analyze(temp.path(), &options).await.unwrap();

        assert_eq!(report.modules.len(), 1);
        let module = &report.modules[0];
        assert_eq!(module.status, ModuleStatus::Partial);
        assert!(module.problems[0].contains("no applicable build strategy"));
        assert_eq!(module.sequences["OrderController"][0].operation.name, "show");
    }

    #[tokio::test]
    async fn test_disabled_tracing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main/java/com/acme/web/OrderController.java").write_str(CONTROLLER).unwrap();

        let mut config = test_config();
        config.sequence.enabled = false;
        let mut engine = Engine::with_config(config);
        let report = engine.analyze(temp.path(), &AnalyzeOptions::default()).await.unwrap();

        assert!(report.modules[0].sequences.is_empty());
        assert_eq!(report.modules[0].roles, RoleCounts::default());
    }

    #[tokio::test]
    async fn test_reload_between_projects() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config_file = temp.child("strata.toml");
        config_file
            .write_str("[general]\nauto_tune = true\n\n[execution]\nfallback_to_javac = false\nmax_workers = 3\n")
            .unwrap();

        temp.child("plain/api/src/App.java").write_str("public class App {}").unwrap();
        temp.child("plain/core/src/Core.java").write_str("public class Core {}").unwrap();
        temp.child("boot/api/src/App.java")
            .write_str("@SpringBootApplication public class App {}")
            .unwrap();
        temp.child("boot/core/src/Core.java").write_str("public class Core {}").unwrap();

        let mut engine = Engine::new(Some(config_file.path())).await.unwrap();
        let plain = engine.analyze(&temp.path().join("plain"), &AnalyzeOptions::default()).await.unwrap();
        assert_eq!(plain.modules.len(), 1);

        let boot = engine.analyze(&temp.path().join("boot"), &AnalyzeOptions::default()).await.unwrap();
        let names: Vec<&str> = boot.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["api", "core"]);

        // Tuning lands on each run's copy, not on the loaded configuration
        assert!(engine.config().execution.detect_multi_module);
        assert_eq!(engine.config().execution.max_workers, 3);
    }

    #[tokio::test]
    async fn test_config_file_is_reread_for_each_root() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config_file = temp.child("strata.toml");
        config_file.write_str("[execution]\nfallback_to_javac = false\n").unwrap();
        temp.child("app/src/main/java/com/acme/web/OrderController.java").write_str(CONTROLLER).unwrap();
        temp.child("app/src/main/java/com/acme/service/OrderService.java").write_str(SERVICE).unwrap();

        let mut engine = Engine::new(Some(config_file.path())).await.unwrap();
        let first = engine.analyze(&temp.path().join("app"), &AnalyzeOptions::default()).await.unwrap();
        assert!(first.modules[0].sequences.contains_key("OrderController"));

        config_file
            .write_str("[execution]\nfallback_to_javac = false\n\n[sequence]\nenabled = false\n")
            .unwrap();
        let second = engine.analyze(&temp.path().join("app"), &AnalyzeOptions::default()).await.unwrap();
        assert!(second.modules[0].sequences.is_empty());
    }

    #[tokio::test]
    async fn test_auto_tune_does_not_carry_over_to_the_next_root() {
        let temp = assert_fs::TempDir::new().unwrap();
        for i in 0..=tuning::LARGE_PROJECT_FILES {
            temp.child(format!("large/src/C{}.java", i))
                .write_str(&format!("public class C{} {{}}", i))
                .unwrap();
        }
        temp.child("small/src/main/java/com/acme/web/OrderController.java").write_str(CONTROLLER).unwrap();
        temp.child("small/src/main/java/com/acme/service/OrderService.java").write_str(SERVICE).unwrap();
        temp.child("small/src/main/java/com/acme/repository/OrderRepository.java").write_str(REPOSITORY).unwrap();

        let mut engine = Engine::with_config(test_config());
        let options = AnalyzeOptions {
            single_module: false,
            auto_tune: true,
        };

        let large = engine.analyze(&temp.path().join("large"), &options).await.unwrap();
        assert!(large.modules[0].sequences.is_empty());

        let small = engine.analyze(&temp.path().join("small"), &options).await.unwrap();
        let sequence = &small.modules[0].sequences["OrderController"][0];
        assert_eq!(sequence.len(), 2);
        assert!(engine.config().sequence.enabled);
    }

    #[tokio::test]
    async fn test_single_module_applies_to_one_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("api/src/main/java/Api.java").write_str("public class Api {}").unwrap();
        temp.child("core/src/main/java/Core.java").write_str("public class Core {}").unwrap();

        let mut engine = Engine::with_config(test_config());
        let options = AnalyzeOptions {
            single_module: true,
            auto_tune: false,
        };
        let first = engine.analyze(temp.path(), &options).await.unwrap();
        assert_eq!(first.modules.len(), 1);

        let second = engine.analyze(temp.path(), &AnalyzeOptions::default()).await.unwrap();
        assert_eq!(second.modules.len(), 2);
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let temp = assert_fs::TempDir::new().unwrap();
        let engine = Engine::with_config(Config::default());

        let path = engine.init_config(Some(temp.path().join("strata.toml"))).unwrap();
        assert!(Config::load(&path).is_ok());
        assert!(engine.init_config(Some(path)).is_err());
    }
}
