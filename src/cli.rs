use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use anyhow::Result;
use tracing::{info, warn};

use crate::core::model::{AnalysisReport, ModuleStatus};
use crate::core::{AnalyzeOptions, Engine};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Class graphs, call sequences and a tech-stack inventory for unfamiliar Java projects")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one or more project roots and write the JSON handoff
    Analyze {
        /// Project roots to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat each root as a single module
        #[arg(long)]
        single_module: bool,

        /// Tune thresholds to each project before analyzing it
        #[arg(long)]
        auto_tune: bool,
    },

    /// Print the tech-stack summary as JSON
    Stack {
        /// Project root
        path: PathBuf,
    },

    /// List the modules a project root splits into
    Modules {
        /// Project root
        path: PathBuf,
    },

    /// Write the default configuration
    InitConfig {
        /// Target file (defaults to ./strata.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Analyze { paths, output, single_module, auto_tune } => {
                let options = AnalyzeOptions { single_module, auto_tune };
                analyze(&mut engine, &paths, output, &options).await
            }
            Commands::Stack { path } => {
                let summary = engine.stack(&path).await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(())
            }
            Commands::Modules { path } => {
                for module in engine.modules(&path)? {
                    println!("{}\t{}", module.name, module.path.display());
                }
                Ok(())
            }
            Commands::InitConfig { path } => {
                let written = engine.init_config(path)?;
                println!("Wrote {}", written.display());
                Ok(())
            }
        }
    }
}

async fn analyze(
    engine: &mut Engine,
    paths: &[PathBuf],
    output: Option<PathBuf>,
    options: &AnalyzeOptions,
) -> Result<()> {
    let base = output.unwrap_or_else(|| engine.config().general.output_dir.clone());

    for path in paths {
        let report = engine.analyze(path, options).await?;

        // Several roots share one output directory, one subdirectory each
        let target = if paths.len() > 1 {
            base.join(project_name(path))
        } else {
            base.clone()
        };
        engine.write_report(&report, &target)?;
        print_summary(&report, &target);
    }

    Ok(())
}

fn project_name(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| path.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}

fn print_summary(report: &AnalysisReport, target: &Path) {
    println!("{} ({:?})", report.root.display(), report.tech_stack.project_type);
    for module in &report.modules {
        let operations: usize = module.sequences.values().map(Vec::len).sum();
        let classes = module.class_graph.as_ref().map(|g| g.classes.len()).unwrap_or(0);
        println!(
            "  {:<30} {:?}: {} classes, {} operations",
            module.name, module.status, classes, operations
        );
        if module.status != ModuleStatus::Success {
            for problem in &module.problems {
                warn!("⚠️ {}: {}", module.name, problem);
            }
        }
    }
    info!("📁 Output in {}", target.display());
}
